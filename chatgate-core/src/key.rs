use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Number of messages returned when the caller does not ask for a usable limit
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Opaque identifier of one logical messaging connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Resolve the key for a start request.
    ///
    /// An explicit `session_ref` wins. Otherwise the key is derived from the
    /// account identifier and the creation time in unix milliseconds. Empty
    /// strings count as absent.
    pub fn resolve(
        session_ref: Option<&str>,
        account_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        match session_ref.filter(|r| !r.is_empty()) {
            Some(session_ref) => Self::new(session_ref),
            None => {
                let account = account_id.filter(|a| !a.is_empty()).unwrap_or("session");
                Self(format!("{}-{}", account, now.timestamp_millis()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Coerce a raw `limit` parameter into a positive message count.
///
/// Only the leading run of digits counts (`"12.9"` is 12, `"1e3"` is 1).
/// Anything missing, without leading digits, out of range, or below one
/// falls back to `default`.
pub fn parse_limit(raw: Option<&str>, default: usize) -> usize {
    let Some(raw) = raw.map(str::trim) else {
        return default;
    };

    let digits = raw.strip_prefix('+').unwrap_or(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_session_ref_is_used_verbatim() {
        let key = SessionKey::resolve(Some("acc-1"), Some("ignored"), Utc::now());
        assert_eq!(key.as_str(), "acc-1");
    }

    #[test]
    fn key_is_derived_from_account_and_timestamp() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(SessionKey::resolve(None, Some("acme"), now).as_str(), "acme-1700000000123");
        assert_eq!(SessionKey::resolve(Some(""), None, now).as_str(), "session-1700000000123");
    }

    #[test]
    fn limit_falls_back_to_default() {
        assert_eq!(parse_limit(None, DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some("abc"), DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some("0"), DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some("-3"), DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some(""), DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some(".5"), DEFAULT_MESSAGE_LIMIT), 50);
        assert_eq!(parse_limit(Some("99999999999999999999999999"), DEFAULT_MESSAGE_LIMIT), 50);
    }

    #[test]
    fn limit_accepts_positive_numbers() {
        assert_eq!(parse_limit(Some("20"), DEFAULT_MESSAGE_LIMIT), 20);
        assert_eq!(parse_limit(Some(" 7 "), DEFAULT_MESSAGE_LIMIT), 7);
        assert_eq!(parse_limit(Some("12.9"), DEFAULT_MESSAGE_LIMIT), 12);
        assert_eq!(parse_limit(Some("+8"), DEFAULT_MESSAGE_LIMIT), 8);
    }

    #[test]
    fn limit_ignores_exponents_and_trailing_text() {
        assert_eq!(parse_limit(Some("1e3"), DEFAULT_MESSAGE_LIMIT), 1);
        assert_eq!(parse_limit(Some("1e308"), DEFAULT_MESSAGE_LIMIT), 1);
        assert_eq!(parse_limit(Some("20abc"), DEFAULT_MESSAGE_LIMIT), 20);
    }
}
