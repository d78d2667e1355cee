use axum::response::sse::Event;
use chatgate_core::{SessionKey, SessionSnapshot};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::error;

use crate::apis::types::SessionUpdate;

/// SSE stream of a session's snapshots.
///
/// Yields the current snapshot first, then one event per change. Ends when the
/// session record is dropped, i.e. after the session is stopped.
pub fn session_to_sse_stream(
    key: SessionKey,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    WatchStream::new(snapshot_rx).filter_map(move |snapshot| {
        let update = SessionUpdate::from_snapshot(&key, &snapshot);
        let event = match serde_json::to_string(&update) {
            Ok(json) => Some(Ok(Event::default().event("session").data(json))),
            Err(e) => {
                error!("[] - [{}] Failed to serialize session update: {}", key, e);
                None
            }
        };
        futures::future::ready(event)
    })
}
