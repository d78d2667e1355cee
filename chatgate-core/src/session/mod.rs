mod lifecycle;
mod record;
mod state;

pub use lifecycle::LifecycleAdapter;
pub use record::SessionRecord;
pub use state::{ApiStatus, SessionSnapshot, SessionState};
