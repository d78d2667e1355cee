pub mod conversations;
pub mod sessions;
pub mod types;

pub use conversations::{handle_list_conversations, handle_list_messages};
pub use sessions::{
    handle_health, handle_list_sessions, handle_session_events, handle_session_qr,
    handle_session_status, handle_start_session, handle_stop_session,
};
