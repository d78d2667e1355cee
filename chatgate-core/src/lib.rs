pub mod client;
pub mod error;
pub mod key;
pub mod registry;
pub mod session;
pub mod simulated;

pub use client::{Chat, ChatMessage, ClientEvent, ClientFactory, EventReceiver, EventSender, MessagingClient};
pub use error::{ClientError, SessionError};
pub use key::{parse_limit, SessionKey, DEFAULT_MESSAGE_LIMIT};
pub use registry::{RegistryConfig, SessionRegistry};
pub use session::{ApiStatus, LifecycleAdapter, SessionRecord, SessionSnapshot, SessionState};
pub use simulated::{SimulatedClient, SimulatedClientFactory, SimulatedControl};
