pub mod broadcast;
pub mod events;
pub mod message_types;
pub mod registry;
pub mod session;

pub use broadcast::{Broadcaster, LocalBroadcaster};
pub use events::ServerEvent;
pub use message_types::ClientEvent;
pub use registry::{ConnectionRegistry, SessionId};
pub use session::WsSession;
