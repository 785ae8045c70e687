mod connection;
mod conversation;
mod event;
mod message;
mod user_id;

pub use connection::{ConflictStrategy, ConnectionHandle, ConnectionId, ConnectionState, PushResult};
pub use conversation::ConversationSummary;
pub use event::{ClientEvent, ServerEvent};
pub use message::Message;
pub use user_id::UserId;
