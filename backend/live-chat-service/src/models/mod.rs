pub mod contact;
pub mod message;

pub use contact::{ContactStatus, OnlineStatus, RecentContact};
pub use message::{ConversationEntry, Message};
