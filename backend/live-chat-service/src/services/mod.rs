pub mod message_store;
pub mod session_store;
pub mod token;

pub use message_store::{MessageStore, SqliteMessageStore};
pub use session_store::SqliteSessionResolver;
pub use token::HandshakeVerifier;
