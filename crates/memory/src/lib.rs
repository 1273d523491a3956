//! In-process stores for genbi.
//!
//! Nothing here survives a restart: artifacts, conversational memory and
//! rendered session history all live for the life of the process (or
//! until evicted or closed).

pub mod artifacts;
pub mod conversation;
pub mod sessions;

pub use artifacts::InMemoryArtifactStore;
pub use conversation::{ConversationHandle, ConversationMemory};
pub use sessions::{Session, SessionStore};
