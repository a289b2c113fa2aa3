// Authentication module
// Manages the credential pair and session lifecycle

pub mod endpoints;
pub mod manager;
pub mod store;
pub mod types;

pub use manager::SessionManager;
pub use store::{CredentialStore, MemoryStore, SqliteStore};
pub use types::{Route, SessionEvent, SessionPhase, SessionSnapshot, TokenPair, UserProfile};
