//! Session establishment for the Fable auth core.
//!
//! The [`SessionBroker`] is the one place that exchanges credentials
//! (password, Google ID token, LINE access token) with the backend for a
//! session token and profile. It owns the active [`Session`] and persists it
//! through a [`SessionStore`].
//!
//! ```text
//! credentials ──► validate ──► backend (via fable-client) ──► Session ──► SessionStore
//! ```

pub mod broker;
pub mod error;
pub mod store;
pub mod validate;

pub use broker::{ProviderToken, RegisterOutcome, SessionBroker};
pub use error::{Result, SessionError};
pub use store::{
    FileSessionStore, MemorySessionStore, SESSION_FILE, SESSION_KEY, Session, SessionStore,
    SharedSessionStore, StoredSession,
};
pub use validate::{RegisterData, validate_email, validate_password, validate_username};
