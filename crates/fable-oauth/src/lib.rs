//! OAuth login flows for the Fable auth core.
//!
//! # Components
//!
//! - [`state`]: CSRF state issue and consumption across two storage tiers
//! - [`gate`]: at-most-once admission for redirect callbacks
//! - [`provider`]: Google popup and LINE authorization-code exchange
//! - [`callback`]: the complete LINE and Google login flows

pub mod callback;
pub mod error;
pub mod gate;
pub mod provider;
pub mod state;

pub use callback::{CallbackOutcome, CallbackParams, GoogleLogin, LOGIN_PATH, LineLogin};
pub use error::{OAuthError, Result};
pub use gate::{CallbackGate, GatePhase};
pub use provider::{
    GoogleExchanger, IdentityPopup, LineExchanger, PopupError, PresetIdToken, ProviderIdentity,
    build_authorization_url,
};
pub use state::{
    FileStateStorage, MemoryStateStorage, Provider, SharedStateStorage, StateCheck, StateGuard,
    StatePolicy, StateStorage, StateToken, generate_state,
};
