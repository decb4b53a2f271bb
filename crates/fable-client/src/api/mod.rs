//! API endpoint implementations.

mod auth;
mod profile;
mod reading;

pub use auth::AuthApi;
pub use profile::ProfileApi;
pub use reading::ReadingApi;
