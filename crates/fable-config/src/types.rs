//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [backend]   # backend service location and deadline
//! [line]      # LINE Login channel
//! [google]    # Google identity client
//! [oauth]     # state policy, callback redirect timing
//! [session]   # session lifetime, data directory
//! [server]    # proxy server settings
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Default per-call deadline for outbound requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default session lifetime.
pub const DEFAULT_SESSION_LIFETIME_DAYS: u32 = 7;

/// Default delay before a failed OAuth callback returns to the login page.
pub const DEFAULT_FAILURE_REDIRECT_SECS: u64 = 3;

/// LINE authorization endpoint.
pub const LINE_AUTHORIZE_URL: &str = "https://access.line.me/oauth2/v2.1/authorize";

/// LINE token endpoint.
pub const LINE_TOKEN_URL: &str = "https://api.line.me/oauth2/v2.1/token";

/// Default bind address for the proxy server.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FableConfig {
    /// Backend service settings.
    pub backend: Option<BackendConfig>,

    /// LINE Login channel.
    pub line: Option<LineConfig>,

    /// Google identity client.
    pub google: Option<GoogleConfig>,

    /// OAuth callback behavior.
    pub oauth: Option<OAuthConfig>,

    /// Session persistence.
    pub session: Option<SessionConfig>,

    /// Proxy server settings.
    pub server: Option<ServerConfig>,
}

impl FableConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FableConfig) {
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.line.is_some() {
            self.line = other.line;
        }
        if other.google.is_some() {
            self.google = other.google;
        }
        if other.oauth.is_some() {
            self.oauth = other.oauth;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
    }

    /// Backend base URL with any trailing `/` or `/api` removed.
    pub fn backend_url(&self) -> String {
        let raw = self
            .backend
            .as_ref()
            .and_then(|b| b.url.as_deref())
            .unwrap_or(DEFAULT_BACKEND_URL);
        normalize_backend_url(raw)
    }

    /// Deadline applied to every outbound call.
    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .backend
            .as_ref()
            .and_then(|b| b.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// How strictly OAuth callbacks treat state discrepancies.
    pub fn state_policy(&self) -> StatePolicy {
        self.oauth
            .as_ref()
            .and_then(|o| o.state_policy)
            .unwrap_or_default()
    }

    /// Delay before a failed callback returns to the login page.
    pub fn failure_redirect_delay(&self) -> Duration {
        let secs = self
            .oauth
            .as_ref()
            .and_then(|o| o.failure_redirect_secs)
            .unwrap_or(DEFAULT_FAILURE_REDIRECT_SECS);
        Duration::from_secs(secs)
    }

    /// How long a persisted session stays valid.
    pub fn session_lifetime(&self) -> Duration {
        let days = self
            .session
            .as_ref()
            .and_then(|s| s.lifetime_days)
            .unwrap_or(DEFAULT_SESSION_LIFETIME_DAYS);
        Duration::from_secs(u64::from(days) * 24 * 60 * 60)
    }

    /// Directory holding the session record and the long-lived state tier.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.session
            .as_ref()
            .and_then(|s| s.data_dir.clone())
            .or_else(crate::discovery::xdg_config_dir)
    }

    /// The LINE channel, failing when credentials are incomplete.
    pub fn require_line(&self) -> Result<&LineConfig> {
        let line = self.line.as_ref().ok_or_else(|| ConfigError::MissingField {
            field: "line".to_string(),
            context: "config".to_string(),
        })?;
        for (field, value) in [
            ("channel_id", &line.channel_id),
            ("channel_secret", &line.channel_secret),
            ("redirect_uri", &line.redirect_uri),
        ] {
            if value.is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                    context: "[line]".to_string(),
                });
            }
        }
        Ok(line)
    }

    /// Proxy bind address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let raw = self
            .server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .unwrap_or(DEFAULT_BIND_ADDRESS);
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            value: raw.to_string(),
        })
    }
}

/// Strip trailing slashes and a trailing `/api` segment so that
/// `{base}/api/...` never doubles the prefix.
pub fn normalize_backend_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let without_api = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    without_api.trim_end_matches('/').to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[backend]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend service.
    pub url: Option<String>,
    /// Per-call deadline in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[line]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Channel ID (OAuth client id).
    #[serde(default)]
    pub channel_id: String,
    /// Channel secret (OAuth client secret).
    #[serde(default)]
    pub channel_secret: String,
    /// Registered callback URL.
    #[serde(default)]
    pub redirect_uri: String,
    /// Authorization endpoint override.
    #[serde(default = "default_line_authorize_url")]
    pub authorize_url: String,
    /// Token endpoint override.
    #[serde(default = "default_line_token_url")]
    pub token_url: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            channel_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: default_line_authorize_url(),
            token_url: default_line_token_url(),
        }
    }
}

fn default_line_authorize_url() -> String {
    LINE_AUTHORIZE_URL.to_string()
}

fn default_line_token_url() -> String {
    LINE_TOKEN_URL.to_string()
}

/// `[google]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client id the identity token is issued for.
    pub client_id: String,
}

/// `[oauth]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Handling of mismatched or missing stored state.
    pub state_policy: Option<StatePolicy>,
    /// Seconds before a failed callback returns to the login page.
    pub failure_redirect_secs: Option<u64>,
}

/// `[session]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a persisted session in days.
    pub lifetime_days: Option<u32>,
    /// Directory for the session record and OAuth state file.
    pub data_dir: Option<PathBuf>,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:3000`.
    pub bind: Option<String>,
    /// Enable per-request logging.
    pub request_logging: Option<bool>,
    /// CORS allowed origins (empty = no CORS).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// How an OAuth callback treats a stored state that is absent or different.
///
/// `Lenient` logs and proceeds, which tolerates storage eviction and
/// cross-tab loss. `Strict` aborts the login attempt instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatePolicy {
    #[default]
    Lenient,
    Strict,
}

impl std::str::FromStr for StatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::InvalidValue {
                field: "oauth.state_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}
