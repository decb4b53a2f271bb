//! Configuration system for the Fable auth core.
//!
//! Provides TOML-based configuration with:
//! - Backend location and per-call deadline (`[backend]`)
//! - Provider credentials (`[line]`, `[google]`)
//! - OAuth state policy and callback redirect timing (`[oauth]`)
//! - Session lifetime and data directory (`[session]`)
//! - Proxy server settings (`[server]`)
//!
//! Config file layering: XDG user config, then project-local `fable.toml`,
//! then environment variables.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, apply_env_overrides, apply_env_overrides_from, load_config,
    load_config_file, load_config_with_options, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
