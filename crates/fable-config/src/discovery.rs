//! Config file discovery, layered merging, and environment overrides.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/fable/config.toml` (XDG user config)
//! 2. `./fable.toml` (project-local)
//! 3. Environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::types::{BackendConfig, GoogleConfig, LineConfig};
use crate::{ConfigError, FableConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "fable.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "fable";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "FABLE_CONFIG_DIR";

/// Environment variables consulted by [`apply_env_overrides`].
pub const BACKEND_URL_ENV: &str = "FABLE_BACKEND_URL";
pub const LINE_CHANNEL_ID_ENV: &str = "LINE_CHANNEL_ID";
pub const LINE_CHANNEL_SECRET_ENV: &str = "LINE_CHANNEL_SECRET";
pub const LINE_REDIRECT_URI_ENV: &str = "LINE_REDIRECT_URI";
pub const GOOGLE_CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: FableConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers,
/// then applying environment overrides.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `FABLE_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = FableConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    apply_env_overrides(&mut config);
    check_plaintext_secret(&config, &sources, &mut warnings);

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<FableConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    FableConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &FableConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Get the XDG config file path for fable.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for fable.
///
/// Checks `FABLE_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut FableConfig) {
    apply_env_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides using an arbitrary variable lookup.
///
/// Empty values are ignored.
pub fn apply_env_overrides_from<F>(config: &mut FableConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(BACKEND_URL_ENV) {
        config
            .backend
            .get_or_insert_with(BackendConfig::default)
            .url = Some(url);
    }

    let line_overrides = [
        get(LINE_CHANNEL_ID_ENV),
        get(LINE_CHANNEL_SECRET_ENV),
        get(LINE_REDIRECT_URI_ENV),
    ];
    if line_overrides.iter().any(Option::is_some) {
        let [id, secret, redirect] = line_overrides;
        let line = config.line.get_or_insert_with(LineConfig::default);
        if let Some(id) = id {
            line.channel_id = id;
        }
        if let Some(secret) = secret {
            line.channel_secret = secret;
        }
        if let Some(redirect) = redirect {
            line.redirect_uri = redirect;
        }
    }

    if let Some(client_id) = get(GOOGLE_CLIENT_ID_ENV) {
        config.google = Some(GoogleConfig { client_id });
    }
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut FableConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Warn when the LINE channel secret sits in a project-local file.
fn check_plaintext_secret(
    config: &FableConfig,
    sources: &[ConfigSource],
    warnings: &mut Vec<String>,
) {
    let project_loaded = sources
        .last()
        .is_some_and(|s| s.loaded && s.path.ends_with(PROJECT_CONFIG_FILE));
    let has_secret = config
        .line
        .as_ref()
        .is_some_and(|l| !l.channel_secret.is_empty());
    if project_loaded && has_secret {
        warnings.push(format!(
            "A LINE channel secret may be stored in {}. \
             Consider setting {} in the environment instead.",
            PROJECT_CONFIG_FILE, LINE_CHANNEL_SECRET_ENV
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
