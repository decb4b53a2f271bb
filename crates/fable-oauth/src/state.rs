//! CSRF state guard for redirect-based logins.
//!
//! A state value is issued right before the redirect to the provider and
//! consumed when the provider redirects back. It is written to two
//! independent tiers: a short-lived process tier and a longer-lived file
//! tier. Losing one tier (a restarted process, a cleared file) must not break
//! the login, so consumption falls back from one tier to the other.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use subtle::ConstantTimeEq;

pub use fable_config::StatePolicy;

use crate::error::{OAuthError, Result};

/// Random bytes per state value.
pub const STATE_BYTES: usize = 32;

/// File name of the long-lived tier inside the data directory.
pub const STATE_FILE: &str = "oauth-state.json";

/// Identity providers with a redirect flow or popup flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Line,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Line => "line",
        }
    }

    /// Storage key for the state value.
    pub fn state_key(&self) -> String {
        format!("{}_oauth_state", self.as_str())
    }

    /// Storage key for the issuance timestamp.
    pub fn created_at_key(&self) -> String {
        format!("{}_oauth_state_created_at", self.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a fresh state value: 32 CSPRNG bytes, base64url without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// An issued state value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// How a received state compared with what was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCheck {
    /// Stored and received values are equal.
    Matched,
    /// Values differ; tolerated under the lenient policy.
    Mismatch,
    /// Nothing was stored in either tier; tolerated under the lenient policy.
    NotFound,
}

impl StateCheck {
    pub fn is_verified(&self) -> bool {
        matches!(self, StateCheck::Matched)
    }
}

// ============================================================================
// Storage tiers
// ============================================================================

/// A key-value tier holding state values and timestamps.
pub trait StateStorage: Send + Sync + fmt::Debug {
    /// Short name for log output.
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared storage tier handle.
pub type SharedStateStorage = Arc<dyn StateStorage>;

/// Process-scoped tier.
#[derive(Debug, Default)]
pub struct MemoryStateStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStateStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// File-backed tier that survives process restarts.
///
/// The whole map is rewritten on every change; concurrent writers from
/// different processes are last-write-wins.
#[derive(Debug)]
pub struct FileStateStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStorage {
    /// Store `oauth-state.json` inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(STATE_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(OAuthError::Config(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable OAuth state file");
                Ok(HashMap::new())
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(OAuthError::Config(format!(
                    "Failed to delete {}: {}",
                    self.path.display(),
                    e
                ))),
            };
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OAuthError::Config(format!("Failed to create state directory: {}", e))
            })?;
        }
        let json = serde_json::to_string_pretty(map)
            .map_err(|e| OAuthError::Config(format!("Failed to serialize OAuth state: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| OAuthError::Config(format!("Failed to write OAuth state: {}", e)))
    }
}

impl StateStorage for FileStateStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ============================================================================
// StateGuard
// ============================================================================

/// Issues and consumes one-time OAuth state values.
#[derive(Debug, Clone)]
pub struct StateGuard {
    short_lived: SharedStateStorage,
    long_lived: SharedStateStorage,
    policy: StatePolicy,
}

impl StateGuard {
    pub fn new(short_lived: SharedStateStorage, long_lived: SharedStateStorage) -> Self {
        Self {
            short_lived,
            long_lived,
            policy: StatePolicy::default(),
        }
    }

    /// Memory tier plus a file tier in `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self::new(
            Arc::new(MemoryStateStorage::new()),
            Arc::new(FileStateStorage::new(data_dir)),
        )
    }

    pub fn with_policy(mut self, policy: StatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatePolicy {
        self.policy
    }

    fn tiers(&self) -> [&SharedStateStorage; 2] {
        [&self.short_lived, &self.long_lived]
    }

    /// Issue a fresh state for `provider` and record it in both tiers.
    ///
    /// A tier that fails to store is logged and skipped.
    pub fn issue(&self, provider: Provider) -> StateToken {
        let token = StateToken {
            value: generate_state(),
            created_at: Utc::now(),
        };
        let created_at = token.created_at.to_rfc3339();

        for tier in self.tiers() {
            let stored = tier
                .set(&provider.state_key(), &token.value)
                .and_then(|_| tier.set(&provider.created_at_key(), &created_at));
            if let Err(e) = stored {
                tracing::warn!(provider = %provider, tier = tier.name(), error = %e, "Failed to store OAuth state");
            }
        }

        tracing::debug!(provider = %provider, "Issued OAuth state");
        token
    }

    /// When the state for `provider` was issued, if it is still stored.
    pub fn issued_at(&self, provider: Provider) -> Option<DateTime<Utc>> {
        let raw = self.lookup(&provider.created_at_key())?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.tiers().into_iter().find_map(|tier| match tier.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(tier = tier.name(), error = %e, "Failed to read OAuth state tier");
                None
            }
        })
    }

    fn purge(&self, provider: Provider) {
        for tier in self.tiers() {
            for key in [provider.state_key(), provider.created_at_key()] {
                if let Err(e) = tier.remove(&key) {
                    tracing::warn!(tier = tier.name(), key = %key, error = %e, "Failed to clear OAuth state");
                }
            }
        }
    }

    /// Consume the stored state for `provider` and compare it with the one
    /// that came back on the callback.
    ///
    /// The stored value is deleted from both tiers whatever the outcome.
    pub fn consume(&self, provider: Provider, received: Option<&str>) -> Result<StateCheck> {
        let stored = self.lookup(&provider.state_key());
        self.purge(provider);

        let received = match received.filter(|r| !r.is_empty()) {
            Some(r) => r,
            None => {
                tracing::warn!(provider = %provider, "OAuth callback without state");
                return Err(OAuthError::MissingState);
            }
        };

        let Some(stored) = stored else {
            return match self.policy {
                StatePolicy::Strict => Err(OAuthError::StateNotFound),
                StatePolicy::Lenient => {
                    tracing::warn!(provider = %provider, "No stored OAuth state, continuing");
                    Ok(StateCheck::NotFound)
                }
            };
        };

        if bool::from(stored.as_bytes().ct_eq(received.as_bytes())) {
            return Ok(StateCheck::Matched);
        }

        match self.policy {
            StatePolicy::Strict => Err(OAuthError::StateMismatch),
            StatePolicy::Lenient => {
                tracing::warn!(provider = %provider, "OAuth state mismatch, continuing");
                Ok(StateCheck::Mismatch)
            }
        }
    }
}

impl Default for StateGuard {
    /// Two in-memory tiers; nothing survives the process.
    fn default() -> Self {
        Self::new(
            Arc::new(MemoryStateStorage::new()),
            Arc::new(MemoryStateStorage::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_shape_and_uniqueness() {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            let s = generate_state();
            assert_eq!(s.len(), 43);
            assert!(
                s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
            assert!(seen.insert(s));
        }
    }

    #[test]
    fn test_issue_writes_both_tiers() {
        let short = Arc::new(MemoryStateStorage::new());
        let long = Arc::new(MemoryStateStorage::new());
        let guard = StateGuard::new(short.clone(), long.clone());

        let token = guard.issue(Provider::Line);
        for tier in [&short, &long] {
            assert_eq!(
                tier.get("line_oauth_state").unwrap().as_deref(),
                Some(token.value.as_str())
            );
            assert!(tier.get("line_oauth_state_created_at").unwrap().is_some());
        }
        assert!(guard.issued_at(Provider::Line).is_some());
    }

    #[test]
    fn test_consume_matched_and_purged() {
        let guard = StateGuard::default();
        let token = guard.issue(Provider::Line);

        let check = guard.consume(Provider::Line, Some(&token.value)).unwrap();
        assert_eq!(check, StateCheck::Matched);
        assert!(check.is_verified());
        assert!(guard.issued_at(Provider::Line).is_none());
        // Second consumption finds nothing.
        assert_eq!(
            guard.consume(Provider::Line, Some(&token.value)).unwrap(),
            StateCheck::NotFound
        );
    }

    #[test]
    fn test_fallback_to_long_lived_tier() {
        let short = Arc::new(MemoryStateStorage::new());
        let long = Arc::new(MemoryStateStorage::new());
        let guard = StateGuard::new(short.clone(), long.clone());
        let token = guard.issue(Provider::Line);

        short.remove("line_oauth_state").unwrap();
        assert_eq!(
            guard.consume(Provider::Line, Some(&token.value)).unwrap(),
            StateCheck::Matched
        );
        assert!(long.get("line_oauth_state").unwrap().is_none());
    }

    #[test]
    fn test_missing_received_state_is_fatal_and_still_purges() {
        let guard = StateGuard::default();
        guard.issue(Provider::Line);

        assert!(matches!(
            guard.consume(Provider::Line, None),
            Err(OAuthError::MissingState)
        ));
        assert!(matches!(
            guard.consume(Provider::Line, Some("")),
            Err(OAuthError::MissingState)
        ));
        assert!(guard.issued_at(Provider::Line).is_none());
    }

    #[test]
    fn test_lenient_tolerates_mismatch_and_absence() {
        let guard = StateGuard::default();
        guard.issue(Provider::Line);
        let forged = guard.consume(Provider::Line, Some("forged")).unwrap();
        assert_eq!(forged, StateCheck::Mismatch);
        assert!(!forged.is_verified());
        let absent = guard.consume(Provider::Line, Some("anything")).unwrap();
        assert_eq!(absent, StateCheck::NotFound);
        assert!(!absent.is_verified());
    }

    #[test]
    fn test_strict_rejects_mismatch_and_absence() {
        let guard = StateGuard::default().with_policy(StatePolicy::Strict);
        guard.issue(Provider::Line);
        assert!(matches!(
            guard.consume(Provider::Line, Some("forged")),
            Err(OAuthError::StateMismatch)
        ));
        assert!(matches!(
            guard.consume(Provider::Line, Some("forged")),
            Err(OAuthError::StateNotFound)
        ));
    }

    #[test]
    fn test_providers_do_not_collide() {
        let guard = StateGuard::default();
        let line = guard.issue(Provider::Line);
        let google = guard.issue(Provider::Google);
        assert_eq!(
            guard.consume(Provider::Google, Some(&google.value)).unwrap(),
            StateCheck::Matched
        );
        assert_eq!(
            guard.consume(Provider::Line, Some(&line.value)).unwrap(),
            StateCheck::Matched
        );
    }

    #[test]
    fn test_file_tier_survives_new_guard() {
        let dir = tempfile::tempdir().unwrap();
        let token = StateGuard::with_data_dir(dir.path()).issue(Provider::Line);
        assert!(dir.path().join(STATE_FILE).exists());

        // Fresh process: empty memory tier, same file.
        let guard = StateGuard::with_data_dir(dir.path());
        assert_eq!(
            guard.consume(Provider::Line, Some(&token.value)).unwrap(),
            StateCheck::Matched
        );
        assert!(!dir.path().join(STATE_FILE).exists());
    }

    #[test]
    fn test_unwritable_tier_does_not_abort_issue() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join(STATE_FILE)).unwrap();

        let short = Arc::new(MemoryStateStorage::new());
        let guard = StateGuard::new(short.clone(), Arc::new(FileStateStorage::new(&blocked)));
        let token = guard.issue(Provider::Line);

        assert_eq!(
            guard.consume(Provider::Line, Some(&token.value)).unwrap(),
            StateCheck::Matched
        );
    }
}
