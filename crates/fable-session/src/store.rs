//! Persisted session storage.
//!
//! There is exactly one session record per client context. Writes overwrite;
//! expired records are removed the first time they are read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fable_client::UserProfile;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, SessionError};

/// File name of the session record inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Key the session record is stored under.
pub const SESSION_KEY: &str = "fable_session";

/// Default record lifetime.
pub const DEFAULT_LIFETIME_DAYS: i64 = 7;

/// An established session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

impl Session {
    pub fn new(session_token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            session_token: session_token.into(),
            refresh_token: None,
            user,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }
}

/// Session plus bookkeeping, as written to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub key: String,
    pub session: Session,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn new(session: Session, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            key: SESSION_KEY.to_string(),
            session,
            stored_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Storage for the single session record.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Load the record if present and unexpired. Expired records are deleted.
    async fn load(&self) -> Result<Option<Session>>;

    /// Write the record, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove the record. Removing a missing record is not an error.
    async fn delete(&self) -> Result<()>;
}

/// Shared session store handle.
pub type SharedSessionStore = Arc<dyn SessionStore>;

fn lifetime_from_std(lifetime: std::time::Duration) -> Duration {
    Duration::from_std(lifetime).unwrap_or_else(|_| Duration::days(DEFAULT_LIFETIME_DAYS))
}

// ============================================================================
// FileSessionStore
// ============================================================================

/// JSON file store for production use.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lifetime: Duration,
    // Serializes read-modify-delete sequences within this process.
    io: Mutex<()>,
}

impl FileSessionStore {
    /// Store `session.json` inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(SESSION_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            lifetime: Duration::days(DEFAULT_LIFETIME_DAYS),
            io: Mutex::new(()),
        }
    }

    pub fn with_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.lifetime = lifetime_from_std(lifetime);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove_file(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to delete {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let _guard = self.io.lock().await;

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let record: StoredSession = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable session record");
                self.remove_file()?;
                return Ok(None);
            }
        };

        if record.key != SESSION_KEY || record.is_expired() {
            tracing::debug!(expires_at = %record.expires_at, "Session record expired");
            self.remove_file()?;
            return Ok(None);
        }

        Ok(Some(record.session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.io.lock().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {}", e))
            })?;
        }

        let record = StoredSession::new(session.clone(), self.lifetime);
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {}", e)))?;

        tracing::debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let _guard = self.io.lock().await;
        self.remove_file()
    }
}

// ============================================================================
// MemorySessionStore
// ============================================================================

/// In-memory store for embedding and tests.
#[derive(Debug)]
pub struct MemorySessionStore {
    record: Mutex<Option<StoredSession>>,
    lifetime: Duration,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
            lifetime: Duration::days(DEFAULT_LIFETIME_DAYS),
        }
    }

    pub fn with_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.lifetime = lifetime_from_std(lifetime);
        self
    }

    /// Peek at the raw record, expired or not.
    pub async fn raw(&self) -> Option<StoredSession> {
        self.record.lock().await.clone()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let mut record = self.record.lock().await;
        if record.as_ref().is_some_and(StoredSession::is_expired) {
            *record = None;
        }
        Ok(record.as_ref().map(|r| r.session.clone()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.record.lock().await = Some(StoredSession::new(session.clone(), self.lifetime));
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        *self.record.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        serde_json::from_value(serde_json::json!({"id": "u1", "email": "a@b.com"})).unwrap()
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());

        let session = Session::new("tok", user()).with_refresh_token("ref");
        store.save(&session).await.unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_file_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.save(&Session::new("first", user())).await.unwrap();
        store.save(&Session::new("second", user())).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().session_token, "second");
    }

    #[tokio::test]
    async fn test_file_store_expired_record_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).with_lifetime(std::time::Duration::ZERO);
        store.save(&Session::new("tok", user())).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.delete().await.unwrap();
        store.save(&Session::new("tok", user())).await.unwrap();
        store.delete().await.unwrap();
        store.delete().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_expiry() {
        let store = MemorySessionStore::new().with_lifetime(std::time::Duration::ZERO);
        store.save(&Session::new("tok", user())).await.unwrap();
        assert!(store.raw().await.is_some());
        assert!(store.load().await.unwrap().is_none());
        assert!(store.raw().await.is_none());
    }

    #[tokio::test]
    async fn test_record_carries_key_and_expiry() {
        let store = MemorySessionStore::new();
        store.save(&Session::new("tok", user())).await.unwrap();
        let raw = store.raw().await.unwrap();
        assert_eq!(raw.key, SESSION_KEY);
        assert_eq!(raw.expires_at - raw.stored_at, Duration::days(7));
    }
}
