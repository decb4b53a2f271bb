//! Reading-progress reporting with quantization, deduplication and retry.
//!
//! Readers scroll continuously; the backend only needs to hear about 5%
//! steps. Each chapter remembers the last bucket sent so repeated reports in
//! the same bucket never reach the network.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{FailureKind, Result};
use crate::notify::SharedNotifier;
use crate::retry::with_retry;
use crate::types::ProgressResponse;

/// Bucket width in percent.
pub const PROGRESS_STEP: u8 = 5;

/// Additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before the first retry; doubles each time.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Shown once per chapter when the backend reports completion.
pub const COMPLETION_MESSAGE: &str = "Chapter completed!";

/// Where quantized progress gets delivered.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send_progress(&self, chapter_id: &str, progress: u8) -> Result<ProgressResponse>;
}

/// Shared progress sink handle.
pub type SharedProgressSink = Arc<dyn ProgressSink>;

/// Why a report was refused before any network activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressRejection {
    EmptyChapterId,
    OutOfRange(f64),
}

impl std::fmt::Display for ProgressRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressRejection::EmptyChapterId => write!(f, "chapter id is empty"),
            ProgressRejection::OutOfRange(v) => write!(f, "progress {} is outside 0..=100", v),
        }
    }
}

/// Result of a single [`ProgressReporter::report`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Backend accepted the quantized value.
    Sent { progress: u8, completed: bool },
    /// Nothing to send: zero bucket or same bucket as last time.
    Skipped { progress: u8 },
    /// Input invalid; nothing sent.
    Rejected(ProgressRejection),
    /// Delivery failed after retries. Logged only.
    Failed { progress: u8, kind: FailureKind },
}

/// Round a raw percentage down to its bucket.
pub fn quantize(raw: f64) -> std::result::Result<u8, ProgressRejection> {
    if !raw.is_finite() || !(0.0..=100.0).contains(&raw) {
        return Err(ProgressRejection::OutOfRange(raw));
    }
    let step = f64::from(PROGRESS_STEP);
    Ok(((raw / step).floor() * step) as u8)
}

/// Chapters remembered for deduplication; the least recently reported is
/// forgotten first.
pub const DEFAULT_TRACKED_CHAPTERS: usize = 256;

fn chapter_cache(capacity: usize) -> LruCache<String, ChapterState> {
    LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
}

#[derive(Debug, Default)]
struct ChapterState {
    last_sent: Option<u8>,
    completion_notified: bool,
}

/// Reports reading progress to the backend.
pub struct ProgressReporter {
    sink: SharedProgressSink,
    notifier: SharedNotifier,
    chapters: Mutex<LruCache<String, ChapterState>>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl ProgressReporter {
    pub fn new(sink: SharedProgressSink, notifier: SharedNotifier) -> Self {
        Self {
            sink,
            notifier,
            chapters: Mutex::new(chapter_cache(DEFAULT_TRACKED_CHAPTERS)),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Bound the per-chapter state. A forgotten chapter may resend its
    /// current bucket once.
    pub fn with_tracked_chapters(mut self, capacity: usize) -> Self {
        self.chapters = Mutex::new(chapter_cache(capacity));
        self
    }

    /// Last bucket sent for a chapter, if any.
    pub fn last_sent(&self, chapter_id: &str) -> Option<u8> {
        self.chapters
            .lock()
            .peek(chapter_id)
            .and_then(|s| s.last_sent)
    }

    /// Report raw progress for a chapter.
    pub async fn report(&self, chapter_id: &str, raw_progress: f64) -> ReportOutcome {
        if chapter_id.trim().is_empty() {
            return ReportOutcome::Rejected(ProgressRejection::EmptyChapterId);
        }
        let progress = match quantize(raw_progress) {
            Ok(p) => p,
            Err(rejection) => {
                tracing::debug!(chapter_id, raw_progress, "Rejected progress report");
                return ReportOutcome::Rejected(rejection);
            }
        };
        if progress == 0 {
            return ReportOutcome::Skipped { progress };
        }

        // Claim the bucket before awaiting so concurrent reports coalesce.
        {
            let mut chapters = self.chapters.lock();
            let state = chapters.get_or_insert_mut(chapter_id.to_string(), ChapterState::default);
            if state.last_sent == Some(progress) {
                return ReportOutcome::Skipped { progress };
            }
            state.last_sent = Some(progress);
        }

        let result = with_retry(
            self.max_retries,
            self.initial_backoff,
            "reading_progress",
            || self.sink.send_progress(chapter_id, progress),
        )
        .await;

        match result {
            Ok(response) => {
                if response.completed && self.mark_completion(chapter_id) {
                    self.notifier.success(COMPLETION_MESSAGE);
                }
                tracing::debug!(chapter_id, progress, completed = response.completed, "Progress recorded");
                ReportOutcome::Sent {
                    progress,
                    completed: response.completed,
                }
            }
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!(chapter_id, progress, error = %e, "Progress report refused");
                } else {
                    tracing::warn!(chapter_id, progress, error = %e, "Progress report failed");
                }
                ReportOutcome::Failed {
                    progress,
                    kind: e.kind(),
                }
            }
        }
    }

    /// Returns true the first time a chapter is marked complete.
    fn mark_completion(&self, chapter_id: &str) -> bool {
        let mut chapters = self.chapters.lock();
        let state = chapters.get_or_insert_mut(chapter_id.to_string(), ChapterState::default);
        !std::mem::replace(&mut state.completion_notified, true)
    }
}
