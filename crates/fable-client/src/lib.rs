//! Backend access for the Fable auth core.
//!
//! This crate is the single path to the backend service. It provides:
//!
//! - **Forwarding**: [`Forwarder`] attaches caller context and classifies
//!   every backend answer into a [`ProxiedResponse`] or an [`Error`]
//! - **Typed API**: [`BackendClient`] with auth, profile and reading endpoints
//! - **Progress**: [`ProgressReporter`] quantizes, deduplicates and retries
//!   reading-progress reports
//! - **Failure taxonomy**: [`FailureKind`], shared by every crate above this one
//!
//! # Example
//!
//! ```no_run
//! use fable_client::{CallerContext, Forwarder, ProxiedRequest};
//!
//! # async fn example() -> fable_client::Result<()> {
//! let forwarder = Forwarder::new("http://localhost:8080");
//! let request = ProxiedRequest::get("/api/admin/auth/verify-admin")
//!     .with_caller(CallerContext::new("203.0.113.9", "curl/8.0").with_bearer("tok"))
//!     .protected();
//! let response = forwarder.forward(request).await?;
//! println!("{} {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod forward;
pub mod notify;
pub mod progress;
pub mod retry;
pub mod types;

pub use client::{BackendClient, ClientBuilder};
pub use error::{Error, ErrorBody, FailureKind, Result};
pub use forward::{CallerContext, Forwarder, ProxiedRequest, ProxiedResponse, classify};
pub use notify::{MemoryNotifier, Notification, Notifier, SharedNotifier, TracingNotifier};
pub use progress::{
    ProgressRejection, ProgressReporter, ProgressSink, ReportOutcome, SharedProgressSink,
};
pub use retry::with_retry;
pub use types::*;

pub use reqwest::Method;
