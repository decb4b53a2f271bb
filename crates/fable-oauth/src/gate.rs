//! Callback idempotency gate.
//!
//! A redirect callback can be invoked more than once for the same redirect
//! (re-renders, duplicate navigation events). The gate admits the
//! exchange-and-login sequence exactly once per callback instance.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where a gate is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GatePhase {
    /// Nothing has run yet.
    Unarmed = 0,
    /// The admitted sequence is in flight.
    Armed = 1,
    /// The admitted sequence finished.
    Completed = 2,
}

impl GatePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => GatePhase::Unarmed,
            1 => GatePhase::Armed,
            _ => GatePhase::Completed,
        }
    }
}

/// Admits one execution per instance.
#[derive(Debug, Default)]
pub struct CallbackGate {
    phase: AtomicU8,
}

impl CallbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GatePhase {
        GatePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Run `fut` if this is the first entry; otherwise return `None`
    /// without polling it.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self
            .phase
            .compare_exchange(
                GatePhase::Unarmed as u8,
                GatePhase::Armed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!(phase = ?self.phase(), "Callback already handled, ignoring re-entry");
            return None;
        }

        let output = fut.await;
        self.phase
            .store(GatePhase::Completed as u8, Ordering::Release);
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_runs_once() {
        let gate = CallbackGate::new();
        assert_eq!(gate.phase(), GatePhase::Unarmed);
        assert_eq!(gate.run(async { 1 }).await, Some(1));
        assert_eq!(gate.phase(), GatePhase::Completed);
        assert_eq!(gate.run(async { 2 }).await, None);
    }

    #[tokio::test]
    async fn test_reentry_while_armed_is_ignored() {
        let gate = Arc::new(CallbackGate::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run(async move {
                    let _ = rx.await;
                    "first"
                })
                .await
            })
        };

        // Wait for the first run to arm the gate.
        while gate.phase() != GatePhase::Armed {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.run(async { "second" }).await, None);

        tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Some("first"));
        assert_eq!(gate.phase(), GatePhase::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_entries_admit_exactly_one() {
        let gate = Arc::new(CallbackGate::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                let runs = runs.clone();
                tokio::spawn(async move {
                    gate.run(async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
