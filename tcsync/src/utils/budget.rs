//! Search budgets and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Limits on the tolerant sliding search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBudget {
    /// Skip the sliding search when the exact-grid pass took longer than this.
    pub max_exact_pass: Duration,
    /// Wall-clock limit for the sliding search itself.
    pub max_sliding_time: Duration,
    /// Seconds of decode region the sliding search may cover.
    pub max_sliding_span_secs: f64,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_exact_pass: Duration::from_secs(60),
            max_sliding_time: Duration::from_secs(60),
            max_sliding_span_secs: 120.0,
        }
    }
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self {
            max_exact_pass: Duration::MAX,
            max_sliding_time: Duration::MAX,
            max_sliding_span_secs: f64::INFINITY,
        }
    }

    /// Deadline for a sliding search started at `start`, if representable.
    pub fn sliding_deadline(&self, start: Instant) -> Option<Instant> {
        start.checked_add(self.max_sliding_time)
    }
}

/// Shared flag checked between search chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[test]
fn test_cancel_token_shared() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!other.is_cancelled());
    token.cancel();
    assert!(other.is_cancelled());
}

#[test]
fn test_unlimited_has_no_deadline() {
    assert!(
        SearchBudget::unlimited()
            .sliding_deadline(Instant::now())
            .is_none()
    );
    assert!(
        SearchBudget::default()
            .sliding_deadline(Instant::now())
            .is_some()
    );
}
