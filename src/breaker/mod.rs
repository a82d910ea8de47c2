// src/breaker/mod.rs
//! Circuit breaker protecting a data source from repeated calls while it
//! is failing.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BreakerConfig;

/// Breaker state. `HalfOpen` admits probe calls after the recovery
/// timeout; the next recorded outcome settles the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    failure_count: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
}

/// Failure-detecting gate shared across all countries hitting one source.
///
/// All transitions happen inside a single mutex, so the open-to-half-open
/// flip in `call_allowed` is won by exactly one caller; later callers see
/// `HalfOpen` and are also admitted as probes.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout,
            inner: Mutex::new(BreakerInner {
                failure_count: 0,
                last_failure: None,
                state: BreakerState::Closed,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// `Open` flips to `HalfOpen` once the recovery timeout has elapsed
    /// since the last failure; that check and the flip are one atomic step.
    pub fn call_allowed(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let recovered = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    inner.state = BreakerState::HalfOpen;
                    info!(
                        "Circuit breaker {}: recovery timeout elapsed, transitioning to HalfOpen",
                        self.name
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A call succeeded: close the breaker and forget accumulated failures.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        if inner.state != BreakerState::Closed || inner.failure_count > 0 {
            debug!("Circuit breaker {}: success recorded, reset to Closed", self.name);
        }
        inner.failure_count = 0;
        inner.state = BreakerState::Closed;
    }

    /// A call failed: count it and open the breaker once the threshold is
    /// reached. A failure while `HalfOpen` reopens immediately and restarts
    /// the recovery timer.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        if inner.failure_count >= self.failure_threshold {
            if inner.state != BreakerState::Open {
                warn!(
                    "Circuit breaker {}: OPENED after {} failures",
                    self.name, inner.failure_count
                );
            }
            inner.state = BreakerState::Open;
        } else {
            debug!(
                "Circuit breaker {}: failure recorded ({}/{})",
                self.name, inner.failure_count, self.failure_threshold
            );
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker state poisoned").state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("breaker state poisoned").failure_count
    }

    /// Manual reset to Closed, clearing all failure history.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.state = BreakerState::Closed;
        info!("Circuit breaker {}: manually reset to Closed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(timeout_secs),
            },
        )
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let cb = breaker(5, 60);
        for _ in 0..4 {
            cb.record_failure();
            assert!(cb.call_allowed());
        }
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.call_allowed());
    }

    #[tokio::test]
    async fn intervening_success_resets_the_count() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.call_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_timeout_admits_a_half_open_probe() {
        let cb = breaker(5, 60);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert!(!cb.call_allowed());

        tokio::time::advance(Duration::from_secs(61)).await;
        // First check after the timeout performs the transition and allows.
        assert!(cb.call_allowed());
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_and_restarts_the_timer() {
        let cb = breaker(2, 30);
        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.call_allowed());

        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.call_allowed());

        // Timer restarted from the half-open failure.
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!cb.call_allowed());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cb.call_allowed());
    }
}
