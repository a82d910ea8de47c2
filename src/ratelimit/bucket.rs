// src/ratelimit/bucket.rs
//! Token bucket primitive: a fixed-capacity counter that refills
//! continuously and is drained by `consume`.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Minimum sleep while waiting for tokens, so a tiny deficit does not turn
/// into a hot spin.
const MIN_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Fixed-capacity, continuously refilling token bucket.
///
/// `rate` and `capacity` are immutable after construction; all token
/// mutation happens inside a single critical section in `consume`, so the
/// invariant `0 <= tokens <= capacity` holds at all times and a failed
/// consume leaves the balance untouched.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    ///
    /// `rate` is tokens per second; `capacity` the burst ceiling.
    pub fn new(rate: f64, capacity: u32) -> Self {
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            capacity: capacity.max(1) as f64,
            state: Mutex::new(BucketState {
                tokens: capacity.max(1) as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Refill from elapsed time, then take `tokens` if the balance covers
    /// them. Atomic: refill and subtraction happen under one lock.
    pub async fn consume(&self, tokens: u32) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        let needed = tokens as f64;
        if state.tokens >= needed {
            state.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Block the calling task until `tokens` could be consumed.
    ///
    /// The bucket lock is never held across the sleep, so other keys and
    /// other callers stay fully available while this task waits. A caller
    /// cancelled mid-wait has consumed nothing.
    pub async fn wait_for_tokens(&self, tokens: u32) {
        loop {
            if self.consume(tokens).await {
                return;
            }
            let wait = self.time_until_available(tokens).await.max(MIN_WAIT);
            sleep(wait).await;
        }
    }

    /// Remaining wait until `tokens` would be available. Pure: projects the
    /// refill without mutating the balance.
    pub async fn time_until_available(&self, tokens: u32) -> Duration {
        let state = self.state.lock().await;
        let projected = self.projected_tokens(&state);
        let needed = tokens as f64;
        if projected >= needed {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((needed - projected) / self.rate)
    }

    /// Currently available tokens, after projecting the refill.
    pub async fn available_tokens(&self) -> u32 {
        let state = self.state.lock().await;
        self.projected_tokens(&state).min(self.capacity) as u32
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;
    }

    fn projected_tokens(&self, state: &BucketState) -> f64 {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        (state.tokens + elapsed * self.rate).min(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[tokio::test]
    async fn starts_full_and_consumes_down() {
        let bucket = TokenBucket::new(10.0, 5);
        assert_eq!(bucket.available_tokens().await, 5);
        assert!(bucket.consume(3).await);
        assert_eq!(bucket.available_tokens().await, 2);
    }

    #[tokio::test]
    async fn failed_consume_leaves_balance_unchanged() {
        let bucket = TokenBucket::new(0.001, 5);
        assert!(bucket.consume(4).await);
        let before = bucket.available_tokens().await;
        assert!(!bucket.consume(3).await);
        assert_eq!(bucket.available_tokens().await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_at_configured_rate_up_to_capacity() {
        let bucket = TokenBucket::new(2.0, 10);
        assert!(bucket.consume(10).await);
        assert_eq!(bucket.available_tokens().await, 0);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(bucket.available_tokens().await, 6);

        // Never exceeds capacity regardless of elapsed time.
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(bucket.available_tokens().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn time_until_available_matches_deficit() {
        let bucket = TokenBucket::new(2.0, 4);
        assert!(bucket.consume(4).await);
        let wait = bucket.time_until_available(4).await;
        assert_approx_eq!(wait.as_secs_f64(), 2.0, 0.01);

        // Pure: probing must not change the balance.
        let wait_again = bucket.time_until_available(4).await;
        assert_approx_eq!(wait_again.as_secs_f64(), 2.0, 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_tokens_suspends_until_refill() {
        let bucket = TokenBucket::new(5.0, 5);
        assert!(bucket.consume(5).await);

        let started = Instant::now();
        bucket.wait_for_tokens(5).await;
        // 5 tokens at 5/s is one second of refill.
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(bucket.available_tokens().await, 0);
    }
}
