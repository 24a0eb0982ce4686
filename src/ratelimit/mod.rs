//! Outbound rate limiting
//!
//! One token bucket per external source. A bucket holds up to `capacity`
//! tokens and is refilled from elapsed time on every observation: `capacity`
//! tokens accrue per `refill_period` seconds, rounded down.
//!
//! When the bucket is empty `acquire` sleeps for a fixed
//! `ceil(1000 / refill_period)` milliseconds. What happens next depends on the
//! [`AcquirePolicy`]: the default lets the caller through after a single wait
//! even if the refill produced nothing (allowing a small burst overshoot),
//! `Strict` keeps waiting until a real token is available. Under `Strict` the
//! part of the elapsed time that has not yet produced a token carries over to
//! the next refill, so slow buckets still make progress between re-checks.

use crate::sources::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Behaviour of `acquire` after the fixed wait on an empty bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquirePolicy {
    /// Refill, then take a token whether or not one was produced
    #[default]
    ForceAfterWait,
    /// Refill and re-check; wait again while the bucket is still empty
    Strict,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket for a single source
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    /// Seconds for an empty bucket to refill completely
    refill_period: f64,
    policy: AcquirePolicy,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket.
    ///
    /// `capacity` is raised to at least 1 and a non-positive `refill_period`
    /// is treated as one second.
    pub fn new(capacity: u32, refill_period: f64) -> Self {
        let capacity = capacity.max(1);
        let refill_period = if refill_period.is_finite() && refill_period > 0.0 {
            refill_period
        } else {
            1.0
        };

        Self {
            capacity,
            refill_period,
            policy: AcquirePolicy::default(),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn with_policy(mut self, policy: AcquirePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_period(&self) -> f64 {
        self.refill_period
    }

    pub fn policy(&self) -> AcquirePolicy {
        self.policy
    }

    /// Fixed wait applied when the bucket is empty
    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis((1000.0 / self.refill_period).ceil() as u64)
    }

    /// Take one token, sleeping if none is available
    pub async fn acquire(&self) {
        if self.try_take() {
            return;
        }

        loop {
            debug!("Rate limiter empty, waiting {:?}", self.wait_interval());
            tokio::time::sleep(self.wait_interval()).await;

            match self.policy {
                AcquirePolicy::ForceAfterWait => {
                    let mut bucket = self.lock();
                    self.refill(&mut bucket);
                    bucket.tokens = bucket.tokens.saturating_sub(1);
                    return;
                }
                AcquirePolicy::Strict => {
                    if self.try_take() {
                        return;
                    }
                }
            }
        }
    }

    /// Take a token without waiting
    pub fn try_acquire(&self) -> bool {
        self.try_take()
    }

    /// Tokens currently available (after refilling)
    pub fn remaining(&self) -> u32 {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn try_take(&self) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let added = (elapsed * self.capacity as f64 / self.refill_period).floor();

        if added >= 1.0 {
            let whole = added.min(self.capacity as f64) as u32;
            bucket.tokens = bucket.tokens.saturating_add(whole).min(self.capacity);
        }

        match self.policy {
            AcquirePolicy::ForceAfterWait => bucket.last_refill = now,
            // keep the time not yet turned into a token so short re-checks add up
            AcquirePolicy::Strict if bucket.tokens < self.capacity => {
                if added >= 1.0 {
                    let used =
                        Duration::from_secs_f64(added * self.refill_period / self.capacity as f64);
                    bucket.last_refill = (bucket.last_refill + used).min(now);
                }
            }
            AcquirePolicy::Strict => bucket.last_refill = now,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        // the critical sections cannot panic, recover the state if one ever did
        self.bucket.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-limiter health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStatus {
    pub remaining: u32,
    pub capacity: u32,
    pub refill_period: f64,
}

/// Rate limiters for every configured source
#[derive(Debug, Default)]
pub struct RateLimiterSet {
    limiters: BTreeMap<SourceId, Arc<RateLimiter>>,
}

impl RateLimiterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the limiter for a source
    pub fn insert(&mut self, source: SourceId, limiter: RateLimiter) {
        self.limiters.insert(source, Arc::new(limiter));
    }

    pub fn with(mut self, source: SourceId, limiter: RateLimiter) -> Self {
        self.insert(source, limiter);
        self
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<RateLimiter>> {
        self.limiters.get(&source).cloned()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Remaining tokens for every source
    pub fn status(&self) -> BTreeMap<SourceId, LimiterStatus> {
        self.limiters
            .iter()
            .map(|(source, limiter)| {
                (
                    *source,
                    LimiterStatus {
                        remaining: limiter.remaining(),
                        capacity: limiter.capacity(),
                        refill_period: limiter.refill_period(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_ok, assert_pending, task};

    fn assert_waited(start: Instant, millis: u64) {
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(millis), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(millis + 5), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_does_not_wait() {
        let limiter = RateLimiter::new(5, 1.0);
        let start = Instant::now();

        for expected in (0..5).rev() {
            limiter.acquire().await;
            assert_eq!(limiter.remaining(), expected);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_waits_fixed_interval() {
        let limiter = RateLimiter::new(2, 1.0);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;

        assert_waited(start, 1000);
        // a full period elapsed: refilled to 2, then one taken
        assert_eq!(limiter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_rounds_down_and_clamps() {
        let limiter = RateLimiter::new(4, 2.0);
        for _ in 0..4 {
            assert!(limiter.try_acquire());
        }
        assert_eq!(limiter.remaining(), 0);

        // 4 tokens per 2s: 0.4s -> floor(0.8) = 0
        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(limiter.remaining(), 0);

        // 0.6s -> floor(1.2) = 1
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(limiter.remaining(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.remaining(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_after_wait_never_goes_negative() {
        // 1 token per 100s: the fixed wait of 10ms cannot produce a token
        let limiter = RateLimiter::new(1, 100.0);
        limiter.acquire().await;
        assert_eq!(limiter.remaining(), 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_waited(start, 10);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_waits_for_real_token() {
        // 1 token per 0.5s, fixed wait is ceil(1000 / 0.5) = 2000ms
        let limiter = RateLimiter::new(1, 0.5).with_policy(AcquirePolicy::Strict);
        assert_eq!(limiter.wait_interval(), Duration::from_millis(2000));

        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert_waited(start, 2000);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_accrues_across_short_waits() {
        // 10 tokens per minute: one token every 6s, re-checked every 17ms
        let limiter = RateLimiter::new(10, 60.0).with_policy(AcquirePolicy::Strict);
        for _ in 0..10 {
            limiter.acquire().await;
        }

        let mut next = task::spawn(limiter.acquire());
        assert_pending!(next.poll());

        let start = Instant::now();
        assert_ok!(tokio::time::timeout(Duration::from_secs(600), limiter.acquire()).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(6100), "{:?}", elapsed);
        assert_eq!(limiter.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_stay_within_bounds_under_contention() {
        let limiter = Arc::new(RateLimiter::new(3, 1.0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                limiter.remaining()
            }));
        }

        for handle in handles {
            let remaining = handle.await.unwrap();
            assert!(remaining <= 3);
        }
        assert!(limiter.remaining() <= 3);
    }

    #[test]
    fn test_invalid_parameters_are_sanitized() {
        let limiter = RateLimiter::new(0, -1.0);
        assert_eq!(limiter.capacity(), 1);
        assert_eq!(limiter.refill_period(), 1.0);
    }

    #[tokio::test]
    async fn test_limiter_set_status() {
        let set = RateLimiterSet::new()
            .with(SourceId::PubMed, RateLimiter::new(3, 1.0))
            .with(SourceId::OpenFda, RateLimiter::new(4, 1.0));

        set.get(SourceId::PubMed).unwrap().acquire().await;

        let status = set.status();
        assert_eq!(status[&SourceId::PubMed].remaining, 2);
        assert_eq!(status[&SourceId::OpenFda].capacity, 4);
        assert!(set.get(SourceId::ClinicalTrials).is_none());
    }
}
