//! Token-bucket admission control.
//!
//! A shared, mutation-safe rate limiter protecting stateless endpoints.
//! Buckets are keyed by a caller-supplied opaque string (typically
//! `"<route>:<user-id>"`) and refill continuously rather than in whole-tick
//! batches, so a rejected caller's wait estimate shrinks with real time.

use crate::RateLimitDecision;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Refill floor: a misconfigured non-positive rate degrades to one token
/// per hour instead of starving a key forever.
const MIN_REFILL_PER_SECOND: f64 = 1.0 / 3600.0;

/// Per-key bucket state. `tokens` stays within `[0, capacity]`.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-memory token-bucket table.
///
/// Created once per process and passed by reference to every caller; tests
/// instantiate isolated instances instead of sharing process-wide state.
/// Mutation is serialized per key (inner `Mutex`) while distinct keys
/// proceed in parallel (outer `RwLock` is only write-locked to insert).
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    /// Create an empty limiter with no buckets
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Try to spend one token from the bucket for `key`.
    ///
    /// First use of a key creates a bucket holding `capacity - 1` tokens
    /// (the admitting call spends one). A rejection is a normal outcome and
    /// carries the number of seconds after which a retry should succeed.
    pub fn consume(&self, key: &str, capacity: f64, refill_per_second: f64) -> RateLimitDecision {
        self.consume_at(key, capacity, refill_per_second, Instant::now())
    }

    /// `consume` against an explicit clock reading. Tests drive this
    /// directly with synthetic instants; production goes through `consume`.
    pub(crate) fn consume_at(
        &self,
        key: &str,
        capacity: f64,
        refill_per_second: f64,
        now: Instant,
    ) -> RateLimitDecision {
        let capacity = capacity.max(1.0);
        let rate = refill_per_second.max(MIN_REFILL_PER_SECOND);

        // Fast path: bucket already exists, take it under the read lock.
        let existing = {
            let table = self
                .buckets
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            table.get(key).cloned()
        };

        let bucket = match existing {
            Some(bucket) => bucket,
            None => {
                let mut table = self
                    .buckets
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                // Another caller may have created the bucket between the
                // read and write locks; only the true first caller gets the
                // creation path.
                match table.get(key) {
                    Some(bucket) => Arc::clone(bucket),
                    None => {
                        table.insert(
                            key.to_string(),
                            Arc::new(Mutex::new(TokenBucket {
                                tokens: capacity - 1.0,
                                last_refill: now,
                            })),
                        );
                        tracing::debug!("Created rate-limit bucket for key '{}'", key);
                        return RateLimitDecision {
                            allowed: true,
                            retry_after_seconds: 0,
                        };
                    }
                }
            }
        };

        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now
            .saturating_duration_since(bucket.last_refill)
            .as_secs_f64();
        let refilled = (bucket.tokens + elapsed * rate).min(capacity);
        // Commit the refill even on rejection so partial elapsed time is
        // never lost across calls.
        bucket.last_refill = now;

        if refilled >= 1.0 {
            bucket.tokens = refilled - 1.0;
            RateLimitDecision {
                allowed: true,
                retry_after_seconds: 0,
            }
        } else {
            bucket.tokens = refilled;
            let missing = 1.0 - refilled;
            let retry_after_seconds = ceil_seconds(missing / rate);
            tracing::debug!(
                "Rate limit rejection for key '{}': retry after {}s",
                key,
                retry_after_seconds
            );
            RateLimitDecision {
                allowed: false,
                retry_after_seconds,
            }
        }
    }
}

/// Ceiling with a small tolerance: the refill division can land a hair
/// above a whole number (e.g. 12.000000000000002) and must still report
/// that whole number of seconds.
fn ceil_seconds(seconds: f64) -> u64 {
    (seconds - 1e-9).ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CAPACITY: f64 = 5.0;
    const RATE: f64 = 5.0 / 60.0;

    #[test]
    fn test_burst_then_reject_with_retry_hint() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        for call in 0..5 {
            let decision = limiter.consume_at("route:user", CAPACITY, RATE, now);
            assert!(decision.allowed, "call {} should be admitted", call + 1);
            assert_eq!(decision.retry_after_seconds, 0);
        }

        let decision = limiter.consume_at("route:user", CAPACITY, RATE, now);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_seconds, 12);
    }

    #[test]
    fn test_first_use_spends_one_token() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        // Capacity 1: the creating call takes the only token.
        assert!(limiter.consume_at("k", 1.0, RATE, now).allowed);
        assert!(!limiter.consume_at("k", 1.0, RATE, now).allowed);
    }

    #[test]
    fn test_tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        // Drain the bucket, then wait far longer than a full refill.
        for _ in 0..5 {
            limiter.consume_at("k", CAPACITY, RATE, t0);
        }
        let much_later = t0 + Duration::from_secs(86_400);

        // Only `capacity` tokens may have accumulated.
        for call in 0..5 {
            let decision = limiter.consume_at("k", CAPACITY, RATE, much_later);
            assert!(decision.allowed, "call {} should be admitted", call + 1);
        }
        assert!(!limiter.consume_at("k", CAPACITY, RATE, much_later).allowed);
    }

    #[test]
    fn test_partial_refill_is_not_lost() {
        let limiter = RateLimiter::new();
        // 0.25 tokens/s is exact in binary, so the halves sum to a whole token.
        let rate = 0.25;
        let t0 = Instant::now();

        for _ in 0..5 {
            limiter.consume_at("k", CAPACITY, rate, t0);
        }
        // One token takes 4s at this rate; 2s restores half of it.
        let rejected = limiter.consume_at("k", CAPACITY, rate, t0 + Duration::from_secs(2));
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after_seconds, 2);

        // The remaining 2s finish the token even though the rejected call
        // committed the intermediate balance.
        let admitted = limiter.consume_at("k", CAPACITY, rate, t0 + Duration::from_secs(4));
        assert!(admitted.allowed);
    }

    #[test]
    fn test_retry_hint_shrinks_with_elapsed_time() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();

        for _ in 0..5 {
            limiter.consume_at("k", CAPACITY, RATE, t0);
        }

        let first = limiter.consume_at("k", CAPACITY, RATE, t0);
        let second = limiter.consume_at("k", CAPACITY, RATE, t0 + Duration::from_secs(3));
        let third = limiter.consume_at("k", CAPACITY, RATE, t0 + Duration::from_secs(9));
        assert!(!first.allowed && !second.allowed && !third.allowed);
        assert!(second.retry_after_seconds < first.retry_after_seconds);
        assert!(third.retry_after_seconds < second.retry_after_seconds);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let isolated = RateLimiter::new();
        let now = Instant::now();

        // Interleave two keys on one limiter; key "a" must see exactly the
        // results it would see running alone.
        let mut interleaved = Vec::new();
        let mut alone = Vec::new();
        for _ in 0..7 {
            interleaved.push(limiter.consume_at("a", CAPACITY, RATE, now));
            limiter.consume_at("b", CAPACITY, RATE, now);
            alone.push(isolated.consume_at("a", CAPACITY, RATE, now));
        }
        assert_eq!(interleaved, alone);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        // Clamped to a single-token bucket rather than rejecting forever.
        assert!(limiter.consume_at("k", 0.0, RATE, now).allowed);
        assert!(!limiter.consume_at("k", 0.0, RATE, now).allowed);
    }

    #[test]
    fn test_concurrent_consumers_cannot_overdraw() {
        let limiter = Arc::new(RateLimiter::new());
        // Negligible refill so the admitted count is the capacity.
        let rate = 1e-9;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..25 {
                    if limiter.consume("shared", 10.0, rate).allowed {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_ceil_seconds_tolerates_float_noise() {
        assert_eq!(ceil_seconds(12.000000000000002), 12);
        assert_eq!(ceil_seconds(12.0), 12);
        assert_eq!(ceil_seconds(11.5), 12);
        assert_eq!(ceil_seconds(0.3), 1);
    }
}
