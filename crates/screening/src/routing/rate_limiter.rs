//! Token-bucket rate limiter (spec §4.4). Hand-rolled rather than built on
//! `governor`: the spec's testable properties pin down the literal
//! `retry_after = (n - tokens) / rate` arithmetic and an `allowed + denied
//! = requests` invariant, which `governor`'s keyed-rate-limiter API does not
//! expose directly -- see DESIGN.md.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub tokens_per_second: f64,
    pub max_tokens: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            tokens_per_second: 10.0,
            max_tokens: 10.0,
        }
    }
}

struct TokenBucket {
    config: RateLimiterConfig,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(config: RateLimiterConfig) -> Self {
        Self {
            tokens: config.max_tokens,
            last_refill: Instant::now(),
            config,
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.config.tokens_per_second).min(self.config.max_tokens);
        self.last_refill = Instant::now();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiterStats {
    pub allowed: u64,
    pub denied: u64,
}

/// Result of a non-blocking acquire attempt.
pub enum AcquireOutcome {
    Allowed,
    Denied { retry_after: Duration },
}

#[derive(Default)]
struct ProviderStats {
    allowed: AtomicU64,
    denied: AtomicU64,
}

pub struct RateLimiterRegistry {
    default_config: RateLimiterConfig,
    buckets: DashMap<String, Mutex<TokenBucket>>,
    stats: DashMap<String, ProviderStats>,
}

impl RateLimiterRegistry {
    pub fn new(default_config: RateLimiterConfig) -> Self {
        Self {
            default_config,
            buckets: DashMap::new(),
            stats: DashMap::new(),
        }
    }

    pub fn configure(&self, provider_id: &str, config: RateLimiterConfig) {
        self.buckets.insert(provider_id.to_string(), Mutex::new(TokenBucket::new(config)));
    }

    fn bucket_ref(&self, provider_id: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<TokenBucket>> {
        self.buckets
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(TokenBucket::new(self.default_config)));
        self.buckets.get(provider_id).unwrap()
    }

    /// Atomic non-blocking acquire: refill by `elapsed * rate` capped at
    /// `max_tokens`, then subtract `n` if available, else reject with
    /// `retry_after = (n - tokens) / rate`.
    pub async fn try_acquire(&self, provider_id: &str, n: f64) -> AcquireOutcome {
        let bucket_ref = self.bucket_ref(provider_id);
        let mut bucket = bucket_ref.lock().await;
        bucket.refill();

        let outcome = if bucket.tokens >= n {
            bucket.tokens -= n;
            AcquireOutcome::Allowed
        } else {
            let deficit = n - bucket.tokens;
            let retry_after = Duration::from_secs_f64(deficit / bucket.config.tokens_per_second);
            AcquireOutcome::Denied { retry_after }
        };
        drop(bucket);

        let stats = self.stats.entry(provider_id.to_string()).or_default();
        match &outcome {
            AcquireOutcome::Allowed => stats.allowed.fetch_add(1, Ordering::Relaxed),
            AcquireOutcome::Denied { .. } => stats.denied.fetch_add(1, Ordering::Relaxed),
        };

        outcome
    }

    /// Blocking variant: retries `try_acquire` until tokens are available.
    pub async fn acquire(&self, provider_id: &str, n: f64) {
        loop {
            match self.try_acquire(provider_id, n).await {
                AcquireOutcome::Allowed => return,
                AcquireOutcome::Denied { retry_after } => sleep(retry_after).await,
            }
        }
    }

    pub fn stats(&self, provider_id: &str) -> RateLimiterStats {
        self.stats
            .get(provider_id)
            .map(|s| RateLimiterStats {
                allowed: s.allowed.load(Ordering::Relaxed),
                denied: s.denied.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Current token count, for the `[0, max_tokens]` invariant (spec §8).
    pub async fn current_tokens(&self, provider_id: &str) -> f64 {
        let bucket_ref = self.bucket_ref(provider_id);
        let mut bucket = bucket_ref.lock().await;
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rate: f64, max: f64) -> RateLimiterConfig {
        RateLimiterConfig { tokens_per_second: rate, max_tokens: max }
    }

    #[tokio::test]
    async fn starts_full_and_allows_up_to_max_tokens() {
        let registry = RateLimiterRegistry::new(config(5.0, 3.0));
        for _ in 0..3 {
            assert!(matches!(registry.try_acquire("p", 1.0).await, AcquireOutcome::Allowed));
        }
        assert!(matches!(registry.try_acquire("p", 1.0).await, AcquireOutcome::Denied { .. }));
    }

    #[tokio::test]
    async fn empty_bucket_rejects_with_retry_after_one_over_rate() {
        let registry = RateLimiterRegistry::new(config(2.0, 1.0));
        assert!(matches!(registry.try_acquire("p", 1.0).await, AcquireOutcome::Allowed));
        match registry.try_acquire("p", 1.0).await {
            AcquireOutcome::Denied { retry_after } => {
                assert!((retry_after.as_secs_f64() - 0.5).abs() < 0.05);
            }
            _ => panic!("expected denial"),
        }
    }

    #[tokio::test]
    async fn allowed_plus_denied_equals_requests() {
        let registry = RateLimiterRegistry::new(config(1.0, 2.0));
        for _ in 0..10 {
            let _ = registry.try_acquire("p", 1.0).await;
        }
        let stats = registry.stats("p");
        assert_eq!(stats.allowed + stats.denied, 10);
    }

    #[tokio::test]
    async fn tokens_never_exceed_max_or_go_negative() {
        let registry = RateLimiterRegistry::new(config(100.0, 5.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tokens = registry.current_tokens("p").await;
        assert!(tokens >= 0.0 && tokens <= 5.0);
    }
}
