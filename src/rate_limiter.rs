use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::{Result, TrendingError};

/// Token bucket bounding the request rate against one host
///
/// Holds at most `capacity` tokens and refills continuously at
/// `refill_per_sec`. Waiters sleep outside the lock, so concurrent callers
/// never spend the same token twice.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, capacity: f64, rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(capacity: u32, refill_per_sec: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(TrendingError::Config(
                "token bucket capacity must be at least 1".into(),
            ));
        }
        if !(refill_per_sec > 0.0) || !refill_per_sec.is_finite() {
            return Err(TrendingError::Config(format!(
                "token bucket refill rate must be positive, got {}",
                refill_per_sec
            )));
        }
        // The longest wait, a full bucket's worth of tokens, must be representable
        let longest_wait = f64::from(capacity) / refill_per_sec;
        if Duration::try_from_secs_f64(longest_wait).is_err() {
            return Err(TrendingError::Config(format!(
                "token bucket refill rate {} is too small for capacity {}",
                refill_per_sec, capacity
            )));
        }
        Ok(Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        })
    }

    /// Waits until `cost` tokens are available and deducts them
    ///
    /// A cost above the capacity could never be satisfied and is rejected.
    pub async fn acquire(&self, cost: u32) -> Result<()> {
        let cost = f64::from(cost);
        if cost > self.capacity {
            return Err(TrendingError::Config(format!(
                "requested {} tokens but bucket capacity is {}",
                cost, self.capacity
            )));
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.refill(self.capacity, self.refill_per_sec);
                if state.tokens >= cost {
                    state.tokens -= cost;
                    return Ok(());
                }
                (cost - state.tokens) / self.refill_per_sec
            };

            let wait = Duration::try_from_secs_f64(wait).map_err(|e| {
                TrendingError::Config(format!("cannot wait {}s for tokens: {}", wait, e))
            })?;
            debug!("Rate limited, waiting {:?} for {} token(s)", wait, cost);
            sleep(wait).await;
        }
    }

    /// Deducts `cost` tokens if they are available right now
    pub async fn try_acquire(&self, cost: u32) -> bool {
        let cost = f64::from(cost);
        let mut state = self.state.lock().await;
        state.refill(self.capacity, self.refill_per_sec);
        if state.tokens >= cost {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refilling
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.capacity, self.refill_per_sec);
        state.tokens
    }
}

/// Limits the rate of requests per host
///
/// Cloning shares the underlying buckets. Buckets are created lazily the
/// first time a host is seen.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    capacity: u32,
    refill_per_sec: f64,
    buckets: Arc<Mutex<HashMap<String, Arc<TokenBucket>>>>,
}

impl RateLimiter {
    /// Creates a rate limiter whose buckets share the given parameters
    pub fn new(capacity: u32, refill_per_sec: f64) -> Result<Self> {
        // Validate once up front so per-host creation cannot fail later
        TokenBucket::new(capacity, refill_per_sec)?;
        Ok(Self {
            capacity,
            refill_per_sec,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Creates a rate limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        Self::new(config.capacity, config.refill_per_sec)
    }

    /// Acquires a single token for the given host, waiting if necessary
    pub async fn acquire(&self, host: &str) -> Result<()> {
        self.acquire_cost(host, 1).await
    }

    /// Acquires `cost` tokens for the given host
    pub async fn acquire_cost(&self, host: &str, cost: u32) -> Result<()> {
        let bucket = self.bucket(host).await?;
        bucket.acquire(cost).await
    }

    async fn bucket(&self, host: &str) -> Result<Arc<TokenBucket>> {
        let mut buckets = self.buckets.lock().await;
        if let Some(bucket) = buckets.get(host) {
            return Ok(Arc::clone(bucket));
        }
        let bucket = Arc::new(TokenBucket::new(self.capacity, self.refill_per_sec)?);
        buckets.insert(host.to_string(), Arc::clone(&bucket));
        Ok(bucket)
    }
}
