//! Request budget for the GitHub API

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::trace;

/// Fixed-window token bucket.
///
/// The bucket starts full and is refilled to capacity once per window; there
/// is no partial refill. Acquisition never waits.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<Mutex<BucketInner>>,
}

struct BucketInner {
    capacity: u32,
    tokens: u32,
    window: Duration,
    refill_at: Instant,
}

impl TokenBucket {
    /// Create a bucket holding `capacity` requests per `window`
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self::starting_at(capacity, window, Instant::now())
    }

    pub(crate) fn starting_at(capacity: u32, window: Duration, now: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BucketInner {
                capacity,
                tokens: capacity,
                window,
                refill_at: now + window,
            })),
        }
    }

    /// Take one token, or return false when the window's budget is spent
    pub async fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now()).await
    }

    pub(crate) async fn try_acquire_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock().await;

        if now >= inner.refill_at {
            inner.tokens = inner.capacity;
            inner.refill_at = now + inner.window;
            trace!(capacity = inner.capacity, "Rate limit budget refilled");
        }

        if inner.tokens == 0 {
            return false;
        }
        inner.tokens -= 1;
        true
    }

    /// Tokens left in the current window
    pub async fn remaining(&self) -> u32 {
        self.inner.lock().await.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exhausted_bucket_refills_after_window() {
        let start = Instant::now();
        let bucket = TokenBucket::starting_at(1, Duration::from_secs(3600), start);

        assert!(bucket.try_acquire_at(start).await);
        assert!(!bucket.try_acquire_at(start).await);
        assert!(!bucket.try_acquire_at(start + Duration::from_secs(3599)).await);

        let later = start + Duration::from_secs(3601);
        assert!(bucket.try_acquire_at(later).await);
        assert!(!bucket.try_acquire_at(later).await);
    }

    #[tokio::test]
    async fn test_capacity_is_honoured() {
        let bucket = TokenBucket::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(bucket.try_acquire().await);
        }
        assert!(!bucket.try_acquire().await);
        assert_eq!(bucket.remaining().await, 0);
    }

    #[tokio::test]
    async fn test_clones_share_budget() {
        let bucket = TokenBucket::new(1, Duration::from_secs(60));
        let other = bucket.clone();
        assert!(bucket.try_acquire().await);
        assert!(!other.try_acquire().await);
    }
}
