//! Public entry point for admission decisions.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use super::check::AdmissionCheck;
use super::clock::{Clock, SystemClock};
use super::credential::Credential;
use super::decision::AdmissionDecision;
use super::pool::CredentialPool;
use super::store::AdmissionStore;
use super::window::Dimension;
use crate::config::RateLimitingConfig;
use crate::error::Result;

/// Current occupancy of one credential's windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialUsage {
    pub credential_id: String,
    pub requests: u64,
    pub units_per_minute: u64,
    pub units_per_day: u64,
}

/// Sliding-window rate limiter that rotates across a pool of credentials.
///
/// The limiter holds no mutable state of its own; every window and the
/// rotation cursor live in the [`AdmissionStore`], so any number of
/// limiters in any number of processes can share one store.
///
/// # Store faults
///
/// `acquire` fails closed. If the store cannot run a credential's check,
/// that credential counts as rejected with a zero wait, and a pool where
/// every check failed yields `admitted: false, wait_seconds: 0.0`. Store
/// faults are logged and never returned as errors, so callers see an
/// immediate retry opportunity instead of an outage.
pub struct RateLimiter {
    pool: CredentialPool,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter with default window settings.
    pub fn new(credentials: Vec<Credential>, store: Arc<dyn AdmissionStore>) -> Result<Self> {
        Self::with_config(credentials, RateLimitingConfig::default(), store)
    }

    /// Create a rate limiter with explicit window settings.
    ///
    /// Fails with a configuration error if `credentials` is empty, repeats
    /// an id, or a window length is not positive.
    pub fn with_config(
        credentials: Vec<Credential>,
        config: RateLimitingConfig,
        store: Arc<dyn AdmissionStore>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = CredentialPool::new(credentials, AdmissionCheck::new(store, config))?;

        debug!(
            credentials = pool.len(),
            "Rate limiter initialized"
        );

        Ok(Self {
            pool,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decide whether a request may proceed now.
    ///
    /// Never sleeps: on rejection the caller waits `wait_seconds` itself and
    /// calls again. Only configuration errors are returned as `Err`.
    pub async fn acquire(&self) -> Result<AdmissionDecision> {
        let now = self.clock.now();
        trace!(now, "Acquiring admission");
        self.pool.scan(now).await
    }

    /// Occupancy of every window of `credential_id`, or `None` if the id is
    /// not in the pool.
    pub async fn usage(&self, credential_id: &str) -> Result<Option<CredentialUsage>> {
        if self.pool.credential(credential_id).is_none() {
            return Ok(None);
        }

        let now = self.clock.now();
        let check = self.pool.check();
        let mut counts = [0u64; 3];
        for (count, dimension) in counts.iter_mut().zip(Dimension::ALL) {
            let key = check.config().window_key(credential_id, dimension);
            *count = check
                .store()
                .occupancy(&key, check.config().window_secs(dimension), now)
                .await?;
        }

        Ok(Some(CredentialUsage {
            credential_id: credential_id.to_string(),
            requests: counts[0],
            units_per_minute: counts[1],
            units_per_day: counts[2],
        }))
    }

    /// Credential ids in rotation order.
    pub fn credential_ids(&self) -> &[String] {
        self.pool.credential_ids()
    }

    /// Current rotation cursor.
    pub async fn cursor(&self) -> usize {
        self.pool.cursor().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeygateError;
    use crate::ratelimit::testing::FailingStore;
    use crate::ratelimit::{ManualClock, MemoryStore};

    fn limiter(credentials: Vec<Credential>) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let limiter = RateLimiter::new(credentials, Arc::new(MemoryStore::new()))
            .unwrap()
            .with_clock(clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let result = RateLimiter::new(Vec::new(), Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(KeygateError::Config(_))));
    }

    #[test]
    fn test_invalid_window_rejected() {
        let config = RateLimitingConfig {
            request_window_secs: -1.0,
            ..RateLimitingConfig::default()
        };
        let result = RateLimiter::with_config(
            vec![Credential::new("a", 1, 1, 1)],
            config,
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(KeygateError::Config(_))));
    }

    #[tokio::test]
    async fn test_acquire_rotates_on_exhaustion() {
        let (limiter, _clock) = limiter(vec![
            Credential::new("api_key_1", 2, 5000, 100000),
            Credential::new("api_key_2", 1, 6000, 120000),
        ]);

        let ids: Vec<_> = futures::future::join_all((0..3).map(|_| limiter.acquire()))
            .await
            .into_iter()
            .map(|d| d.unwrap().credential_id.unwrap())
            .collect();
        assert_eq!(ids.iter().filter(|id| *id == "api_key_1").count(), 2);
        assert_eq!(ids.iter().filter(|id| *id == "api_key_2").count(), 1);

        let decision = limiter.acquire().await.unwrap();
        assert!(!decision.admitted);
        assert!((decision.wait_seconds - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_admitted_after_waiting() {
        let (limiter, clock) = limiter(vec![Credential::new("a", 1, 100, 100)]);

        assert!(limiter.acquire().await.unwrap().admitted);
        clock.advance(4.0);

        let decision = limiter.acquire().await.unwrap();
        assert!(!decision.admitted);
        assert!((decision.wait_seconds - 6.0).abs() < 1e-9);

        clock.advance(decision.wait_seconds);
        let decision = limiter.acquire().await.unwrap();
        assert!(decision.admitted);
        assert_eq!(decision.credential_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_usage_reports_each_window() {
        let (limiter, clock) = limiter(vec![Credential::new("a", 5, 100, 100)]);

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        clock.advance(10.0);

        let usage = limiter.usage("a").await.unwrap().unwrap();
        assert_eq!(usage.requests, 0);
        assert_eq!(usage.units_per_minute, 2);
        assert_eq!(usage.units_per_day, 2);
        assert!(limiter.usage("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_fault_not_raised() {
        let limiter = RateLimiter::new(vec![Credential::new("a", 1, 1, 1)], Arc::new(FailingStore))
            .unwrap();

        let decision = limiter.acquire().await.unwrap();
        assert_eq!(decision, AdmissionDecision::rejected(0.0));
        assert_eq!(limiter.cursor().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_acquire_never_exceeds_ceiling() {
        let (limiter, _clock) = limiter(vec![Credential::new("a", 7, 100, 100)]);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await.unwrap() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().admitted {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 7);
        let usage = limiter.usage("a").await.unwrap().unwrap();
        assert_eq!(usage.requests, 7);
        assert_eq!(usage.units_per_minute, 7);
    }
}
