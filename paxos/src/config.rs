//! Cluster and proposer configuration

use std::{future::Future, time::Duration};

use error_stack::Report;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::ConfigError;

/// Configuration for exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial backoff duration
    pub initial: Duration,
    /// Maximum backoff duration
    pub max: Duration,
    /// Multiplier for each retry (typically 2.0)
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Calculate backoff duration for a given retry count with jitter
    #[must_use]
    pub fn duration(&self, retries: u32, rng: &mut impl Rng) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(retries.cast_signed());
        let capped = base.min(self.max.as_secs_f64());
        // 50% to 150% of the capped duration
        let jitter_factor = rng.random_range(0.5..1.5);
        Duration::from_secs_f64(capped * jitter_factor)
    }
}

/// Sleep function trait for testing with different runtimes (tokio vs turmoil)
pub trait Sleep: Clone + Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Tokio-based sleep implementation
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The fixed set of acceptors taking part in consensus.
///
/// N is the number of addresses; it never changes for the life of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig<A> {
    acceptors: Vec<A>,
}

impl<A> ClusterConfig<A> {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `acceptors` is empty.
    pub fn new(acceptors: impl IntoIterator<Item = A>) -> Result<Self, Report<ConfigError>> {
        let acceptors: Vec<A> = acceptors.into_iter().collect();
        if acceptors.is_empty() {
            return Err(Report::new(ConfigError).attach("a cluster needs at least one acceptor"));
        }
        Ok(Self { acceptors })
    }

    #[must_use]
    pub fn acceptors(&self) -> &[A] {
        &self.acceptors
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.acceptors.len()
    }

    /// Always false once validated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acceptors.is_empty()
    }
}

/// Proposer configuration with RNG for jitter
pub struct ProposerConfig<S: Sleep = TokioSleep, R: Rng = StdRng> {
    /// How long each phase waits for responses
    pub phase_timeout: Duration,
    /// Extra attempts per exchange after a channel error
    pub max_retries: u32,
    /// Backoff between exchange retries and between whole attempts
    pub backoff: BackoffConfig,
    /// Sleep implementation
    pub sleep: S,
    /// RNG for jitter (seeded for deterministic tests)
    pub rng: R,
}

impl<S: Sleep, R: Rng> ProposerConfig<S, R> {
    pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Create a new proposer config with a custom RNG
    pub fn new(backoff: BackoffConfig, sleep: S, rng: R) -> Self {
        Self {
            phase_timeout: Self::DEFAULT_PHASE_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            backoff,
            sleep,
            rng,
        }
    }

    #[must_use]
    pub fn phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

impl<S: Sleep> ProposerConfig<S, StdRng> {
    /// Create a proposer config with a seeded RNG for deterministic behavior
    #[must_use]
    pub fn with_seed(backoff: BackoffConfig, sleep: S, seed: u64) -> Self {
        Self::new(backoff, sleep, StdRng::seed_from_u64(seed))
    }
}

impl Default for ProposerConfig<TokioSleep, StdRng> {
    fn default() -> Self {
        Self::new(BackoffConfig::default(), TokioSleep, StdRng::from_os_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let backoff = BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(400),
            multiplier: 2.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        for (retries, base_ms) in [(0, 100.0), (1, 200.0), (2, 400.0), (5, 400.0)] {
            let d = backoff.duration(retries, &mut rng).as_secs_f64() * 1000.0;
            assert!(d >= base_ms * 0.5 && d <= base_ms * 1.5, "{retries}: {d}");
        }
    }

    #[test]
    fn empty_cluster_rejected() {
        assert!(ClusterConfig::<u16>::new([]).is_err());
        let cluster = ClusterConfig::new([1, 2, 3]).unwrap();
        assert_eq!(cluster.len(), 3);
        assert_eq!(cluster.acceptors(), &[1, 2, 3]);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ProposerConfig::with_seed(BackoffConfig::default(), TokioSleep, 0)
            .phase_timeout(Duration::from_millis(50))
            .max_retries(0);
        assert_eq!(config.phase_timeout, Duration::from_millis(50));
        assert_eq!(config.max_retries, 0);
    }
}
