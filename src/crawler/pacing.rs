//! Request pacing
//!
//! Every poll of the feed is followed by a randomized pause. Most pauses are
//! short; every `request_threshold`-th one is an extended cooldown. The
//! request counter lives for one run and is never shared between runs.

use crate::config::{DelayRange, RateLimitConfig};
use crate::crawler::sleep_unless_cancelled;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which delay range a paced request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayRegime {
    Short,
    Long,
}

/// Picks the regime for the `count`-th request (1-based)
///
/// Multiples of `threshold` take the long regime. A threshold of zero never
/// does.
pub fn select_regime(count: u64, threshold: u32) -> DelayRegime {
    if threshold > 0 && count % u64::from(threshold) == 0 {
        DelayRegime::Long
    } else {
        DelayRegime::Short
    }
}

/// Draws a delay uniformly from the closed interval
pub fn sample_delay<R: Rng + ?Sized>(rng: &mut R, range: &DelayRange) -> Duration {
    let secs = if range.min >= range.max {
        range.min
    } else {
        rng.gen_range(range.as_range())
    };
    Duration::from_secs_f64(secs.max(0.0))
}

/// Per-run rate limiter
pub struct Pacer<R = StdRng> {
    config: RateLimitConfig,
    request_count: u64,
    rng: R,
}

impl Pacer<StdRng> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> Pacer<R> {
    /// Creates a pacer with a caller-supplied random source
    pub fn with_rng(config: RateLimitConfig, rng: R) -> Self {
        Self {
            config,
            request_count: 0,
            rng,
        }
    }

    /// Restarts the request count for a new run
    pub fn reset(&mut self) {
        self.request_count = 0;
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Counts one request and returns the delay that should follow it
    pub fn next_delay(&mut self) -> (DelayRegime, Duration) {
        self.request_count += 1;
        let regime = select_regime(self.request_count, self.config.request_threshold);
        let range = match regime {
            DelayRegime::Short => &self.config.short_delay,
            DelayRegime::Long => &self.config.long_delay,
        };
        (regime, sample_delay(&mut self.rng, range))
    }

    /// Counts one request and sleeps the sampled delay
    ///
    /// # Returns
    ///
    /// * `true` - The delay elapsed
    /// * `false` - Cancellation cut the delay short
    pub async fn pace(&mut self, token: &CancellationToken) -> bool {
        let (regime, delay) = self.next_delay();
        match regime {
            DelayRegime::Long => tracing::info!(
                "Request {} reached the pacing threshold, cooling down for {:.1}s",
                self.request_count,
                delay.as_secs_f64()
            ),
            DelayRegime::Short => tracing::debug!(
                "Pausing {:.1}s after request {}",
                delay.as_secs_f64(),
                self.request_count
            ),
        }
        sleep_unless_cancelled(delay, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(config: RateLimitConfig) -> Pacer<StdRng> {
        Pacer::with_rng(config, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_every_threshold_multiple_is_long() {
        let mut pacer = seeded(RateLimitConfig::default());

        for n in 1..=30u64 {
            let (regime, delay) = pacer.next_delay();
            if n % 10 == 0 {
                assert_eq!(regime, DelayRegime::Long, "request {}", n);
                assert!(DelayRange::new(30.0, 60.0).contains(delay));
            } else {
                assert_eq!(regime, DelayRegime::Short, "request {}", n);
                assert!(DelayRange::new(6.0, 15.0).contains(delay));
            }
        }
        assert_eq!(pacer.request_count(), 30);
    }

    #[test]
    fn test_select_regime() {
        assert_eq!(select_regime(1, 10), DelayRegime::Short);
        assert_eq!(select_regime(10, 10), DelayRegime::Long);
        assert_eq!(select_regime(11, 10), DelayRegime::Short);
        assert_eq!(select_regime(3, 1), DelayRegime::Long);
        assert_eq!(select_regime(10, 0), DelayRegime::Short);
    }

    #[test]
    fn test_samples_stay_in_closed_interval() {
        let mut rng = StdRng::seed_from_u64(42);
        let range = DelayRange::new(2.0, 3.0);
        for _ in 0..1000 {
            assert!(range.contains(sample_delay(&mut rng, &range)));
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = sample_delay(&mut rng, &DelayRange::new(4.0, 4.0));
        assert_eq!(delay, Duration::from_secs(4));
    }

    #[test]
    fn test_reset_restarts_count() {
        let mut pacer = seeded(RateLimitConfig::default());
        for _ in 0..9 {
            pacer.next_delay();
        }
        pacer.reset();
        assert_eq!(pacer.next_delay().0, DelayRegime::Short);
        assert_eq!(pacer.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_sleeps_sampled_delay() {
        let config = RateLimitConfig {
            request_threshold: 2,
            short_delay: DelayRange::new(5.0, 5.0),
            long_delay: DelayRange::new(20.0, 20.0),
        };
        let mut pacer = seeded(config);
        let token = CancellationToken::new();

        let started = tokio::time::Instant::now();
        assert!(pacer.pace(&token).await);
        assert!(pacer.pace(&token).await);
        assert_eq!(started.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_stops_on_cancel() {
        let mut pacer = seeded(RateLimitConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        assert!(!pacer.pace(&token).await);
        assert_eq!(pacer.request_count(), 1);
    }
}
