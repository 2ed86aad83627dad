//! Exponential backoff with jitter
//!
//! The delay before retry `n` (1-based) is `initial * factor^(n-1)`, capped at
//! `max`, then shifted by a uniform offset in `[-jitter, +jitter]` and clamped
//! at zero.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: Duration,
}

impl Backoff {
    /// Factors below 1.0 (or NaN) are treated as 1.0 so delays never shrink
    pub fn new(initial_delay: Duration, max_delay: Duration, factor: f64, jitter: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            factor: factor.max(1.0),
            jitter,
        }
    }

    /// Delay before jitter for the given retry number
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_ms = self.max_delay.as_millis() as f64;
        let millis = self.initial_delay.as_millis() as f64 * self.factor.powi(exponent);

        if !millis.is_finite() || millis >= max_ms {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    pub fn compute_delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Jittered delay, always within `[base - jitter, base + jitter]` floored at zero
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt).as_millis();
        let jitter = self.jitter.as_millis();

        // offset drawn from [0, 2 * jitter] and shifted down by jitter
        let millis = if jitter > 0 {
            let offset = rng.gen_range(0..=jitter * 2);
            (base + offset).saturating_sub(jitter)
        } else {
            base
        };
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn backoff(jitter_ms: u64) -> Backoff {
        Backoff::new(
            Duration::from_millis(500),
            Duration::from_millis(300_000),
            2.0,
            Duration::from_millis(jitter_ms),
        )
    }

    #[test]
    fn test_base_delay_grows_exponentially() {
        let b = backoff(0);
        assert_eq!(b.base_delay(1), Duration::from_millis(500));
        assert_eq!(b.base_delay(2), Duration::from_millis(1000));
        assert_eq!(b.base_delay(3), Duration::from_millis(2000));
        assert_eq!(b.base_delay(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_base_delay_is_capped() {
        let b = backoff(0);
        assert_eq!(b.base_delay(20), Duration::from_millis(300_000));
        assert_eq!(b.base_delay(u32::MAX), Duration::from_millis(300_000));
    }

    #[test]
    fn test_base_delay_is_monotonic() {
        let b = backoff(0);
        let mut previous = Duration::ZERO;
        for attempt in 1..40 {
            let delay = b.base_delay(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let b = backoff(100);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..6 {
            let base = b.base_delay(attempt).as_millis() as i64;
            for _ in 0..200 {
                let delay = b.delay_with(attempt, &mut rng).as_millis() as i64;
                assert!(delay >= base - 100 && delay <= base + 100);
            }
        }
    }

    #[test]
    fn test_jitter_never_goes_negative() {
        let b = Backoff::new(
            Duration::from_millis(10),
            Duration::from_millis(1000),
            2.0,
            Duration::from_millis(500),
        );
        let mut rng = StdRng::seed_from_u64(42);
        let delays: Vec<_> = (0..500).map(|_| b.delay_with(1, &mut rng)).collect();
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(510)));
        assert!(delays.iter().any(|d| d.is_zero()));
    }

    #[test]
    fn test_huge_delays_do_not_overflow() {
        let b = Backoff::new(
            Duration::from_millis(i64::MAX as u64),
            Duration::from_millis(i64::MAX as u64),
            2.0,
            Duration::from_millis(100),
        );
        let mut rng = StdRng::seed_from_u64(3);
        let delay = b.delay_with(1, &mut rng);
        assert!(delay >= Duration::from_millis(i64::MAX as u64 - 100));
        assert!(delay <= Duration::from_millis(i64::MAX as u64 + 100));
    }

    #[test]
    fn test_delay_near_u64_max_stays_in_range() {
        let max = Duration::from_millis(u64::MAX);
        let b = Backoff::new(Duration::from_millis(1000), max, 2.0, Duration::from_millis(100));
        let mut rng = StdRng::seed_from_u64(11);

        assert_eq!(b.base_delay(70), max);
        for _ in 0..100 {
            let delay = b.delay_with(70, &mut rng);
            assert!(delay >= max - Duration::from_millis(100));
            assert!(delay <= max);
        }
    }

    #[test]
    fn test_huge_jitter_is_floored_at_zero() {
        let b = Backoff::new(
            Duration::from_millis(10),
            Duration::from_millis(1000),
            2.0,
            Duration::from_millis(u64::MAX),
        );
        let mut rng = StdRng::seed_from_u64(5);
        let delays: Vec<_> = (0..100).map(|_| b.delay_with(1, &mut rng)).collect();
        assert!(delays.iter().any(|d| d.is_zero()));
    }

    #[test]
    fn test_factor_below_one_is_flat() {
        let b = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            0.5,
            Duration::ZERO,
        );
        assert_eq!(b.base_delay(1), Duration::from_millis(100));
        assert_eq!(b.base_delay(5), Duration::from_millis(100));
    }
}
