//! Backoff: how long to wait before a retry is handed back to the broker.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Backoff {
    /// Re-enqueue right away.
    #[default]
    Immediate,

    /// Same delay before every retry.
    Fixed(Duration),

    /// `base * multiplier^(attempts - 1)`, optionally capped.
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Option<Duration>,
    },
}

impl Backoff {
    /// Delay before the retry that follows failed attempt number `attempts` (1-indexed).
    ///
    /// Example with base=2s, multiplier=2.0:
    /// - attempt 1: 2s
    /// - attempt 2: 4s
    /// - attempt 3: 8s
    pub fn delay_for(&self, attempts: u32) -> Duration {
        match self {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * multiplier.powi(exponent);
                let cap = max.map_or(f64::MAX, |m| m.as_secs_f64());
                let secs = secs.min(cap);
                if secs.is_finite() && secs >= 0.0 {
                    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
                } else {
                    max.unwrap_or(Duration::MAX)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_never_waits() {
        assert_eq!(Backoff::Immediate.delay_for(1), Duration::ZERO);
        assert_eq!(Backoff::Immediate.delay_for(7), Duration::ZERO);
    }

    #[test]
    fn fixed_is_constant() {
        let b = Backoff::Fixed(Duration::from_secs(60));
        assert_eq!(b.delay_for(1), Duration::from_secs(60));
        assert_eq!(b.delay_for(3), Duration::from_secs(60));
    }

    #[test]
    fn exponential_backoff_increases() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(2),
            multiplier: 2.0,
            max: None,
        };
        assert_eq!(b.delay_for(1), Duration::from_secs(2));
        assert_eq!(b.delay_for(2), Duration::from_secs(4));
        assert_eq!(b.delay_for(3), Duration::from_secs(8));
        // attempts=0 is treated like the first attempt
        assert_eq!(b.delay_for(0), Duration::from_secs(2));
    }

    #[test]
    fn exponential_respects_cap() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(1),
            multiplier: 10.0,
            max: Some(Duration::from_secs(30)),
        };
        assert_eq!(b.delay_for(2), Duration::from_secs(10));
        assert_eq!(b.delay_for(3), Duration::from_secs(30));
        assert_eq!(b.delay_for(400), Duration::from_secs(30));
    }
}
