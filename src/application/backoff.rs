//! Exponential backoff schedule shared by the chat reconnect loop and the
//! gateway retry decorator.
//!
//! The base schedule is monotone: each delay is at least the previous one and
//! never above the cap. Jitter is added on top when sleeping and never feeds
//! back into the schedule.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::reconnection::ReconnectionConfig;

/// Doubling (or any multiplier) delay schedule with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1.0),
            current: initial,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn from_config(config: &ReconnectionConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
        )
    }

    /// Return the current base delay and advance the schedule.
    pub fn next_base(&mut self) -> Duration {
        let delay = self.current;
        self.attempts = self.attempts.saturating_add(1);
        let next_ms = (self.current.as_millis() as f64 * self.multiplier) as u64;
        self.current = Duration::from_millis(next_ms).min(self.max);
        delay
    }

    /// Next base delay plus up to 20% random jitter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.next_base();
        base + jitter(base)
    }

    /// Back to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    /// Delays handed out since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }
}

fn jitter(base: Duration) -> Duration {
    let range_ms = (base.as_millis() as u64) / 5;
    if range_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=range_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(10), Duration::from_millis(100), 2.0)
    }

    #[test]
    fn doubles_until_cap() {
        let mut b = backoff();
        let delays: Vec<u64> = (0..6).map(|_| b.next_base().as_millis() as u64).collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 100, 100]);
        assert_eq!(b.attempts(), 6);
    }

    #[test]
    fn schedule_is_monotone() {
        let mut b = Backoff::new(Duration::from_millis(3), Duration::from_millis(1000), 1.7);
        let mut previous = Duration::ZERO;
        for _ in 0..50 {
            let next = b.next_base();
            assert!(next >= previous);
            assert!(next <= Duration::from_millis(1000));
            previous = next;
        }
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let mut b = backoff();
        for base_ms in [10u64, 20, 40, 80, 100] {
            let delay = b.next_delay().as_millis() as u64;
            assert!(
                (base_ms..=base_ms + base_ms / 5).contains(&delay),
                "delay {delay} not within {base_ms}..={}",
                base_ms + base_ms / 5
            );
        }
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut b = backoff();
        b.next_base();
        b.next_base();
        b.reset();
        assert_eq!(b.current(), Duration::from_millis(10));
        assert_eq!(b.attempts(), 0);
    }

    #[test]
    fn multiplier_below_one_is_clamped() {
        let mut b = Backoff::new(Duration::from_millis(50), Duration::from_millis(10), 0.5);
        assert_eq!(b.next_base(), Duration::from_millis(50));
        assert_eq!(b.next_base(), Duration::from_millis(50));
    }
}
