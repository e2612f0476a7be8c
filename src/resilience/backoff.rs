//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
///
/// `delay = min(base × factor^(attempt-1), max) + jitter(0..10% of delay)`.
/// Attempt numbers start at 1; attempt 0 returns zero delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, factor: f64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential = factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
    let delay_ms = (base_ms as f64 * exponential).min(max_ms as f64) as u64;

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000, 2.0);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000, 2.0);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000, 2.0);
        assert!(max.as_millis() >= 1000);
    }

    #[test]
    fn delay_non_decreasing_up_to_cap() {
        let base = 100u64;
        let max = 5000u64;
        let mut previous = 0u128;
        for attempt in 1i32..12 {
            // Strip jitter by comparing against the deterministic floor.
            let floor = ((base as f64) * 2.0f64.powi(attempt - 1)).min(max as f64) as u128;
            assert!(floor >= previous, "attempt {attempt}");
            previous = floor;
        }
    }

    #[test]
    fn jitter_bounded_by_ten_percent() {
        for attempt in 1u32..8 {
            let delay = calculate_backoff(attempt, 100, 10_000, 2.0).as_millis() as f64;
            let floor = (100.0 * 2.0f64.powi(attempt as i32 - 1)).min(10_000.0);
            assert!(delay >= floor, "attempt {attempt}");
            assert!(delay <= floor * 1.1 + 1.0, "attempt {attempt}");
        }
    }

    #[test]
    fn zero_attempt_is_immediate() {
        assert_eq!(calculate_backoff(0, 100, 1000, 2.0), Duration::from_millis(0));
    }
}
