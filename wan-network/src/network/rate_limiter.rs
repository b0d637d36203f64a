//! Fixed-window admission control, keyed by source address.
//!
//! Each source gets a byte budget of `rate_bps / 8 * window` per window. The window of a source
//! starts with its first packet and restarts with the first packet sent after it elapsed. Bursts
//! straddling a window boundary can therefore reach up to twice the budget.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimiter {
    rate_bps: u64,
    window: Duration,
    windows: HashMap<Ipv4Addr, WindowState>,
    dropped_packets: u64,
}

#[derive(Debug)]
struct WindowState {
    window_start: Duration,
    bytes_in_window: u64,
}

impl RateLimiter {
    pub fn new(rate_bps: u64, window: Duration) -> Self {
        Self {
            rate_bps,
            window,
            windows: HashMap::new(),
            dropped_packets: 0,
        }
    }

    pub fn rate_bps(&self) -> u64 {
        self.rate_bps
    }

    /// The amount of bytes a single source may send per window
    pub fn max_bytes_per_window(&self) -> u64 {
        let bits = self.rate_bps as u128 * self.window.as_nanos() / 1_000_000_000;
        (bits / 8) as u64
    }

    /// Returns whether a packet of `size_bytes` from `source` is admitted at time `now`
    pub fn allow(&mut self, now: Duration, source: Ipv4Addr, size_bytes: usize) -> bool {
        let max_bytes = self.max_bytes_per_window();
        let state = self.windows.entry(source).or_insert(WindowState {
            window_start: now,
            bytes_in_window: 0,
        });

        if now.saturating_sub(state.window_start) >= self.window {
            state.window_start = now;
            state.bytes_in_window = 0;
        }

        let size_bytes = size_bytes as u64;
        if state.bytes_in_window + size_bytes <= max_bytes {
            state.bytes_in_window += size_bytes;
            true
        } else {
            self.dropped_packets += 1;
            false
        }
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ATTACKER: Ipv4Addr = Ipv4Addr::new(10, 1, 3, 1);
    const CLIENT: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 1);

    #[test]
    fn test_budget_is_derived_from_rate_and_window() {
        assert_eq!(RateLimiter::new(3_000_000, DEFAULT_WINDOW).max_bytes_per_window(), 375_000);
        assert_eq!(
            RateLimiter::new(8_000, Duration::from_millis(500)).max_bytes_per_window(),
            500
        );
    }

    #[test]
    fn test_exact_budget_is_admitted_and_one_more_byte_is_not() {
        let mut limiter = RateLimiter::new(8_000, DEFAULT_WINDOW);
        let now = Duration::from_secs(3);

        assert!(limiter.allow(now, ATTACKER, 600));
        assert!(limiter.allow(now, ATTACKER, 400));
        assert!(!limiter.allow(now, ATTACKER, 1));
        assert_eq!(limiter.dropped_packets(), 1);
    }

    #[test]
    fn test_admitted_bytes_never_exceed_budget_within_a_window() {
        let mut limiter = RateLimiter::new(2_000_000, DEFAULT_WINDOW);
        let mut admitted = 0;
        for i in 0..1000 {
            let now = Duration::from_millis(i);
            if limiter.allow(now, ATTACKER, 1052) {
                admitted += 1052;
            }
        }

        assert!(admitted <= limiter.max_bytes_per_window());
        assert_eq!(admitted, 237 * 1052);
        assert_eq!(limiter.dropped_packets(), 1000 - 237);
    }

    #[test]
    fn test_window_resets_once_elapsed() {
        let mut limiter = RateLimiter::new(8_000, DEFAULT_WINDOW);
        assert!(limiter.allow(Duration::from_millis(100), ATTACKER, 1000));
        assert!(!limiter.allow(Duration::from_millis(1099), ATTACKER, 1));

        // The window started at the first packet, so it elapses at 1.1s
        assert!(limiter.allow(Duration::from_millis(1100), ATTACKER, 1000));
    }

    #[test]
    fn test_sources_are_limited_independently() {
        let mut limiter = RateLimiter::new(8_000, DEFAULT_WINDOW);
        assert!(limiter.allow(Duration::ZERO, ATTACKER, 1000));
        assert!(!limiter.allow(Duration::ZERO, ATTACKER, 100));
        assert!(limiter.allow(Duration::ZERO, CLIENT, 1000));
    }

    #[test]
    fn test_burst_around_window_boundary_reaches_twice_the_budget() {
        let mut limiter = RateLimiter::new(8_000, DEFAULT_WINDOW);
        assert!(limiter.allow(Duration::ZERO, ATTACKER, 1));

        // End of the first window
        assert!(limiter.allow(Duration::from_millis(999), ATTACKER, 999));

        // Start of the next one, only 1ms later
        assert!(limiter.allow(Duration::from_millis(1000), ATTACKER, 1000));

        // 2000 bytes admitted within 1ms, twice the per-window budget
        assert_eq!(limiter.dropped_packets(), 0);
    }
}
