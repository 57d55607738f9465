//! Failed-login throttling
//!
//! Sliding-window counter of failed logins per username. Once a username
//! reaches the limit, further attempts are refused until old failures age
//! out of the window.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct LoginThrottle {
    failures: Mutex<HashMap<String, Vec<Instant>>>,
    max_failures: usize,
    window: Duration,
}

impl LoginThrottle {
    /// `max_failures == 0` disables throttling.
    pub fn new(max_failures: usize, window: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            max_failures,
            window,
        }
    }

    /// Reserve a login attempt for `username`, or refuse it if the limit is reached.
    ///
    /// The check and the reservation happen under one lock, so parallel
    /// attempts cannot all slip past the limit. A reserved attempt counts as
    /// a failure until `clear` (success) or `release` (no verdict) undoes it.
    pub fn try_begin(&self, username: &str) -> bool {
        self.try_begin_at(username, Instant::now())
    }

    /// Give back an attempt that ended without a verdict on the credentials.
    pub fn release(&self, username: &str) {
        let mut failures = self.failures.lock();
        if let Some(times) = failures.get_mut(username) {
            times.pop();
            if times.is_empty() {
                failures.remove(username);
            }
        }
    }

    /// Forget the failure history after a successful login.
    pub fn clear(&self, username: &str) {
        self.failures.lock().remove(username);
    }

    /// Drop usernames whose failures have all aged out.
    pub fn purge_stale(&self) {
        let now = Instant::now();
        let window = self.window;
        self.failures.lock().retain(|_, times| {
            times.retain(|&t| now.duration_since(t) <= window);
            !times.is_empty()
        });
    }

    fn try_begin_at(&self, username: &str, now: Instant) -> bool {
        if self.max_failures == 0 {
            return true;
        }
        let mut failures = self.failures.lock();
        let times = failures.entry(username.to_string()).or_default();
        times.retain(|&t| now.duration_since(t) <= self.window);
        if times.len() >= self.max_failures {
            return false;
        }
        times.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit() {
        let throttle = LoginThrottle::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(throttle.try_begin("alice"));
        }
        assert!(!throttle.try_begin("alice"));
        assert!(throttle.try_begin("bob"));
    }

    #[test]
    fn clear_resets_history() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(60));
        assert!(throttle.try_begin("alice"));
        assert!(!throttle.try_begin("alice"));
        throttle.clear("alice");
        assert!(throttle.try_begin("alice"));
    }

    #[test]
    fn release_returns_the_attempt() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(60));
        assert!(throttle.try_begin("alice"));
        throttle.release("alice");
        assert!(throttle.try_begin("alice"));
        assert!(!throttle.try_begin("alice"));
    }

    #[test]
    fn failures_age_out_of_window() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(throttle.try_begin_at("alice", start));
        assert!(!throttle.try_begin_at("alice", start + Duration::from_secs(5)));
        assert!(throttle.try_begin_at("alice", start + Duration::from_secs(11)));
    }

    #[test]
    fn zero_limit_disables() {
        let throttle = LoginThrottle::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(throttle.try_begin("alice"));
        }
        assert!(throttle.failures.lock().is_empty());
    }

    #[test]
    fn parallel_attempts_respect_limit() {
        let throttle = std::sync::Arc::new(LoginThrottle::new(3, Duration::from_secs(60)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let throttle = std::sync::Arc::clone(&throttle);
                std::thread::spawn(move || throttle.try_begin("alice"))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn purge_drops_expired_entries() {
        let throttle = LoginThrottle::new(2, Duration::from_millis(1));
        assert!(throttle.try_begin("alice"));
        std::thread::sleep(Duration::from_millis(5));
        throttle.purge_stale();
        assert!(throttle.failures.lock().is_empty());
    }
}
