use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Per-host spacing of network requests.
///
/// A caller reserves the next slot of a host and sleeps until it. Reading the
/// previous slot and writing the new one happen under a single lock, so
/// concurrent workers hitting the same host queue up instead of racing.
#[derive(Debug, Default)]
pub struct HostThrottle {
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a request slot on `host` at least `gap` after the previous
    /// one and returns how long the caller must wait for it.
    pub fn reserve(&self, host: &str, gap: Duration) -> Duration {
        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
        let wait = match slots.get(host) {
            Some(last) => (*last + gap).saturating_duration_since(now),
            None => Duration::ZERO,
        };
        slots.insert(host.to_string(), now + wait);
        wait
    }

    pub async fn wait(&self, host: &str, gap: Duration) {
        let wait = self.reserve(host, gap);
        if !wait.is_zero() {
            log::debug!("Throttling {host} for {:.2}s", wait.as_secs_f32());
            tokio::time::sleep(wait).await;
        }
    }

    /// Last reserved slot of `host`, if any request went out to it
    pub fn last_fetch(&self, host: &str) -> Option<Instant> {
        self.next_slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(host)
            .copied()
    }
}

/// Uniform jitter in `[0, window)`, zero for an empty window
pub fn jitter(window: Duration) -> Duration {
    if window.is_zero() {
        return Duration::ZERO;
    }
    let secs = rand::rng().random_range(0.0..window.as_secs_f64());
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_request_to_host_does_not_wait() {
        let throttle = HostThrottle::new();
        assert_eq!(throttle.reserve("a.test", Duration::from_secs(3)), Duration::ZERO);
        assert_eq!(throttle.reserve("b.test", Duration::from_secs(3)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let throttle = HostThrottle::new();
        throttle.reserve("a.test", Duration::from_secs(3));
        assert_eq!(throttle.reserve("a.test", Duration::from_secs(3)), Duration::from_secs(3));
        // the second reservation pushed the slot forward
        assert_eq!(throttle.reserve("a.test", Duration::from_secs(3)), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_gap_means_no_wait() {
        let throttle = HostThrottle::new();
        throttle.reserve("a.test", Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(throttle.reserve("a.test", Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn jitter_stays_in_window() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(jitter(Duration::from_millis(500)) < Duration::from_millis(500));
        }
    }
}
