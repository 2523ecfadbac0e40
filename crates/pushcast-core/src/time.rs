//! Clock abstraction for retry backoff and health timestamps.
//!
//! Dispatchers sleep between delivery retries through a [`Clock`] so tests
//! can substitute [`TestClock`] and observe backoff without waiting.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Source of time for dispatchers and health reporting.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Returns the current wall-clock time.
    fn now_system(&self) -> SystemTime;

    /// Suspends for the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by the system and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual clock for tests.
///
/// `sleep` advances virtual time immediately and yields, and every sleep is
/// counted so tests can assert on how often a dispatcher backed off. Clones
/// share state.
#[derive(Debug, Clone)]
pub struct TestClock {
    elapsed_ns: Arc<AtomicU64>,
    sleeps: Arc<AtomicU64>,
    base_instant: Instant,
    base_system: SystemTime,
}

impl TestClock {
    /// Creates a test clock starting at the current time.
    pub fn new() -> Self {
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            sleeps: Arc::new(AtomicU64::new(0)),
            base_instant: Instant::now(),
            base_system: SystemTime::now(),
        }
    }

    /// Creates a test clock whose wall time starts at `start`.
    pub fn with_start_time(start: SystemTime) -> Self {
        Self { base_system: start, ..Self::new() }
    }

    /// Advances virtual time.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Total virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    /// Number of `sleep` calls observed.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::Acquire)
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn now_system(&self) -> SystemTime {
        self.base_system + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.sleeps.fetch_add(1, Ordering::AcqRel);
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}

/// Seconds since the Unix epoch for a clock reading.
pub fn unix_seconds(clock: &dyn Clock) -> u64 {
    clock.now_system().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(10));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(10));
    }

    #[test]
    fn test_clock_system_time() {
        let start = UNIX_EPOCH + Duration::from_secs(1000);
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_system(), start);
        assert_eq!(unix_seconds(&clock), 1000);

        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now_system(), start + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_clock_sleep_counts_and_advances() {
        let clock = TestClock::new();

        clock.sleep(Duration::from_secs(5)).await;
        clock.sleep(Duration::from_secs(2)).await;

        assert_eq!(clock.elapsed(), Duration::from_secs(7));
        assert_eq!(clock.sleep_count(), 2);
    }

    #[test]
    fn clones_share_state() {
        let clock = TestClock::new();
        let other = clock.clone();

        other.advance(Duration::from_millis(250));

        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }
}
