use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Abstracts the monotonic clock the client and server consult for timeout
/// detection, so tests can drive time deterministically instead of sleeping.
pub trait TimeProvider: Debug {
    /// A monotonic instant, used for measuring elapsed time.
    fn now_instant(&self) -> Instant;
    /// Wall-clock milliseconds since the Unix epoch, used only for reporting.
    fn now_system_ms(&self) -> i64;
}

/// The real clock, backed by [`std::time::Instant`] and [`std::time::SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }

    fn now_system_ms(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A manual time provider for deterministic simulations.
#[derive(Debug)]
pub struct ManualTimeProvider {
    instant: std::sync::RwLock<Instant>,
    system_ms: std::sync::RwLock<i64>,
}

impl ManualTimeProvider {
    pub fn new(instant: Instant, system_ms: i64) -> Self {
        Self {
            instant: std::sync::RwLock::new(instant),
            system_ms: std::sync::RwLock::new(system_ms),
        }
    }

    pub fn set_time(&self, instant: Instant, system_ms: i64) {
        *self.instant.write().unwrap() = instant;
        *self.system_ms.write().unwrap() = system_ms;
    }

    pub fn advance(&self, duration: Duration) {
        *self.instant.write().unwrap() += duration;
        *self.system_ms.write().unwrap() += duration.as_millis() as i64;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_instant(&self) -> Instant {
        *self.instant.read().unwrap()
    }

    fn now_system_ms(&self) -> i64 {
        *self.system_ms.read().unwrap()
    }
}

impl<T: TimeProvider + ?Sized> TimeProvider for std::sync::Arc<T> {
    fn now_instant(&self) -> Instant {
        (**self).now_instant()
    }

    fn now_system_ms(&self) -> i64 {
        (**self).now_system_ms()
    }
}
