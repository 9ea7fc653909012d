use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// The editor's recurring timer for the queue drain tick.
///
/// Editors typically refuse to register a timer twice or to unregister one
/// that is not registered, so the session always checks `is_registered`
/// first.
pub trait DrainScheduler: Send + Sync {
    fn is_registered(&self) -> bool;
    fn register(&self, interval: Duration);
    fn unregister(&self);
}

/// Scheduler for hosts that run their own loop and poll [`is_armed`] on each
/// pass, sleeping [`interval`] in between.
///
/// [`is_armed`]: PollingScheduler::is_armed
/// [`interval`]: PollingScheduler::interval
#[derive(Debug)]
pub struct PollingScheduler {
    armed: AtomicBool,
    interval_ms: AtomicU64,
    registrations: AtomicU64,
}

impl PollingScheduler {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            armed: AtomicBool::new(false),
            interval_ms: AtomicU64::new(default_interval.as_millis() as u64),
            registrations: AtomicU64::new(0),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// How many times the tick has been registered since creation.
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl DrainScheduler for PollingScheduler {
    fn is_registered(&self) -> bool {
        self.is_armed()
    }

    fn register(&self, interval: Duration) {
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
        if !self.armed.swap(true, Ordering::AcqRel) {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn unregister(&self) {
        self.armed.store(false, Ordering::Release);
    }
}
