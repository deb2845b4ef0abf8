//! Shutdown signalling shared by the background threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Stop flag with a condvar so sleeping threads wake promptly on shutdown.
#[derive(Debug, Default)]
pub struct Shutdown {
    stopped: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl Shutdown {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether shutdown has been triggered.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Triggers shutdown and wakes every sleeper.
    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::Release);
        let _guard = self.lock.lock();
        self.wake.notify_all();
    }

    /// Sleeps up to `timeout`, waking early on shutdown.
    ///
    /// Returns `true` if shutdown has been triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        if self.is_stopped() {
            return true;
        }
        let _ = self.wake.wait_for(&mut guard, timeout);
        self.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_shutdown_wait_times_out() {
        let signal = Shutdown::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_shutdown_trigger_wakes_sleeper() {
        let signal = Arc::new(Shutdown::new());
        let s2 = Arc::clone(&signal);
        let started = Instant::now();
        let handle = thread::spawn(move || s2.wait_timeout(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        signal.trigger();
        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_shutdown_wait_after_trigger_returns_immediately() {
        let signal = Shutdown::new();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_secs(30)));
    }
}
