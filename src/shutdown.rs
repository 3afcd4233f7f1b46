use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Why a session stopped. Only the first stop request is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The operator pressed the exit key.
    ExitKey,
    /// Stop requested from outside the workers (Ctrl-C, SIGTERM, or a caller
    /// holding the session).
    External,
    /// The log could not be written.
    SinkFailed,
    WorkerPanicked,
}

/// The shared "session is active" signal.
///
/// Workers check `is_active()` at the top of every iteration; that check is a
/// single atomic load and never blocks. The ACTIVE -> INACTIVE transition
/// happens under `reason`'s lock so that concurrent stop requests are
/// serialised and exactly one of them wins. There is no way back to ACTIVE.
pub struct Shutdown {
    active: AtomicBool,
    reason: Mutex<Option<StopReason>>,
    stopped: Condvar,
}

impl Shutdown {
    pub fn new() -> Shutdown {
        Shutdown {
            active: AtomicBool::new(true),
            reason: Mutex::new(None),
            stopped: Condvar::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns true if this call stopped the session, false if it had already
    /// been stopped.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        let mut current = self.lock_reason();
        if current.is_some() {
            return false;
        }
        *current = Some(reason);
        self.active.store(false, Ordering::Release);
        self.stopped.notify_all();
        tracing::debug!(?reason, "session stop requested");
        true
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.lock_reason()
    }

    /// Sleeps for up to `timeout`, waking early if the session is stopped in
    /// the meantime. Returns whether the session is still active.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.lock_reason();
        while current.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            current = self
                .stopped
                .wait_timeout(current, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        current.is_none()
    }

    // Nothing panics while holding the lock, but if it ever did the Option is
    // still consistent.
    fn lock_reason(&self) -> MutexGuard<'_, Option<StopReason>> {
        self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_stop() {
        let shutdown = Shutdown::new();
        assert!(shutdown.is_active());
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.request_stop(StopReason::ExitKey));
        assert!(!shutdown.is_active());
        assert_eq!(shutdown.reason(), Some(StopReason::ExitKey));

        assert!(
            !shutdown.request_stop(StopReason::External),
            "second stop request must be a no-op"
        );
        assert!(!shutdown.is_active());
        assert_eq!(
            shutdown.reason(),
            Some(StopReason::ExitKey),
            "first reason is kept"
        );
    }

    #[test]
    fn test_concurrent_stop_transitions_once() {
        for _ in 0..50 {
            let shutdown = Arc::new(Shutdown::new());
            let threads: Vec<_> = (0..8)
                .map(|i| {
                    let shutdown = shutdown.clone();
                    thread::spawn(move || {
                        let reason = if i % 2 == 0 {
                            StopReason::ExitKey
                        } else {
                            StopReason::External
                        };
                        shutdown.request_stop(reason)
                    })
                })
                .collect();
            let winners = threads
                .into_iter()
                .map(|thread| thread.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
            assert!(!shutdown.is_active());
            assert!(shutdown.reason().is_some());
        }
    }

    #[test]
    fn test_wait_timeout_while_active() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(shutdown.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_timeout_wakes_on_stop() {
        let shutdown = Arc::new(Shutdown::new());
        let stopper = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.request_stop(StopReason::External);
            })
        };
        let start = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_after_stop_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.request_stop(StopReason::SinkFailed);
        let start = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
