use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Set once by the Ctrl-C handler; every retry and poll delay waits on it.
///
/// The flag lives inside the mutex the waiters sleep on, so a trigger can
/// never slip in between a waiter checking the flag and going to sleep.
pub struct ShutdownSignal {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            triggered: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // a panicking holder cannot leave a bool half-written
        self.triggered.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn trigger(&self) {
        *self.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        *self.lock()
    }

    /// Sleeps for `duration` unless triggered first. Returns `true` if
    /// shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        let guard = self.lock();

        match self
            .condvar
            .wait_timeout_while(guard, duration, |triggered| !*triggered)
        {
            Ok((triggered, _)) => *triggered,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();

        assert!(!signal.wait(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!signal.is_shutdown());
    }

    #[test]
    fn test_wait_interrupted() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            (waiter.wait(Duration::from_secs(10)), start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        let (interrupted, elapsed) = handle.join().unwrap();
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_trigger_from_many_threads() {
        let signal = Arc::new(ShutdownSignal::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let waiter = Arc::clone(&signal);
                thread::spawn(move || waiter.wait(Duration::from_secs(10)))
            })
            .collect();

        signal.trigger();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_wait_after_trigger_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
