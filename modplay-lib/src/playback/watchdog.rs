//! Liveness timer for the session thread.
//!
//! The timer thread sleeps on a condvar until the deadline; every
//! `refresh` pushes the deadline out by one interval. When the deadline
//! passes the timeout action runs once and the timer disarms itself.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::warn;

/// Action invoked when the watchdog expires.
pub type TimeoutAction = Arc<dyn Fn() + Send + Sync>;

struct TimerState {
    deadline: Instant,
    armed: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Restartable one-shot deadline timer.
pub struct Watchdog {
    interval: Duration,
    shared: Arc<Shared>,
    action: TimeoutAction,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub fn new(interval: Duration, action: TimeoutAction) -> Self {
        Self {
            interval,
            shared: Arc::new(Shared {
                state: Mutex::new(TimerState {
                    deadline: Instant::now(),
                    armed: false,
                }),
                wake: Condvar::new(),
            }),
            action,
            thread_handle: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the timer with a fresh deadline, replacing any running timer.
    pub fn start(&self) {
        self.stop();
        {
            let mut state = self.lock_state();
            state.armed = true;
            state.deadline = Instant::now() + self.interval;
        }
        let shared = self.shared.clone();
        let action = self.action.clone();
        let spawned = thread::Builder::new()
            .name("modplay-watchdog".to_string())
            .spawn(move || run(shared, action));
        match spawned {
            Ok(handle) => {
                *self
                    .thread_handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => {
                warn!("failed to spawn watchdog thread: {}", err);
                self.lock_state().armed = false;
            }
        }
    }

    /// Push the deadline one interval into the future.
    pub fn refresh(&self) {
        let mut state = self.lock_state();
        state.deadline = Instant::now() + self.interval;
    }

    /// Disarm the timer.
    ///
    /// Once this returns the timeout action is either finished or will never
    /// run. Calling it from inside the action skips the join.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            state.armed = false;
        }
        self.shared.wake.notify_all();

        let handle = self
            .thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("watchdog thread panicked during join");
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock_state().armed
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<Shared>, action: TimeoutAction) {
    let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if !state.armed {
            return;
        }
        let now = Instant::now();
        if now >= state.deadline {
            state.armed = false;
            break;
        }
        let wait = state.deadline - now;
        state = shared
            .wake
            .wait_timeout(state, wait)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0);
    }
    drop(state);
    action();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_watchdog(interval_ms: u64) -> (Watchdog, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let watchdog = Watchdog::new(
            Duration::from_millis(interval_ms),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (watchdog, fired)
    }

    #[test]
    fn fires_once_when_not_refreshed() {
        let (watchdog, fired) = counting_watchdog(40);
        watchdog.start();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!watchdog.is_armed());
    }

    #[test]
    fn regular_refresh_prevents_timeout() {
        let (watchdog, fired) = counting_watchdog(150);
        watchdog.start();
        for _ in 0..12 {
            thread::sleep(Duration::from_millis(25));
            watchdog.refresh();
        }
        watchdog.stop();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_prevents_late_fire() {
        let (watchdog, fired) = counting_watchdog(60);
        watchdog.start();
        watchdog.stop();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn restart_rearms_after_firing() {
        let (watchdog, fired) = counting_watchdog(30);
        watchdog.start();
        thread::sleep(Duration::from_millis(150));
        watchdog.start();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stop_from_inside_action_does_not_deadlock() {
        let slot: Arc<Mutex<Option<Arc<Watchdog>>>> = Arc::new(Mutex::new(None));
        let fired = Arc::new(AtomicUsize::new(0));
        let action_slot = slot.clone();
        let counter = fired.clone();
        let watchdog = Arc::new(Watchdog::new(
            Duration::from_millis(20),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(dog) = action_slot.lock().unwrap().as_ref() {
                    dog.stop();
                }
            }),
        ));
        *slot.lock().unwrap() = Some(watchdog.clone());
        watchdog.start();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        slot.lock().unwrap().take();
    }
}
