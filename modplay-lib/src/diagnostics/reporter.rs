//! Periodic playback state reporter for visualization consumers.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::JoinHandle,
    time::Duration,
};

use serde::Serialize;

use crate::engine::FrameInfo;
use crate::playback::player::SessionState;

/// Snapshot of playback state sent to UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub time_ms: u64,
    pub info: FrameInfo,
    pub paused: bool,
    pub state: SessionState,
    pub file: Option<String>,
}

/// Produces the current [`Report`].
pub type ReportSource = Arc<dyn Fn() -> Report + Send + Sync>;

/// Background reporter that polls a [`ReportSource`] at fixed intervals and
/// forwards changed snapshots to a callback.
#[derive(Clone)]
pub struct Reporter {
    source: ReportSource,
    report: Arc<Mutex<dyn Fn(Report) + Send>>,
    interval: Duration,
    finish: Arc<AtomicBool>,
    thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reporter {
    /// Create a new reporter for the given source and callback.
    pub fn new(
        source: ReportSource,
        report: Arc<Mutex<dyn Fn(Report) + Send>>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            report,
            interval,
            finish: Arc::new(AtomicBool::new(false)),
            thread_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn run(&self) {
        let mut last_report: Option<Report> = None;

        loop {
            let report = (self.source)();

            if last_report.as_ref() != Some(&report) {
                (*self.report.lock().unwrap_or_else(PoisonError::into_inner))(report.clone());
                last_report = Some(report);
            }

            if self.finish.load(Ordering::Relaxed) {
                break;
            }

            std::thread::sleep(self.interval);
        }
    }

    /// Start the background reporting thread.
    pub fn start(&self) {
        self.stop();
        self.finish.store(false, Ordering::Relaxed);
        let this = self.clone();
        let spawned = std::thread::Builder::new()
            .name("modplay-reporter".to_string())
            .spawn(move || this.run());
        match spawned {
            Ok(handle) => {
                *self
                    .thread_handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => log::warn!("failed to spawn reporter thread: {}", err),
        }
    }

    /// Stop the background reporting thread.
    pub fn stop(&self) {
        self.finish.store(true, Ordering::Relaxed);
        let handle = self
            .thread_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                log::warn!("reporter stop called from reporter thread; skipping join");
            } else if handle.join().is_err() {
                log::warn!("reporter thread panicked during join");
            }
        }
    }
}
