//! Process logger for the CLI.
//!
//! Log lines are kept in a bounded ring that the terminal UI renders; they
//! can also be echoed to stderr, which is the default in headless mode.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[cfg(unix)]
use std::fs::File;
#[cfg(unix)]
use std::io::{self, BufRead, BufReader};
#[cfg(unix)]
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
#[cfg(unix)]
use std::thread::{self, JoinHandle};

const LOG_CAPACITY: usize = 500;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct SharedLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}", record.level(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        push_line(&self.buffer, line);
    }

    fn flush(&self) {}
}

fn push_line(buffer: &LogBuffer, line: String) {
    let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    if buffer.len() >= LOG_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();
static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

fn parse_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the logger. `MODPLAY_LOG_STDERR` overrides `echo_default`.
pub fn init(echo_default: bool) -> LogBuffer {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))))
        .clone();

    let level = std::env::var("RUST_LOG")
        .map(|level| parse_level(&level))
        .unwrap_or(LevelFilter::Info);

    let echo_stderr = std::env::var("MODPLAY_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(echo_default);

    let logger = SharedLogger {
        level,
        buffer: buffer.clone(),
        echo_stderr,
    };

    let logger_ref = LOGGER.get_or_init(|| logger);
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }

    buffer
}

pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

/// Holds fd 2 pointed at the log pipe; dropping it puts the terminal back.
#[cfg(unix)]
pub struct StderrCapture {
    saved: OwnedFd,
    reader: Option<JoinHandle<()>>,
}

#[cfg(unix)]
impl Drop for StderrCapture {
    fn drop(&mut self) {
        // fd 2 held the last write end of the pipe, so the reader sees EOF.
        unsafe {
            libc::dup2(self.saved.as_raw_fd(), libc::STDERR_FILENO);
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Route stderr into the log ring while the terminal UI owns the screen.
///
/// Output backends print device chatter straight to fd 2, which would tear
/// through the status panes.
#[cfg(unix)]
pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCapture> {
    match redirect_stderr(buffer) {
        Ok(capture) => Some(capture),
        Err(err) => {
            log::warn!("stderr stays on the terminal: {}", err);
            None
        }
    }
}

#[cfg(unix)]
fn redirect_stderr(buffer: LogBuffer) -> io::Result<StderrCapture> {
    let (read_end, write_end) = pipe()?;
    let saved = io::stderr().as_fd().try_clone_to_owned()?;
    if unsafe { libc::dup2(write_end.as_raw_fd(), libc::STDERR_FILENO) } < 0 {
        return Err(io::Error::last_os_error());
    }
    drop(write_end);

    let reader = thread::Builder::new()
        .name("modplay-stderr".into())
        .spawn(move || {
            for line in BufReader::new(File::from(read_end)).lines() {
                let Ok(line) = line else { break };
                if let Some(entry) = stderr_entry(&line) {
                    push_line(&buffer, entry);
                }
            }
        });
    let reader = match reader {
        Ok(reader) => reader,
        Err(err) => {
            unsafe {
                libc::dup2(saved.as_raw_fd(), libc::STDERR_FILENO);
            }
            return Err(err);
        }
    };

    Ok(StderrCapture {
        saved,
        reader: Some(reader),
    })
}

#[cfg(unix)]
fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // Both descriptors are fresh and owned by nobody else.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Ring entry for one captured stderr line; blank lines are dropped.
#[cfg_attr(not(unix), allow(dead_code))]
fn stderr_entry(line: &str) -> Option<String> {
    let line = line.trim_end();
    if line.trim_start().is_empty() {
        return None;
    }
    let tag = if line.starts_with("ALSA") || line.contains("cpal") {
        "OUTPUT"
    } else {
        "STDERR"
    };
    Some(format!("[{}] {}", tag, line))
}
