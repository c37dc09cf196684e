//! Debug logging for diagnosing store and rendering behaviour.
//!
//! Enable by setting environment variable: TRAINMAP_DEBUG_LOG=1
//! Logs are written to `trainmap-debug.log` in the system temp directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<std::sync::Mutex<std::fs::File>> = OnceLock::new();

pub const ENV_VAR: &str = "TRAINMAP_DEBUG_LOG";

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("trainmap-debug.log")
}

/// Initialize debug logging. Call once at startup.
pub fn init() {
    if std::env::var(ENV_VAR).is_err() {
        return;
    }

    START_TIME.get_or_init(Instant::now);
    let opened = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path());

    match opened {
        Ok(file) => {
            let _ = LOG_FILE.set(std::sync::Mutex::new(file));
            ENABLED.store(true, Ordering::SeqCst);
            log("DEBUG", "init", "Debug logging initialized");
        }
        Err(e) => {
            crate::utils::warn_once(format!(
                "Could not open debug log at {}: {e}",
                log_path().display()
            ));
        }
    }
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with timestamp and thread ID.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);
    let thread_id = std::thread::current().id();

    let msg = format!(
        "[{:>8}ms] [{:?}] [{}] {} - {}\n",
        elapsed, thread_id, category, action, detail
    );

    if let Some(file_mutex) = LOG_FILE.get()
        && let Ok(mut file) = file_mutex.lock()
    {
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}

/// RAII guard that logs how long an operation took when dropped.
pub struct Timed {
    category: &'static str,
    detail: String,
    started: Option<Instant>,
}

impl Timed {
    pub fn new(category: &'static str, detail: impl Into<String>) -> Self {
        let started = is_enabled().then(Instant::now);
        Self {
            category,
            detail: detail.into(),
            started,
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            log(
                self.category,
                "DONE",
                &format!("{} ({}us)", self.detail, started.elapsed().as_micros()),
            );
        }
    }
}
