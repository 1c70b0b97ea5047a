#![deny(missing_docs)]
//! Shared logging utilities for the radar workspace.
//!
//! This crate provides the `radar_*` logging macros used across the codebase,
//! per-run message tagging and a minimal test initializer for the global logger.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

#[doc(hidden)]
pub use log;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the scan run currently executing on this thread; 0 when idle.
    static CURRENT_RUN: Cell<u64> = const { Cell::new(0) };
}

/// Marks the current thread as executing a new scan run.
///
/// Every `radar_*` message logged while the returned guard is alive is prefixed
/// with `[run N]`. Dropping the guard restores the previous run id.
pub fn begin_run() -> RunGuard {
    let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
    let previous = CURRENT_RUN.with(|v| v.replace(id));
    RunGuard { id, previous }
}

/// Returns the run id active on this thread, if any.
pub fn current_run() -> Option<u64> {
    match CURRENT_RUN.with(|v| v.get()) {
        0 => None,
        id => Some(id),
    }
}

/// Keeps a run id active on the current thread until dropped.
#[derive(Debug)]
pub struct RunGuard {
    id: u64,
    previous: u64,
}

impl RunGuard {
    /// The id allocated for this run.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        CURRENT_RUN.with(|v| v.set(self.previous));
    }
}

#[doc(hidden)]
pub fn run_prefix() -> String {
    match current_run() {
        Some(id) => format!("[run {id}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! radar_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! radar_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! radar_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! radar_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! radar_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::run_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
