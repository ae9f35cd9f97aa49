//! Per-session diagnostic logging.
//!
//! The crate logs through the [`log`] facade. Routine milestones (duration
//! detected, threshold calibrated, run finished) are always emitted at
//! `info`/`debug`; the much noisier per-sample trace (every seek, retry and
//! score) is only emitted for sessions that opt in through
//! [`ExtractOptions::with_debug_logging`](crate::ExtractOptions::with_debug_logging).
//! Each session carries its own id so interleaved runs stay readable.

use std::fmt::Arguments;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Logging handle for one extraction session.
#[derive(Debug, Clone)]
pub struct SessionLog {
    id: u64,
    verbose: bool,
}

impl SessionLog {
    /// A new session with a fresh id.
    pub fn new(verbose: bool) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            verbose,
        }
    }

    /// A session that never emits per-sample traces.
    pub fn quiet() -> Self {
        Self::new(false)
    }

    /// Session id included in every line.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether per-sample tracing is on.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Per-sample trace line, dropped unless the session is verbose.
    pub fn trace(&self, args: Arguments<'_>) {
        if self.verbose {
            log::debug!("[session {}] {}", self.id, args);
        }
    }

    /// Milestone line.
    pub fn info(&self, args: Arguments<'_>) {
        log::info!("[session {}] {}", self.id, args);
    }

    /// Something went wrong but the session continues.
    pub fn warn(&self, args: Arguments<'_>) {
        log::warn!("[session {}] {}", self.id, args);
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::quiet()
    }
}
