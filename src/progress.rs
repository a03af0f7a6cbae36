// src/progress.rs

//! Progress reporting for assembly runs
//!
//! The assembler announces each [`Phase`] with its unit count and then
//! increments as units complete. Module reading runs on worker threads, so
//! trackers must be `Send + Sync` and tolerate concurrent increments.
//!
//! Implementations:
//! - `SilentProgress`: counts but prints nothing (quiet mode, tests)
//! - `LogProgress`: reports through `tracing`
//!
//! The command-line bar lives in the binary (`commands::progress`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use strum_macros::Display;
use tracing::{info, warn};

/// Pipeline phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Read and relocate modules (units: modules)
    Read,
    /// Resolve merges (units: entries)
    Merge,
    /// Write the output archive (units: entries)
    Write,
}

/// Receives progress from an assembly run
pub trait ProgressTracker: Send + Sync {
    /// A phase begins with `total` units of work
    fn start_phase(&self, phase: Phase, total: u64);

    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Mark `amount` units of the current phase done
    fn increment(&self, amount: u64);

    /// The current phase completed
    fn finish_phase(&self, phase: Phase);

    /// The run failed
    fn finish_with_error(&self, message: &str);
}

/// Tracker that records counts and prints nothing
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    failed: AtomicBool,
    phases: Mutex<Vec<Phase>>,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units completed in the current phase
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Units announced for the current phase
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    /// Phases that finished, in order
    pub fn finished_phases(&self) -> Vec<Phase> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

impl ProgressTracker for SilentProgress {
    fn start_phase(&self, _phase: Phase, total: u64) {
        self.position.store(0, Ordering::Relaxed);
        self.length.store(total, Ordering::Relaxed);
    }

    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn finish_phase(&self, phase: Phase) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(phase);
        }
    }

    fn finish_with_error(&self, _message: &str) {
        self.failed.store(true, Ordering::Relaxed);
    }
}

/// Tracker that logs through `tracing`
///
/// Increments are logged roughly ten times per phase.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn start_phase(&self, phase: Phase, total: u64) {
        self.position.store(0, Ordering::Relaxed);
        self.length.store(total, Ordering::Relaxed);
        info!("{}: {} ({} units)", self.name, phase, total);
    }

    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let old_pos = self.position.fetch_add(amount, Ordering::Relaxed);
        let new_pos = old_pos + amount;
        let length = self.length.load(Ordering::Relaxed);
        if length == 0 {
            return;
        }

        let interval = std::cmp::max(1, length / 10);
        if new_pos / interval > old_pos / interval {
            info!("{}: {}% ({}/{})", self.name, (new_pos * 100) / length, new_pos, length);
        }
    }

    fn finish_phase(&self, phase: Phase) {
        info!("{}: {} done", self.name, phase);
    }

    fn finish_with_error(&self, message: &str) {
        warn!("{}: failed: {}", self.name, message);
    }
}
