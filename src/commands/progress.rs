// src/commands/progress.rs
//! Terminal progress bar for assembly runs
//!
//! One bar is reused across phases; the prefix names the current phase.

use indicatif::{ProgressBar, ProgressStyle};
use jarforge::progress::{Phase, ProgressTracker};

pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{prefix:>6} ({pos}/{len}) [{bar:40.green/dim}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn start_phase(&self, phase: Phase, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_prefix(phase.to_string());
        self.bar.set_message("");
    }

    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish_phase(&self, phase: Phase) {
        if phase == Phase::Write {
            self.bar.finish_and_clear();
        }
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("failed: {}", message));
    }
}
