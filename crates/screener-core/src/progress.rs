//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per stage (cleared when the stage completes).
//! Non-TTY mode: periodic log lines (no progress bars).

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Log a progress line every N ticks in non-TTY mode
const LOG_INTERVAL: usize = 50;

fn counter_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<10.cyan.bold} [{elapsed_precise}] {bar:30.green/dim} {pos:>6}/{len:6} ({eta})",
    )
    .expect("invalid template")
    .progress_chars("--")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Context that never draws bars (tests, embedding).
    pub fn headless() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Create a completion counter for one pipeline stage.
    ///
    /// TTY: visible bar managed by the shared `MultiProgress`.
    /// Non-TTY: hidden bar, progress goes to the log instead.
    pub fn tracker(&self, stage: &str) -> ProgressTracker {
        let bar = if self.is_tty {
            let pb = self.multi.add(ProgressBar::new(0));
            pb.set_style(counter_style());
            pb.set_prefix(stage.to_string());
            pb
        } else {
            ProgressBar::hidden()
        };
        ProgressTracker::with_bar(stage, bar, !self.is_tty)
    }

    /// Print a line above managed progress bars (avoids interference).
    ///
    /// Use this instead of `eprintln!` when progress bars are active.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Completed-vs-total counter for one stage.
///
/// Purely observational: nothing in the pipeline reads it to make
/// decisions. `tick` is safe to call from any number of tasks.
pub struct ProgressTracker {
    stage: String,
    total: AtomicUsize,
    completed: AtomicUsize,
    bar: ProgressBar,
    log_ticks: bool,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("stage", &self.stage)
            .field("completed", &self.completed())
            .field("total", &self.total())
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    fn with_bar(stage: &str, bar: ProgressBar, log_ticks: bool) -> Self {
        Self {
            stage: stage.to_string(),
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            bar,
            log_ticks,
        }
    }

    /// Tracker with no display and no log output.
    pub fn hidden(stage: &str) -> Self {
        Self::with_bar(stage, ProgressBar::hidden(), false)
    }

    /// Reset the counter and set the expected number of ticks.
    pub fn init(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.bar.reset();
        self.bar.set_length(total as u64);
        if self.log_ticks {
            log::info!("{}: 0/{} started", self.stage, fmt_num(total));
        }
        // Nothing will ever tick an empty stage
        if total == 0 {
            self.bar.finish_and_clear();
        }
    }

    /// Record one finished unit of work; returns the new completed count.
    pub fn tick(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let total = self.total.load(Ordering::Acquire);
        self.bar.inc(1);

        if self.log_ticks && (done % LOG_INTERVAL == 0 || done == total) {
            log::info!("{}: {}/{}", self.stage, fmt_num(done), fmt_num(total));
        }
        if done == total {
            self.bar.finish_and_clear();
        }
        done
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// True once `completed >= total` (an empty stage is complete).
    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total()
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
