//! Centralized console output.
//!
//! The Shell provides a unified API for user-facing output:
//! - Status messages right-aligned in a 12 column gutter
//! - Captured child stderr, echoed with a distinct prefix
//! - Counters of ran/skipped/failed actions for the end-of-run summary
//!
//! Diagnostics for developers go through `tracing`, not the Shell.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// --silent: errors only
    Quiet,
    /// Errors, warnings and the final summary
    Summary,
    /// Default: every status line
    #[default]
    Normal,
    /// --verbose: status lines plus child output that is normally suppressed
    Verbose,
}

/// Status types for output messages.
///
/// Shell handles all formatting - callers just specify the semantic status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Skipped,
    Linking,
    Archiving,
    Rebuilding,
    Relaunching,
    Finished,
    Removed,
    Info,
    Warning,
    Error,
}

impl Status {
    /// Get the display text for this status.
    fn as_str(&self) -> &'static str {
        match self {
            Status::Running => "Running",
            Status::Skipped => "Skipped",
            Status::Linking => "Linking",
            Status::Archiving => "Archiving",
            Status::Rebuilding => "Rebuilding",
            Status::Relaunching => "Relaunching",
            Status::Finished => "Finished",
            Status::Removed => "Removed",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    /// Lowest verbosity at which this status is printed.
    fn threshold(&self) -> Verbosity {
        match self {
            Status::Error => Verbosity::Quiet,
            Status::Warning | Status::Finished => Verbosity::Summary,
            _ => Verbosity::Normal,
        }
    }
}

/// Width of the status gutter.
const STATUS_WIDTH: usize = 12;

/// Prefix for lines of captured child stderr.
const STDERR_PREFIX: &str = "stderr |";

/// Snapshot of the action counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Central shell for all CLI output.
#[derive(Debug, Default)]
pub struct Shell {
    verbosity: Verbosity,
    ran: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Shell {
    /// Create a new shell with the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Shell {
            verbosity,
            ..Default::default()
        }
    }

    /// Create a shell from CLI flags with proper precedence.
    ///
    /// `silent` wins over `verbose`, which wins over the configured summary mode.
    pub fn from_flags(silent: bool, verbose: bool, summary: bool) -> Self {
        let verbosity = if silent {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else if summary {
            Verbosity::Summary
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print a status message.
    ///
    /// Format: `{status:>12} {message}`
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.verbosity < status.threshold() {
            return;
        }
        eprintln!("{} {}", format_status(status), msg);
    }

    /// Print an info message.
    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    /// Echo captured child stderr, one prefixed line at a time.
    ///
    /// The lines of one child are written under a single lock so output of
    /// concurrent actions does not interleave.
    pub fn stderr_lines(&self, text: &str) {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        for line in text.lines() {
            let _ = writeln!(out, "{:>width$} {}", STDERR_PREFIX, line, width = STATUS_WIDTH);
        }
    }

    pub fn record_ran(&self) {
        self.ran.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Current values of the action counters.
    pub fn counts(&self) -> Counts {
        Counts {
            ran: self.ran.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Print the end-of-run summary line.
    pub fn print_summary(&self, elapsed: Duration) {
        let counts = self.counts();
        if counts == Counts::default() {
            return;
        }
        self.status(
            Status::Finished,
            format!(
                "{} ran, {} skipped, {} failed in {}",
                counts.ran,
                counts.skipped,
                counts.failed,
                format_duration(elapsed)
            ),
        );
    }
}

/// Format a status prefix.
fn format_status(status: Status) -> String {
    format!("{:>width$}", status.as_str(), width = STATUS_WIDTH)
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}
