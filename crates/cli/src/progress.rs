//! Operator console output
//!
//! Change lines and the completion marker go to stdout exactly as the
//! change log spells them. Cargo-style status lines go to stderr:
//!
//! ```text
//!      Synced 3 changes (1 created, 1 updated, 1 deleted)
//!     Skipped 1 entries that vanished mid-pass
//! ```

use std::io::Write as _;
use std::time::Duration;

use chrono::NaiveDateTime;
use dirmirror_core::changelog::format_timestamp;
use dirmirror_core::{LogEntry, MirrorObserver, PassReport};

/// Status verbs for cargo-style output (right-aligned to 12 chars)
struct Status;

impl Status {
    const SYNCED: &str = "Synced";
    const UP_TO_DATE: &str = "Fresh";
    const SKIPPED: &str = "Skipped";
}

/// Print a cargo-style status line
fn print_status(status: &str, message: &str) {
    let mut term = console::Term::stderr();
    let style = console::Style::new().green().bold();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

fn print_warning(status: &str, message: &str) {
    let mut term = console::Term::stderr();
    let style = console::Style::new().yellow().bold();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

/// Reports passes and waits on the terminal
pub struct ConsoleReporter {
    out: console::Term,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            out: console::Term::stdout(),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorObserver for ConsoleReporter {
    fn on_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.out, "{entry}");
    }

    fn on_pass_complete(&mut self, report: &PassReport, at: NaiveDateTime) {
        let _ = writeln!(self.out, "[{}] Checkup Completed:", format_timestamp(at));

        if report.is_empty() {
            print_status(Status::UP_TO_DATE, "destination already matches source");
        } else {
            print_status(
                Status::SYNCED,
                &format!(
                    "{} changes ({} created, {} updated, {} deleted)",
                    report.changes(),
                    report.created,
                    report.updated,
                    report.deleted
                ),
            );
        }

        if report.skipped > 0 {
            print_warning(
                Status::SKIPPED,
                &format!("{} entries that vanished mid-pass", report.skipped),
            );
        }
    }

    fn on_wait(&mut self, remaining: Duration) {
        let _ = writeln!(
            self.out,
            "Next backup scheduled in {} seconds.",
            remaining.as_secs()
        );
    }
}
