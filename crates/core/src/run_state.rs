//! Last-run tracking for the scheduler
//!
//! The scheduler only needs two questions answered: when did the last pass
//! happen, and "a pass just finished". [`RunLedger`] is that seam. The
//! default backend, [`LogLedger`], answers from the change log so no extra
//! state file is written next to it.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::changelog::ChangeLog;
use crate::error::Result;

/// Persistence for "when did the last reconciliation pass run"
pub trait RunLedger {
    /// Time of the last pass, or [`NaiveDateTime::MIN`] if there never was
    /// one.
    fn load_last_run(&self) -> Result<NaiveDateTime>;

    /// Note that a pass finished at `at`.
    fn record_run(&mut self, at: NaiveDateTime) -> Result<()>;
}

/// [`RunLedger`] backed by the change log's last timestamp.
///
/// A pass that changes nothing writes no log line, so the completion time is
/// also kept in memory and the later of the two wins. Without that a no-op
/// pass would leave the log's timestamp behind and every check would look
/// overdue.
#[derive(Debug, Clone)]
pub struct LogLedger {
    log: ChangeLog,
    last_completed: Option<NaiveDateTime>,
}

impl LogLedger {
    #[must_use]
    pub fn new(log: ChangeLog) -> Self {
        Self {
            log,
            last_completed: None,
        }
    }
}

impl RunLedger for LogLedger {
    fn load_last_run(&self) -> Result<NaiveDateTime> {
        match self.log.last_timestamp() {
            Ok(logged) => Ok(self.last_completed.map_or(logged, |done| done.max(logged))),
            Err(err) if err.is_log_parse() => match self.last_completed {
                Some(done) => {
                    warn!("Ignoring unreadable change log tail: {err}");
                    Ok(done)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn record_run(&mut self, at: NaiveDateTime) -> Result<()> {
        self.last_completed = Some(self.last_completed.map_or(at, |prev| prev.max(at)));
        Ok(())
    }
}
