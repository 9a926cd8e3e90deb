//! Interval scheduling of reconciliation passes
//!
//! Each check compares the time since the last pass with the interval. An
//! overdue check runs a pass right away and then sleeps a full interval; an
//! early check sleeps exactly the remainder and looks again.

use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::changelog::now_local;
use crate::error::Result;
use crate::reconcile::{MirrorObserver, Reconciler};
use crate::run_state::RunLedger;

/// Source of "now" for due checks
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock local time, matching the change log's timestamps
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        now_local()
    }
}

/// Outcome of a due check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// At least one interval has passed; run now.
    Due,
    /// Sleep this long, then check again.
    Wait(Duration),
}

/// Decide whether a pass is due.
///
/// A last run in the future (clock moved backwards) counts as "just ran".
#[must_use]
pub fn decide(last_run: NaiveDateTime, now: NaiveDateTime, interval: Duration) -> Decision {
    let elapsed = now
        .signed_duration_since(last_run)
        .to_std()
        .unwrap_or(Duration::ZERO);

    if elapsed >= interval {
        Decision::Due
    } else {
        Decision::Wait(interval - elapsed)
    }
}

/// Drives a [`Reconciler`] on a fixed interval.
pub struct Scheduler<L, C = LocalClock> {
    reconciler: Reconciler,
    ledger: L,
    clock: C,
    interval: Duration,
}

impl<L: RunLedger> Scheduler<L> {
    #[must_use]
    pub fn new(reconciler: Reconciler, ledger: L, interval: Duration) -> Self {
        Self::with_clock(reconciler, ledger, LocalClock, interval)
    }
}

impl<L: RunLedger, C: Clock> Scheduler<L, C> {
    #[must_use]
    pub fn with_clock(reconciler: Reconciler, ledger: L, clock: C, interval: Duration) -> Self {
        Self {
            reconciler,
            ledger,
            clock,
            interval,
        }
    }

    /// Check whether a pass is due, without running one.
    ///
    /// An unparseable change log tail makes the pass due.
    pub fn check(&self) -> Result<Decision> {
        let last_run = match self.ledger.load_last_run() {
            Ok(at) => at,
            Err(err) if err.is_log_parse() => {
                warn!("Cannot tell when the last pass ran, running now: {err}");
                NaiveDateTime::MIN
            }
            Err(err) => return Err(err),
        };

        Ok(decide(last_run, self.clock.now(), self.interval))
    }

    /// One scheduler step: run a pass if due. Returns how long to sleep
    /// before the next step.
    ///
    /// # Errors
    /// Only when the ledger cannot be read or written. A failed pass is
    /// logged and still counts as a run, so it is retried one interval later.
    pub fn tick(&mut self, observer: &mut dyn MirrorObserver) -> Result<Duration> {
        match self.check()? {
            Decision::Due => {
                if let Err(err) = self.reconciler.run(observer) {
                    error!("Reconciliation pass aborted: {err}");
                }
                self.ledger.record_run(self.clock.now())?;
                Ok(self.interval)
            }
            Decision::Wait(remaining) => {
                observer.on_wait(remaining);
                Ok(remaining)
            }
        }
    }

    /// Loop forever, sleeping between steps, until Ctrl-C.
    ///
    /// A running pass is never interrupted: a Ctrl-C that arrives during a
    /// pass stops the loop as soon as the pass ends.
    pub async fn run(self, observer: &mut dyn MirrorObserver) -> Result<()> {
        let interrupt = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(observer, interrupt).await
    }

    /// Like [`Scheduler::run`], stopping once `shutdown` completes.
    pub async fn run_until(
        mut self,
        observer: &mut dyn MirrorObserver,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!(
            "Mirroring every {}s, log at {}",
            self.interval.as_secs(),
            self.reconciler.log().path().display()
        );

        let mut shutdown = std::pin::pin!(shutdown);
        // Poll once so a signal listener is registered before the first pass
        tokio::select! {
            biased;
            () = &mut shutdown => return Ok(()),
            () = std::future::ready(()) => {}
        }

        loop {
            let wait = self.tick(observer)?;

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Interrupted, stopping");
                    return Ok(());
                }
                () = tokio::time::sleep(wait) => {}
            }
        }
    }
}
