//! dirmirror-core: one-way directory mirroring
//!
//! Provides content fingerprints, tree walking, the change log, the
//! reconciliation pass and the interval scheduler that drives it.

pub mod changelog;
pub mod config;
pub mod error;
pub mod hash;
pub mod reconcile;
pub mod run_state;
pub mod scan;
pub mod schedule;

pub use changelog::{Action, ChangeLog, LogEntry};
pub use config::MirrorConfig;
pub use error::{MirrorError, Result};
pub use hash::Fingerprint;
pub use reconcile::{MirrorObserver, PassReport, Reconciler};
pub use run_state::{LogLedger, RunLedger};
pub use scan::{EntryKind, TreeEntry, TreeWalker};
pub use schedule::{Clock, Decision, LocalClock, Scheduler};
