//! dirmirror: periodic one-way directory mirror
//!
//! Keeps a destination directory identical to a source directory:
//! - BLAKE3 fingerprints decide which files changed
//! - Every create, update and delete is appended to a plain-text log
//! - The log's last timestamp decides when the next pass is due

mod progress;

use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use color_eyre::Result;

use dirmirror_core::{ChangeLog, LogLedger, MirrorConfig, Reconciler, Scheduler};

use crate::progress::ConsoleReporter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Debug, Parser)]
#[command(name = "dirmirror")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Mirror a directory into another on a fixed interval")]
#[command(long_about = r#"
dirmirror keeps DESTINATION identical to SOURCE.

Every INTERVAL minutes it copies new and changed files from SOURCE, deletes
files that no longer exist in SOURCE, and appends one line per change to
LOG_FILE:

  [16/10/2026 14:03:27] Created: /backup/docs/a.txt

The last line of LOG_FILE is also how a restarted dirmirror knows when the
previous pass ran.

Example:
  dirmirror ./photos /mnt/backup/photos ./mirror.log 30
"#)]
struct Cli {
    /// Directory to mirror from
    source: PathBuf,

    /// Directory to mirror into
    destination: PathBuf,

    /// Append-only change log
    log_file: PathBuf,

    /// Minutes between passes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let config = MirrorConfig::resolve(
        &cwd,
        &cli.source,
        &cli.destination,
        &cli.log_file,
        cli.interval,
    )?;
    config.validate()?;

    let log = ChangeLog::new(&config.log_file);
    log.ensure_exists()?;

    let scheduler = Scheduler::new(
        Reconciler::from_config(&config),
        LogLedger::new(log),
        config.interval,
    );
    scheduler.run(&mut ConsoleReporter::new()).await?;

    Ok(())
}
