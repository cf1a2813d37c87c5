pub mod cli;
pub mod db;
pub mod error;
pub mod models;
pub mod planning;
pub mod report;
pub mod sensing;
pub mod settings;
pub mod timer;
pub mod utils;

use anyhow::Context;
use clap::Parser;

pub use error::{ParseError, SwitchError, TrackingError, ValidationError};
pub use planning::{parse_end_time, MismatchWarning, PlanCheck, SessionPlan, TaskDraft};
pub use report::{Report, TaskStatus};
pub use timer::{DisplayUpdate, TimerController};

pub fn run() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(cli::dispatch(cli))
}
