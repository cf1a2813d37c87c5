//! SQLite persistence for sessions, per-task results, reports and templates.

mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    FinalizedSession, FinalizedTask, NewSession, ReportSummary, SessionRecord, StoredReport,
    StoredTask, TaskTemplate,
};
