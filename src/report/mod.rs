pub mod activity;
pub mod aggregate;
pub mod render;

pub use activity::{summarize_activity, ActivityCount};
pub use aggregate::{build_report, Report, ReportOptions, TaskReport, TaskStatus};
pub use render::render_text;
