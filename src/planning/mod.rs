pub mod plan;
pub mod time_parser;

pub use plan::{validate, MismatchWarning, PlanCheck, SessionPlan, TaskDraft};
pub use time_parser::parse_end_time;
