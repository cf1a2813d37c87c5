pub mod report;
pub mod session;
pub mod template;

pub use report::{FinalizedSession, FinalizedTask, ReportSummary, StoredReport, StoredTask};
pub use session::{NewSession, SessionRecord};
pub use template::TaskTemplate;
