pub mod activity;
pub mod session;

pub use activity::{ActivityLog, ActivitySample};
pub use session::{Session, Subtask, Task};
