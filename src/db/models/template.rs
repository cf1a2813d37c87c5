use serde::{Deserialize, Serialize};

/// A reusable task entry for seeding new session plans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub name: String,
    pub default_minutes: u32,
}
