use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What was in focus at one sampling tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySample {
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only activity samples, keyed by task name.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    samples: HashMap<String, Vec<ActivitySample>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, task_name: &str, sample: ActivitySample) {
        self.samples
            .entry(task_name.to_string())
            .or_default()
            .push(sample);
    }

    pub fn samples_for(&self, task_name: &str) -> &[ActivitySample] {
        self.samples
            .get(task_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }
}
