use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::ActivitySample;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCount {
    pub label: String,
    pub count: usize,
}

/// Tally sampled labels, most frequent first.
///
/// Labels are cut to `max_chars` characters before grouping. Equal counts keep
/// the order in which the label was first seen.
pub fn summarize_activity(
    samples: &[ActivitySample],
    max_chars: usize,
    top_n: usize,
) -> Vec<ActivityCount> {
    let mut counts: Vec<ActivityCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for sample in samples {
        let label = truncate_chars(&sample.label, max_chars);
        match positions.get(&label) {
            Some(&position) => counts[position].count += 1,
            None => {
                positions.insert(label.clone(), counts.len());
                counts.push(ActivityCount { label, count: 1 });
            }
        }
    }

    // stable sort keeps first-seen order among ties
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top_n);
    counts
}

fn truncate_chars(label: &str, max_chars: usize) -> String {
    match label.char_indices().nth(max_chars) {
        Some((byte_index, _)) => label[..byte_index].to_string(),
        None => label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn samples(labels: &[&str]) -> Vec<ActivitySample> {
        let now = Utc::now();
        labels
            .iter()
            .map(|label| ActivitySample {
                label: label.to_string(),
                timestamp: now,
            })
            .collect()
    }

    #[test]
    fn test_counts_and_orders_by_frequency() {
        let summary = summarize_activity(
            &samples(&["editor", "browser", "editor", "terminal", "editor", "browser"]),
            60,
            5,
        );
        assert_eq!(
            summary,
            vec![
                ActivityCount { label: "editor".into(), count: 3 },
                ActivityCount { label: "browser".into(), count: 2 },
                ActivityCount { label: "terminal".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_ties_keep_first_seen_order_and_cap_at_top_n() {
        let summary = summarize_activity(&samples(&["f", "e", "d", "c", "b", "a", "a"]), 60, 5);
        let labels: Vec<_> = summary.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["a", "f", "e", "d", "c"]);
    }

    #[test]
    fn test_long_labels_are_truncated_before_grouping() {
        let base = "x".repeat(60);
        let first = format!("{base} - tab one");
        let second = format!("{base} - tab two");
        let summary = summarize_activity(&samples(&[&first, &second]), 60, 5);

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].label, base);
        assert_eq!(summary[0].count, 2);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 60), "short");
    }

    #[test]
    fn test_empty_samples() {
        assert!(summarize_activity(&[], 60, 5).is_empty());
    }
}
