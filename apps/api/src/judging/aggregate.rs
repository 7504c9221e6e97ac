use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::models::judging::{CriterionScores, JudgingScoreEntry};

pub const MAX_SCORE: u8 = 10;

/// Criterion weights. They sum to 1.0, so totals stay on the 0–10 scale.
pub const WEIGHTS: [(&str, f64); 5] = [
    ("innovation", 0.25),
    ("technical", 0.25),
    ("design", 0.20),
    ("impact", 0.20),
    ("presentation", 0.10),
];

pub fn weighted_total(scores: &CriterionScores) -> f64 {
    scores
        .iter()
        .zip(WEIGHTS.iter())
        .map(|((_, score), (_, weight))| f64::from(score) * weight)
        .sum()
}

/// Grouping key for a project title: trimmed, lowercased, inner whitespace collapsed.
pub fn project_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    /// Title as first submitted.
    pub title: String,
    pub entry_count: usize,
    pub average_total: f64,
    pub best_total: f64,
    pub judges: BTreeSet<Uuid>,
}

pub fn summarize(entries: &[JudgingScoreEntry]) -> Vec<ProjectSummary> {
    let mut sorted: Vec<&JudgingScoreEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.created_at);

    let mut groups: HashMap<String, ProjectSummary> = HashMap::new();
    for entry in sorted {
        let summary = groups
            .entry(project_key(&entry.project_title))
            .or_insert_with(|| ProjectSummary {
                title: entry.project_title.trim().to_string(),
                entry_count: 0,
                average_total: 0.0,
                best_total: f64::MIN,
                judges: BTreeSet::new(),
            });
        summary.entry_count += 1;
        // running sum; divided below
        summary.average_total += entry.total;
        summary.best_total = summary.best_total.max(entry.total);
        summary.judges.insert(entry.judge_id);
    }

    let mut out: Vec<ProjectSummary> = groups
        .into_values()
        .map(|mut s| {
            s.average_total /= s.entry_count as f64;
            s
        })
        .collect();
    out.sort_by(|a, b| {
        b.average_total
            .total_cmp(&a.average_total)
            .then_with(|| a.title.cmp(&b.title))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(title: &str, total: f64, judge: Uuid, offset: i64) -> JudgingScoreEntry {
        JudgingScoreEntry {
            id: Uuid::new_v4(),
            project_title: title.to_string(),
            scores: CriterionScores {
                innovation: 0,
                technical: 0,
                design: 0,
                impact: 0,
                presentation: 0,
            },
            total,
            comments: None,
            judge_id: judge,
            created_at: Utc::now() + Duration::seconds(offset),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_total() {
        let s = CriterionScores {
            innovation: 10,
            technical: 8,
            design: 6,
            impact: 4,
            presentation: 2,
        };
        // 2.5 + 2.0 + 1.2 + 0.8 + 0.2
        assert!((weighted_total(&s) - 6.7).abs() < 1e-9);
    }

    #[test]
    fn test_project_key() {
        assert_eq!(project_key("  Solar   Bot\t"), "solar bot");
    }

    #[test]
    fn test_summarize_groups_and_orders() {
        let j1 = Uuid::new_v4();
        let j2 = Uuid::new_v4();
        let entries = vec![
            entry("Solar Bot", 6.0, j1, 0),
            entry("solar bot ", 8.0, j2, 1),
            entry("Aqua", 7.0, j1, 2),
            entry("Zeta", 7.0, j2, 3),
        ];
        let out = summarize(&entries);
        let titles: Vec<&str> = out.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Aqua", "Solar Bot", "Zeta"]);

        let solar = &out[1];
        assert_eq!(solar.entry_count, 2);
        assert!((solar.average_total - 7.0).abs() < 1e-9);
        assert!((solar.best_total - 8.0).abs() < 1e-9);
        assert_eq!(solar.judges.len(), 2);
    }

    #[test]
    fn test_title_variants_share_one_summary() {
        let judge = Uuid::new_v4();
        let entries = vec![
            entry("Foo", 6.0, judge, 0),
            entry("foo", 7.0, judge, 1),
            entry(" Foo ", 8.0, judge, 2),
        ];
        let out = summarize(&entries);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Foo");
        assert_eq!(out[0].entry_count, 3);
        assert!((out[0].average_total - 7.0).abs() < 1e-9);
        assert!((out[0].best_total - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_empty());
    }
}
