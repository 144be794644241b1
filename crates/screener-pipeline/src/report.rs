//! Deterministic merge of both stages into one report

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::funnel::{RankingFunnel, full_order};
use crate::model::{DetailedResult, ScoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// 1-based position in score order
    pub rank: usize,
    pub score: ScoreResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<DetailedResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub detailed: usize,
    pub detailed_degraded: usize,
    /// Results where the oracle's label hint disagreed with the local label
    pub label_overrides: usize,
}

impl ReportSummary {
    fn tally(entries: &[ReportEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            if entry.score.succeeded {
                summary.succeeded += 1;
            } else {
                summary.degraded += 1;
            }
            if entry.score.label_overridden() {
                summary.label_overrides += 1;
            }
            if let Some(detailed) = &entry.detailed {
                summary.detailed += 1;
                if !detailed.succeeded {
                    summary.detailed_degraded += 1;
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Metadata only; excluded from any comparison of report content
    pub generated_at: DateTime<Utc>,
    pub top_k: usize,
    pub summary: ReportSummary,
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn entry(&self, item_id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.score.item_id == item_id)
    }

    /// Entries that carry a detailed analysis, in rank order.
    pub fn detailed_entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.detailed.is_some())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler {
    funnel: RankingFunnel,
}

impl ReportAssembler {
    pub fn new(top_k: usize) -> Self {
        Self {
            funnel: RankingFunnel::new(top_k),
        }
    }

    /// Build the report. Detailed results are attached only to items the
    /// funnel would select from `scores`; strays are ignored.
    pub fn assemble(
        &self,
        scores: &BTreeMap<String, ScoreResult>,
        detailed: &BTreeMap<String, DetailedResult>,
        generated_at: DateTime<Utc>,
    ) -> RunReport {
        let selected: BTreeSet<&str> = self
            .funnel
            .select(scores.values())
            .into_iter()
            .map(|r| r.item_id.as_str())
            .collect();

        let stray = detailed
            .keys()
            .filter(|id| !selected.contains(id.as_str()))
            .count();
        if stray > 0 {
            log::warn!("report: ignoring {stray} detailed results outside the top-K");
        }

        let entries: Vec<ReportEntry> = full_order(scores.values())
            .into_iter()
            .enumerate()
            .map(|(i, score)| ReportEntry {
                rank: i + 1,
                detailed: selected
                    .contains(score.item_id.as_str())
                    .then(|| detailed.get(&score.item_id).cloned())
                    .flatten(),
                score: score.clone(),
            })
            .collect();

        RunReport {
            generated_at,
            top_k: self.funnel.top_k(),
            summary: ReportSummary::tally(&entries),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{Label, Narrative, SentimentSource};

    fn score(id: &str, score: f64, succeeded: bool) -> ScoreResult {
        ScoreResult {
            item_id: id.into(),
            name: None,
            score,
            label: Label::from_score(score),
            oracle_label: None,
            narrative: Narrative::default(),
            metrics: BTreeMap::from([("close".to_string(), score / 10.0)]),
            succeeded,
            retry_count: 0,
            error: None,
        }
    }

    fn detailed(id: &str) -> DetailedResult {
        let mut d = DetailedResult::fallback(id, 0, "n/a");
        d.succeeded = true;
        d.sentiment_source = SentimentSource::Narrative;
        d.error = None;
        d
    }

    fn scores(list: &[(&str, f64, bool)]) -> BTreeMap<String, ScoreResult> {
        list.iter()
            .map(|&(id, s, ok)| (id.to_string(), score(id, s, ok)))
            .collect()
    }

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, min, 0).unwrap()
    }

    #[test]
    fn entries_follow_score_order_with_ranks() {
        let s = scores(&[("a", 10.0, true), ("b", 90.0, true), ("c", 50.0, true)]);
        let d = BTreeMap::from([("b".to_string(), detailed("b"))]);
        let report = ReportAssembler::new(1).assemble(&s, &d, ts(0));

        let order: Vec<_> = report
            .entries
            .iter()
            .map(|e| (e.rank, e.score.item_id.as_str()))
            .collect();
        assert_eq!(order, [(1, "b"), (2, "c"), (3, "a")]);
        assert!(report.entries[0].detailed.is_some());
        assert_eq!(report.detailed_entries().count(), 1);
    }

    #[test]
    fn detailed_outside_selection_is_dropped() {
        let s = scores(&[("a", 80.0, true), ("b", 70.0, true)]);
        let d = BTreeMap::from([
            ("a".to_string(), detailed("a")),
            ("b".to_string(), detailed("b")),
        ]);
        let report = ReportAssembler::new(1).assemble(&s, &d, ts(0));
        assert!(report.entry("a").unwrap().detailed.is_some());
        assert!(report.entry("b").unwrap().detailed.is_none());
        assert_eq!(report.summary.detailed, 1);
    }

    #[test]
    fn summary_counts() {
        let mut s = scores(&[("a", 80.0, true), ("b", 50.0, false), ("c", 65.0, true)]);
        s.get_mut("c").unwrap().oracle_label = Some(Label::Buy);
        let mut da = detailed("a");
        da.succeeded = false;
        let d = BTreeMap::from([("a".to_string(), da), ("c".to_string(), detailed("c"))]);

        let report = ReportAssembler::new(5).assemble(&s, &d, ts(0));
        assert_eq!(
            report.summary,
            ReportSummary {
                total: 3,
                succeeded: 2,
                degraded: 1,
                detailed: 2,
                detailed_degraded: 1,
                label_overrides: 1,
            }
        );
    }

    #[test]
    fn assembly_is_byte_identical_except_timestamp() {
        let s = scores(&[("x", 61.5, true), ("y", 61.5, true), ("z", 12.0, false)]);
        let d = BTreeMap::from([("x".to_string(), detailed("x"))]);
        let assembler = ReportAssembler::new(2);

        let mut first = assembler.assemble(&s, &d, ts(0));
        let mut second = assembler.assemble(&s, &d, ts(7));
        assert_ne!(first.to_json().unwrap(), second.to_json().unwrap());

        first.generated_at = ts(0);
        second.generated_at = ts(0);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn json_roundtrip_preserves_report() {
        let s = scores(&[("a", 75.0, true)]);
        let d = BTreeMap::from([("a".to_string(), detailed("a"))]);
        let report = ReportAssembler::new(1).assemble(&s, &d, ts(3));
        let back: RunReport = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(back, report);
    }
}
