//! Stage one: score every work item.
//!
//! Items are split into batches of `batch_size`. Batches run one after
//! another; inside a batch every item is fanned out through the shared
//! executor, so at most `max_concurrent_requests` oracle calls are in
//! flight at once. Every id handed in comes back with exactly one
//! [`ScoreResult`], degraded if necessary.

use std::collections::BTreeMap;
use std::sync::Arc;

use screener_core::{ProgressTracker, RetryError, with_retry};

use crate::model::{Label, ScoreResult, WorkItem};
use crate::oracle::{DataSource, OracleError, OracleScore, ScoringOracle};
use crate::stage::StageResources;

/// Everything stage one produced.
#[derive(Debug, Default)]
pub struct ScoringOutput {
    pub results: BTreeMap<String, ScoreResult>,
    /// Payloads that loaded, needed again by the detailed stage
    pub items: BTreeMap<String, Arc<WorkItem>>,
    /// Ids never admitted because the run was cancelled
    pub skipped: Vec<String>,
}

impl ScoringOutput {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.succeeded).count()
    }
}

pub struct ScoringStage {
    source: Arc<dyn DataSource>,
    oracle: Arc<dyn ScoringOracle>,
    resources: StageResources,
    batch_size: usize,
}

/// Per-task state, cloned into every spawned operation.
struct ScoringTask {
    source: Arc<dyn DataSource>,
    oracle: Arc<dyn ScoringOracle>,
    resources: StageResources,
    progress: Arc<ProgressTracker>,
}

type ItemOutcome = (ScoreResult, Option<Arc<WorkItem>>);

impl ScoringStage {
    pub fn new(
        source: Arc<dyn DataSource>,
        oracle: Arc<dyn ScoringOracle>,
        resources: StageResources,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            oracle,
            resources,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self, ids: &[String], progress: Arc<ProgressTracker>) -> ScoringOutput {
        let task = Arc::new(ScoringTask {
            source: self.source.clone(),
            oracle: self.oracle.clone(),
            resources: self.resources.clone(),
            progress,
        });

        let batches = ids.len().div_ceil(self.batch_size);
        let mut output = ScoringOutput::default();

        for (n, batch) in ids.chunks(self.batch_size).enumerate() {
            log::debug!("scoring: batch {}/{} ({} items)", n + 1, batches, batch.len());

            let inputs: Vec<(String, ())> = batch.iter().map(|id| (id.clone(), ())).collect();
            let op_task = task.clone();
            let execution = self
                .resources
                .executor
                .run(inputs, move |id, ()| {
                    let task = op_task.clone();
                    async move { task.score_one(id).await }
                })
                .await;

            for (id, (result, item)) in execution.completed {
                if let Some(item) = item {
                    output.items.insert(id.clone(), item);
                }
                output.results.insert(id, result);
            }
            for id in execution.lost {
                log::error!("scoring: task for {id} was lost, using fallback");
                task.progress.tick();
                output.results.insert(
                    id.clone(),
                    ScoreResult::fallback(id, None, BTreeMap::new(), 0, "scoring task aborted"),
                );
            }
            // Skipped ids still get a result so the output stays complete
            for id in execution.skipped {
                output.results.insert(
                    id.clone(),
                    ScoreResult::fallback(id.clone(), None, BTreeMap::new(), 0, "run cancelled"),
                );
                output.skipped.push(id);
            }
        }

        if output.results.len() != ids.len() {
            // Only possible when the input held duplicate ids
            log::warn!(
                "scoring: {} ids in, {} results out",
                ids.len(),
                output.results.len()
            );
        }
        output
    }
}

impl ScoringTask {
    async fn score_one(&self, id: String) -> ItemOutcome {
        let outcome = self.score_item(&id).await;
        self.progress.tick();
        outcome
    }

    async fn score_item(&self, id: &str) -> ItemOutcome {
        let item = match self.source.fetch_payload(id).await {
            Ok(item) => Arc::new(item),
            Err(e) => {
                log::warn!("scoring: {id}: {e}, using fallback");
                let result = ScoreResult::fallback(id, None, BTreeMap::new(), 0, e.to_string());
                return (result, None);
            }
        };

        let label = format!("score {id}");
        let attempt = with_retry(&self.resources.retry, &label, |_| self.attempt(&item)).await;

        let result = match attempt {
            Ok(done) => {
                let result = scored(&item, done.value, done.retries);
                if result.label_overridden() {
                    log::warn!(
                        "scoring: {id}: oracle suggested {} but score {:.1} maps to {}",
                        result.oracle_label.map_or("-", Label::as_str),
                        result.score,
                        result.label
                    );
                }
                result
            }
            Err(e) => fallback_for(&item, &e),
        };
        (result, Some(item))
    }

    async fn attempt(&self, item: &WorkItem) -> Result<OracleScore, OracleError> {
        let answer = self
            .resources
            .guarded_call(self.oracle.score(item))
            .await?;
        validate(answer)
    }
}

/// Reject answers that can never become a valid result.
fn validate(answer: OracleScore) -> Result<OracleScore, OracleError> {
    if !answer.score.is_finite() || !(0.0..=100.0).contains(&answer.score) {
        return Err(OracleError::InvalidInput(format!(
            "score {} outside 0..=100",
            answer.score
        )));
    }
    if let Some(section) = answer.narrative.first_empty() {
        return Err(OracleError::InvalidInput(format!("empty {section} section")));
    }
    Ok(answer)
}

fn scored(item: &WorkItem, answer: OracleScore, retries: u32) -> ScoreResult {
    ScoreResult {
        item_id: item.id.clone(),
        name: item.name.clone(),
        score: answer.score,
        label: Label::from_score(answer.score),
        oracle_label: answer.label_hint,
        narrative: answer.narrative,
        metrics: item.metrics(),
        succeeded: true,
        retry_count: retries,
        error: None,
    }
}

fn fallback_for(item: &WorkItem, err: &RetryError<OracleError>) -> ScoreResult {
    log::warn!("scoring: {}: {err}, using fallback", item.id);
    ScoreResult::fallback(
        item.id.clone(),
        item.name.clone(),
        item.metrics(),
        err.retries(),
        err.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Narrative;

    fn narrative() -> Narrative {
        Narrative {
            technical: "uptrend".into(),
            fundamental: "stable".into(),
            trade_advice: "accumulate".into(),
            risk_warning: "volatility".into(),
        }
    }

    fn answer(score: f64) -> OracleScore {
        OracleScore {
            score,
            label_hint: None,
            narrative: narrative(),
        }
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(validate(answer(100.0)).is_ok());
        assert!(validate(answer(0.0)).is_ok());
        for bad in [-0.1, 100.5, f64::NAN, f64::INFINITY] {
            let err = validate(answer(bad)).unwrap_err();
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn validate_rejects_blank_section() {
        let mut a = answer(70.0);
        a.narrative.risk_warning = String::new();
        let err = validate(a).unwrap_err();
        assert_eq!(
            err,
            OracleError::InvalidInput("empty risk_warning section".into())
        );
    }

    #[test]
    fn scored_label_ignores_hint() {
        let item = WorkItem::new("600519").with_number("close", 1500.0);
        let mut a = answer(80.0);
        a.label_hint = Some(Label::Sell);
        let r = scored(&item, a, 1);
        assert_eq!(r.label, Label::Buy);
        assert_eq!(r.oracle_label, Some(Label::Sell));
        assert!(r.label_overridden());
        assert_eq!(r.retry_count, 1);
        assert_eq!(r.metrics["close"], 1500.0);
    }

    #[test]
    fn fallback_keeps_metrics_and_retries() {
        let item = WorkItem::new("000001").with_number("RSI_6", 33.0);
        let err = RetryError::Exhausted {
            error: OracleError::Timeout(std::time::Duration::from_secs(30)),
            retries: 3,
        };
        let r = fallback_for(&item, &err);
        assert_eq!(r.score, ScoreResult::FALLBACK_SCORE);
        assert_eq!(r.label, Label::Hold);
        assert_eq!(r.retry_count, 3);
        assert_eq!(r.metrics["RSI_6"], 33.0);
        assert!(!r.succeeded);
    }
}
