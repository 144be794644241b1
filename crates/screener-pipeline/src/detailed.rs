//! Stage two: deep analysis of the funnel's selection

use std::collections::BTreeMap;
use std::sync::Arc;

use screener_core::{ProgressTracker, with_retry};

use crate::model::{AnalysisSections, DetailedResult, SentimentSource, WorkItem};
use crate::oracle::{AnalysisOracle, OracleError, SentimentOracle};
use crate::stage::StageResources;

/// Placeholder answers a sentiment service returns instead of failing.
pub const SENTIMENT_UNAVAILABLE: &[&str] = &[
    "无法获取新闻数据",
    "无法获取新闻舆情数据",
    "无法获取新闻舆情分析",
    "处理新闻内容时出错",
    "LLM返回结果为空",
    "sentiment unavailable",
];

/// True for an empty answer or one of the known "no data" placeholders.
pub fn is_sentinel(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || SENTIMENT_UNAVAILABLE.contains(&text)
}

#[derive(Debug, Default)]
pub struct DetailedOutput {
    pub results: BTreeMap<String, DetailedResult>,
    pub skipped: Vec<String>,
}

pub struct DetailedAnalysisStage {
    analysis: Arc<dyn AnalysisOracle>,
    sentiment: Arc<dyn SentimentOracle>,
    resources: StageResources,
}

struct AnalysisTask {
    analysis: Arc<dyn AnalysisOracle>,
    sentiment: Arc<dyn SentimentOracle>,
    resources: StageResources,
    progress: Arc<ProgressTracker>,
}

impl DetailedAnalysisStage {
    pub fn new(
        analysis: Arc<dyn AnalysisOracle>,
        sentiment: Arc<dyn SentimentOracle>,
        resources: StageResources,
    ) -> Self {
        Self {
            analysis,
            sentiment,
            resources,
        }
    }

    /// Analyze `items` concurrently; one [`DetailedResult`] per admitted item.
    pub async fn run(
        &self,
        items: Vec<Arc<WorkItem>>,
        progress: Arc<ProgressTracker>,
    ) -> DetailedOutput {
        let task = Arc::new(AnalysisTask {
            analysis: self.analysis.clone(),
            sentiment: self.sentiment.clone(),
            resources: self.resources.clone(),
            progress,
        });

        let inputs: Vec<(String, Arc<WorkItem>)> = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        let op_task = task.clone();
        let execution = self
            .resources
            .executor
            .run(inputs, move |_, item| {
                let task = op_task.clone();
                async move { task.analyze_one(&item).await }
            })
            .await;

        let mut results = execution.completed;
        for id in execution.lost {
            log::error!("analysis: task for {id} was lost, using fallback");
            task.progress.tick();
            results.insert(
                id.clone(),
                DetailedResult::fallback(id, 0, "analysis task aborted"),
            );
        }
        DetailedOutput {
            results,
            skipped: execution.skipped,
        }
    }
}

impl AnalysisTask {
    async fn analyze_one(&self, item: &WorkItem) -> DetailedResult {
        let result = self.analyze_item(item).await;
        self.progress.tick();
        result
    }

    async fn analyze_item(&self, item: &WorkItem) -> DetailedResult {
        let id = &item.id;
        let label = format!("analyze {id}");
        let done = match with_retry(&self.resources.retry, &label, |_| self.attempt(item)).await {
            Ok(done) => done,
            Err(e) => {
                log::warn!("analysis: {id}: {e}, using fallback");
                return DetailedResult::fallback(id.clone(), e.retries(), e.to_string());
            }
        };

        let mut sections = done.value;
        let sentiment_source = match self.fetch_sentiment(id).await {
            Some(text) => {
                sections.sentiment = text;
                SentimentSource::Oracle
            }
            None => SentimentSource::Narrative,
        };

        DetailedResult {
            item_id: id.clone(),
            sections,
            sentiment_source,
            succeeded: true,
            retry_count: done.retries,
            error: None,
        }
    }

    async fn attempt(&self, item: &WorkItem) -> Result<AnalysisSections, OracleError> {
        let sections = self
            .resources
            .guarded_call(self.analysis.analyze(item))
            .await?;
        match sections.first_empty() {
            Some(section) => Err(OracleError::InvalidInput(format!("empty {section} section"))),
            None => Ok(sections),
        }
    }

    /// Single rate-limited attempt; any failure falls back to the analysis text.
    async fn fetch_sentiment(&self, id: &str) -> Option<String> {
        match self
            .resources
            .guarded_call(self.sentiment.sentiment(id))
            .await
        {
            Ok(text) if !is_sentinel(&text) => Some(text.trim().to_string()),
            Ok(_) => {
                log::warn!("analysis: {id}: no sentiment data, using analysis section");
                None
            }
            Err(e) => {
                log::warn!("analysis: {id}: sentiment failed ({e}), using analysis section");
                None
            }
        }
    }
}
