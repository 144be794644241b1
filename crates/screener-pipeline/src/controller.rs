//! Lifecycle of one pipeline run

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use screener_core::{
    BoundedExecutor, CancellationToken, ProgressContext, SharedProgress, log_section,
};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PipelineConfig;
use crate::detailed::DetailedAnalysisStage;
use crate::error::{PipelineError, Result};
use crate::funnel::RankingFunnel;
use crate::oracle::{AnalysisOracle, DataSource, ReportSink, ScoringOracle, SentimentOracle};
use crate::report::{ReportAssembler, RunReport};
use crate::scoring::ScoringStage;
use crate::stage::StageResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ScoringInFlight,
    Ranking,
    DetailedInFlight,
    Assembling,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_advance_to(self, next: Self) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, ScoringInFlight)
            | (ScoringInFlight, Ranking)
            | (Ranking, DetailedInFlight)
            | (DetailedInFlight, Assembling)
            | (Assembling, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ScoringInFlight => "scoring",
            Self::Ranking => "ranking",
            Self::DetailedInFlight => "analysis",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// External services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn DataSource>,
    pub scoring: Arc<dyn ScoringOracle>,
    pub analysis: Arc<dyn AnalysisOracle>,
    pub sentiment: Arc<dyn SentimentOracle>,
    pub sink: Arc<dyn ReportSink>,
}

/// Counts and timings of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub items: usize,
    pub analyzed: usize,
    pub scoring_elapsed: Duration,
    pub analysis_elapsed: Duration,
    pub total_elapsed: Duration,
}

impl RunStats {
    pub fn avg_scoring(&self) -> Duration {
        average(self.scoring_elapsed, self.items)
    }

    pub fn avg_analysis(&self) -> Duration {
        average(self.analysis_elapsed, self.analyzed)
    }

    pub fn log(&self) {
        log::info!(
            "Scored {} items in {:.1}s ({:.2}s/item)",
            self.items,
            self.scoring_elapsed.as_secs_f64(),
            self.avg_scoring().as_secs_f64()
        );
        log::info!(
            "Analyzed {} items in {:.1}s ({:.2}s/item)",
            self.analyzed,
            self.analysis_elapsed.as_secs_f64(),
            self.avg_analysis().as_secs_f64()
        );
        log::info!("Total: {:.1}s", self.total_elapsed.as_secs_f64());
    }
}

fn average(total: Duration, n: usize) -> Duration {
    match u32::try_from(n) {
        Ok(0) | Err(_) => Duration::ZERO,
        Ok(n) => total / n,
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub report_path: PathBuf,
    pub stats: RunStats,
}

/// Sequences scoring, ranking, detailed analysis and assembly.
///
/// A controller runs once; build a new one to run again.
pub struct PipelineController {
    config: PipelineConfig,
    collaborators: Collaborators,
    progress: SharedProgress,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl PipelineController {
    /// Fails with [`PipelineError::InvalidConfig`] before any work starts.
    pub fn new(
        config: PipelineConfig,
        collaborators: Collaborators,
        progress: SharedProgress,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(PipelineState::Idle);
        Ok(Self {
            config,
            collaborators,
            progress,
            cancel: CancellationToken::new(),
            state,
        })
    }

    /// Headless progress, for embedding and tests.
    pub fn headless(config: PipelineConfig, collaborators: Collaborators) -> Result<Self> {
        Self::new(config, collaborators, Arc::new(ProgressContext::headless()))
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let started = self.state.send_if_modified(|state| {
            if *state == PipelineState::Idle {
                *state = PipelineState::ScoringInFlight;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PipelineError::AlreadyStarted);
        }
        log::debug!("pipeline: {} -> {}", PipelineState::Idle, PipelineState::ScoringInFlight);

        match self.execute().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("pipeline failed: {e}");
                self.advance(PipelineState::Failed);
                Err(e)
            }
        }
    }

    fn advance(&self, next: PipelineState) {
        self.state.send_modify(|state| {
            if state.can_advance_to(next) {
                log::debug!("pipeline: {state} -> {next}");
                *state = next;
            } else {
                log::error!("pipeline: invalid transition {state} -> {next}");
            }
        });
    }

    fn ensure_not_cancelled(&self, stage: &'static str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }
        Ok(())
    }

    async fn execute(&self) -> Result<RunOutcome> {
        let run_start = Instant::now();
        let cfg = &self.config;
        let ids = self.list_ids().await?;
        self.ensure_not_cancelled("scoring")?;

        let resources = StageResources::new(
            cfg,
            BoundedExecutor::new(cfg.max_concurrent_requests, self.cancel.clone()),
        );

        // Stage one
        log_section("scoring");
        log::info!(
            "Scoring {} items (batch {}, concurrency {}, interval {:?})",
            ids.len(),
            cfg.batch_size,
            cfg.max_concurrent_requests,
            cfg.min_request_interval
        );
        let tracker = Arc::new(self.progress.tracker("scoring"));
        tracker.init(ids.len());
        let scoring = ScoringStage::new(
            self.collaborators.source.clone(),
            self.collaborators.scoring.clone(),
            resources.clone(),
            cfg.batch_size,
        );
        let stage_start = Instant::now();
        let scored = scoring.run(&ids, tracker).await;
        let scoring_elapsed = stage_start.elapsed();
        if !scored.skipped.is_empty() {
            log::warn!("{} items were never scored", scored.skipped.len());
        }
        self.ensure_not_cancelled("scoring")?;
        log::info!(
            "Scoring done: {}/{} succeeded",
            scored.succeeded(),
            scored.results.len()
        );

        // Funnel
        self.advance(PipelineState::Ranking);
        let funnel = RankingFunnel::new(cfg.top_k);
        let selected: Vec<_> = funnel
            .select(scored.results.values())
            .into_iter()
            .filter_map(|r| scored.items.get(&r.item_id).cloned())
            .collect();
        log::info!(
            "Selected {} of top {} for detailed analysis",
            selected.len(),
            cfg.top_k
        );

        // Stage two
        self.advance(PipelineState::DetailedInFlight);
        log_section("detailed analysis");
        let analyzed_count = selected.len();
        let tracker = Arc::new(self.progress.tracker("analysis"));
        tracker.init(analyzed_count);
        let detailed = DetailedAnalysisStage::new(
            self.collaborators.analysis.clone(),
            self.collaborators.sentiment.clone(),
            resources,
        );
        let stage_start = Instant::now();
        let analyzed = detailed.run(selected, tracker).await;
        let analysis_elapsed = stage_start.elapsed();
        self.ensure_not_cancelled("analysis")?;

        // Assembly
        self.advance(PipelineState::Assembling);
        let report =
            ReportAssembler::new(cfg.top_k).assemble(&scored.results, &analyzed.results, Utc::now());
        let report_path = self.collaborators.sink.write(&report).await?;
        log::info!("Report written to {}", report_path.display());

        self.advance(PipelineState::Done);
        let stats = RunStats {
            items: scored.results.len(),
            analyzed: analyzed_count,
            scoring_elapsed,
            analysis_elapsed,
            total_elapsed: run_start.elapsed(),
        };
        stats.log();

        Ok(RunOutcome {
            report,
            report_path,
            stats,
        })
    }

    /// List ids from the data source, dropping duplicates but keeping first-seen order.
    async fn list_ids(&self) -> Result<Vec<String>> {
        let listed = self.collaborators.source.list_work_items().await?;
        let mut seen = BTreeSet::new();
        let ids: Vec<String> = listed
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            return Err(PipelineError::NoWorkItems);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use PipelineState::*;
        let path = [Idle, ScoringInFlight, Ranking, DetailedInFlight, Assembling, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn failed_reachable_only_from_non_terminal() {
        use PipelineState::*;
        for s in [Idle, ScoringInFlight, Ranking, DetailedInFlight, Assembling] {
            assert!(s.can_advance_to(Failed));
        }
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
    }

    #[test]
    fn no_skipping_or_going_back() {
        use PipelineState::*;
        assert!(!Idle.can_advance_to(Ranking));
        assert!(!Ranking.can_advance_to(ScoringInFlight));
        assert!(!Done.can_advance_to(Idle));
    }

    #[test]
    fn averages_handle_zero() {
        assert_eq!(average(Duration::from_secs(10), 0), Duration::ZERO);
        assert_eq!(average(Duration::from_secs(10), 4), Duration::from_millis(2500));
    }
}
