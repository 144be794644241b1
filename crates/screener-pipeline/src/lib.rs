//! Two-stage screening pipeline: score every item, deep-analyze the top K,
//! assemble one deterministic report.

pub mod config;
pub mod controller;
pub mod detailed;
pub mod error;
pub mod funnel;
pub mod model;
pub mod oracle;
pub mod report;
pub mod scoring;
pub mod stage;

pub use config::{ConfigError, PipelineConfig};
pub use controller::{Collaborators, PipelineController, PipelineState, RunOutcome, RunStats};
pub use detailed::{DetailedAnalysisStage, DetailedOutput, is_sentinel};
pub use error::PipelineError;
pub use funnel::RankingFunnel;
pub use model::{
    AnalysisSections, DetailedResult, FieldValue, Label, Narrative, Payload, ScoreResult,
    SentimentSource, WorkItem,
};
pub use oracle::{
    AnalysisOracle, DataSource, DataUnavailable, NoSentiment, OracleError, OracleScore,
    ReportSink, ScoringOracle, SentimentOracle,
};
pub use report::{ReportAssembler, ReportEntry, ReportSummary, RunReport};
pub use scoring::{ScoringOutput, ScoringStage};
pub use stage::StageResources;
