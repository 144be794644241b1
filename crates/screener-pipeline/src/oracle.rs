//! Collaborator interfaces the pipeline drives.
//!
//! Data access, the remote oracles and the report sink are all supplied
//! by the caller as trait objects, so stages never know whether they talk
//! to an HTTP service, a snapshot file or a scripted test fake.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use screener_core::Retryable;

use crate::model::{AnalysisSections, Label, Narrative, WorkItem};
use crate::report::RunReport;

/// Item data could not be produced. Permanent for that item, fatal when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUnavailable {
    pub item_id: Option<String>,
    pub message: String,
}

impl DataUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            item_id: None,
            message: message.into(),
        }
    }

    pub fn for_item(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_id {
            Some(id) => write!(f, "data unavailable for {id}: {}", self.message),
            None => write!(f, "data unavailable: {}", self.message),
        }
    }
}

impl std::error::Error for DataUnavailable {}

/// Failure talking to a remote oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Response did not match the expected shape
    Malformed(String),
    /// HTTP or connection failure; `status` is absent for connection errors
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// No answer within the per-call timeout
    Timeout(Duration),
    /// The answer parsed but violates a domain rule (score out of range, empty section)
    InvalidInput(String),
}

impl OracleError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Transport errors and timeouts are transient, except client errors
    /// that a second attempt cannot fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => !matches!(status, Some(400 | 401 | 403 | 404)),
            Self::Timeout(_) => true,
            Self::Malformed(_) | Self::InvalidInput(_) => false,
        }
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Transport {
                status: Some(code),
                message,
            } => write!(f, "HTTP {code}: {message}"),
            Self::Transport {
                status: None,
                message,
            } => write!(f, "transport error: {message}"),
            Self::Timeout(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
            Self::InvalidInput(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

impl Retryable for OracleError {
    fn is_retryable(&self) -> bool {
        OracleError::is_retryable(self)
    }
}

/// Raw scoring answer. `label_hint` is advisory only.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleScore {
    pub score: f64,
    pub label_hint: Option<Label>,
    pub narrative: Narrative,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Identifiers of every item in the run.
    async fn list_work_items(&self) -> Result<Vec<String>, DataUnavailable>;

    async fn fetch_payload(&self, id: &str) -> Result<WorkItem, DataUnavailable>;
}

#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn score(&self, item: &WorkItem) -> Result<OracleScore, OracleError>;
}

#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn analyze(&self, item: &WorkItem) -> Result<AnalysisSections, OracleError>;
}

/// Market-sentiment summary for one item. Failures are always absorbed by the caller.
#[async_trait]
pub trait SentimentOracle: Send + Sync {
    async fn sentiment(&self, item_id: &str) -> Result<String, OracleError>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Persist the report and return where it went.
    async fn write(&self, report: &RunReport) -> std::io::Result<PathBuf>;
}

/// Sentiment oracle that never answers, so the analysis's own section is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSentiment;

#[async_trait]
impl SentimentOracle for NoSentiment {
    async fn sentiment(&self, item_id: &str) -> Result<String, OracleError> {
        Err(OracleError::Malformed(format!(
            "no sentiment source configured for {item_id}"
        )))
    }
}
