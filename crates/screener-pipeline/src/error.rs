//! Run-level failures. Item-level failures never surface here.

use std::fmt;

use crate::config::ConfigError;
use crate::oracle::DataUnavailable;

#[derive(Debug)]
pub enum PipelineError {
    InvalidConfig(ConfigError),
    /// The data source could not list work items
    DataSource(DataUnavailable),
    NoWorkItems,
    /// Cancellation was requested; `stage` is where the run stopped
    Cancelled { stage: &'static str },
    Sink(std::io::Error),
    /// A controller runs at most once
    AlreadyStarted,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(e) => write!(f, "{e}"),
            Self::DataSource(e) => write!(f, "cannot list work items: {e}"),
            Self::NoWorkItems => write!(f, "data source returned no work items"),
            Self::Cancelled { stage } => write!(f, "run cancelled during {stage}"),
            Self::Sink(e) => write!(f, "failed to write report: {e}"),
            Self::AlreadyStarted => write!(f, "pipeline already started"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(e) => Some(e),
            Self::DataSource(e) => Some(e),
            Self::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e)
    }
}

impl From<DataUnavailable> for PipelineError {
    fn from(e: DataUnavailable) -> Self {
        Self::DataSource(e)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Sink(e)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
