//! Chat-model backed scoring, analysis and sentiment oracles

use async_trait::async_trait;
use screener_pipeline::{
    AnalysisOracle, AnalysisSections, OracleError, OracleScore, ScoringOracle, SentimentOracle,
    WorkItem,
};

use crate::client::ChatClient;
use crate::parse::{parse_analysis, parse_rating};
use crate::prompts::{ANALYST_SYSTEM, analysis_prompt, rating_prompt, sentiment_prompt};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// Endpoint and model choice for [`LlmOracle`].
#[derive(Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: String,
    /// Cheap model used for scoring every item
    pub rating_model: String,
    /// Stronger model for the top-K deep analysis and sentiment
    pub analysis_model: String,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("rating_model", &self.rating_model)
            .field("analysis_model", &self.analysis_model)
            .finish()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: String::new(),
            rating_model: DEFAULT_MODEL.into(),
            analysis_model: DEFAULT_MODEL.into(),
        }
    }
}

/// One client serving all three oracle roles.
#[derive(Debug, Clone)]
pub struct LlmOracle {
    client: ChatClient,
    rating_model: String,
    analysis_model: String,
}

impl LlmOracle {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            client: ChatClient::new(&config.base_url, config.api_key.clone()),
            rating_model: config.rating_model.clone(),
            analysis_model: config.analysis_model.clone(),
        }
    }
}

#[async_trait]
impl ScoringOracle for LlmOracle {
    async fn score(&self, item: &WorkItem) -> Result<OracleScore, OracleError> {
        let content = self
            .client
            .complete(&self.rating_model, None, &rating_prompt(item))
            .await?;
        parse_rating(&content)
    }
}

#[async_trait]
impl AnalysisOracle for LlmOracle {
    async fn analyze(&self, item: &WorkItem) -> Result<AnalysisSections, OracleError> {
        let content = self
            .client
            .complete(
                &self.analysis_model,
                Some(ANALYST_SYSTEM),
                &analysis_prompt(item),
            )
            .await?;
        parse_analysis(&content)
    }
}

#[async_trait]
impl SentimentOracle for LlmOracle {
    async fn sentiment(&self, item_id: &str) -> Result<String, OracleError> {
        self.client
            .complete(&self.analysis_model, None, &sentiment_prompt(item_id))
            .await
    }
}
