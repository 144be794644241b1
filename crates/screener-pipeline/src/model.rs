//! Work items and per-stage results

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Recommendation derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Buy,
    Hold,
    Sell,
}

impl Label {
    pub const BUY_THRESHOLD: f64 = 75.0;
    pub const HOLD_THRESHOLD: f64 = 60.0;

    /// `>= 75` Buy, `>= 60` Hold, otherwise Sell.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::BUY_THRESHOLD {
            Self::Buy
        } else if score >= Self::HOLD_THRESHOLD {
            Self::Hold
        } else {
            Self::Sell
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    /// Accepts English labels in any case and the Chinese terms oracles often answer with.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "买入" => Ok(Self::Buy),
            "hold" | "持有" => Ok(Self::Hold),
            "sell" | "卖出" => Ok(Self::Sell),
            other => Err(format!("unknown label: {other}")),
        }
    }
}

/// One payload field: numeric indicator or categorical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:.2}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

pub type Payload = BTreeMap<String, FieldValue>;

/// One instrument to score, with the fields supplied by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Payload,
}

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            fields: Payload::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_number(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), FieldValue::Number(value));
        self
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), FieldValue::Text(value.into()));
        self
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(FieldValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Finite numeric fields, the snapshot carried into the report.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        self.fields
            .iter()
            .filter_map(|(k, v)| match v {
                FieldValue::Number(n) if n.is_finite() => Some((k.clone(), *n)),
                _ => None,
            })
            .collect()
    }
}

/// Narrative sections returned with a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub technical: String,
    pub fundamental: String,
    pub trade_advice: String,
    pub risk_warning: String,
}

impl Narrative {
    /// Placeholder text for a degraded result.
    pub fn fallback(reason: &str) -> Self {
        Self {
            technical: format!("technical analysis unavailable: {reason}"),
            fundamental: "fundamental analysis unavailable".into(),
            trade_advice: "trade advice unavailable".into(),
            risk_warning: "risk warning unavailable".into(),
        }
    }

    /// Name of the first blank section, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("technical", &self.technical),
            ("fundamental", &self.fundamental),
            ("trade_advice", &self.trade_advice),
            ("risk_warning", &self.risk_warning),
        ]
        .into_iter()
        .find(|(_, text)| text.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Stage one output for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub score: f64,
    /// `Label::from_score(score)` for scored items; degraded results are always `Hold`
    pub label: Label,
    /// What the oracle suggested; kept for auditing, never trusted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_label: Option<Label>,
    pub narrative: Narrative,
    pub metrics: BTreeMap<String, f64>,
    pub succeeded: bool,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreResult {
    /// Neutral score given to items that could not be scored.
    pub const FALLBACK_SCORE: f64 = 50.0;

    /// Degraded result: neutral score and `Hold`, fallback narrative, `succeeded = false`.
    pub fn fallback(
        item_id: impl Into<String>,
        name: Option<String>,
        metrics: BTreeMap<String, f64>,
        retry_count: u32,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        Self {
            item_id: item_id.into(),
            name,
            score: Self::FALLBACK_SCORE,
            label: Label::Hold,
            oracle_label: None,
            narrative: Narrative::fallback(&reason),
            metrics,
            succeeded: false,
            retry_count,
            error: Some(reason),
        }
    }

    /// True when the oracle's own label disagrees with the local one.
    pub fn label_overridden(&self) -> bool {
        self.oracle_label.is_some_and(|hint| hint != self.label)
    }
}

/// Five prose sections of a deep analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSections {
    pub technical: String,
    pub fundamental: String,
    pub sentiment: String,
    pub trade_advice: String,
    pub risk_warning: String,
}

impl AnalysisSections {
    pub fn fallback(reason: &str) -> Self {
        Self {
            technical: format!("technical analysis unavailable: {reason}"),
            fundamental: "fundamental analysis unavailable".into(),
            sentiment: "sentiment unavailable".into(),
            trade_advice: "trade advice unavailable".into(),
            risk_warning: "risk warning unavailable".into(),
        }
    }

    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("technical", &self.technical),
            ("fundamental", &self.fundamental),
            ("sentiment", &self.sentiment),
            ("trade_advice", &self.trade_advice),
            ("risk_warning", &self.risk_warning),
        ]
        .into_iter()
        .find(|(_, text)| text.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Where the sentiment section of a detailed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentSource {
    /// The sentiment oracle answered
    Oracle,
    /// Sentiment oracle failed; the analysis's own section was used
    Narrative,
    /// The whole analysis fell back
    Fallback,
}

/// Stage two output for a single top-K item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResult {
    pub item_id: String,
    #[serde(flatten)]
    pub sections: AnalysisSections,
    pub sentiment_source: SentimentSource,
    pub succeeded: bool,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetailedResult {
    pub fn fallback(item_id: impl Into<String>, retry_count: u32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            item_id: item_id.into(),
            sections: AnalysisSections::fallback(&reason),
            sentiment_source: SentimentSource::Fallback,
            succeeded: false,
            retry_count,
            error: Some(reason),
        }
    }
}
