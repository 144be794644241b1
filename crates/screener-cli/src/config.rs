//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use screener_oracle::{DEFAULT_BASE_URL, DEFAULT_MODEL, OracleConfig};
use screener_pipeline::PipelineConfig;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Global configuration for screener
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub oracle: OracleSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub batch_size: usize,
    pub max_concurrent_requests: usize,
    pub min_request_interval_ms: u64,
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    pub top_k: usize,
    pub call_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            batch_size: d.batch_size,
            max_concurrent_requests: d.max_concurrent_requests,
            min_request_interval_ms: d.min_request_interval.as_millis() as u64,
            retry_count: d.retry_count,
            retry_base_delay_ms: d.retry_base_delay.as_millis() as u64,
            top_k: d.top_k,
            call_timeout_secs: d.call_timeout.as_secs(),
        }
    }
}

impl PipelineSection {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            max_concurrent_requests: self.max_concurrent_requests,
            min_request_interval: Duration::from_millis(self.min_request_interval_ms),
            retry_count: self.retry_count,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            top_k: self.top_k,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub rating_model: String,
    pub analysis_model: String,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: std::env::var(API_KEY_ENV).ok(),
            rating_model: DEFAULT_MODEL.to_string(),
            analysis_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl OracleSection {
    /// Whether a key is available from the file or the environment.
    pub fn has_api_key(&self) -> bool {
        resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok()).is_some()
    }

    /// Fails when no API key is configured or found in the environment.
    pub fn to_oracle_config(&self) -> Result<OracleConfig> {
        let api_key = resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
            .with_context(|| format!("no API key: set oracle.api_key or {API_KEY_ENV}"))?;
        Ok(OracleConfig {
            base_url: self.base_url.clone(),
            api_key,
            rating_model: self.rating_model.clone(),
            analysis_model: self.analysis_model.clone(),
        })
    }
}

/// Configured key if non-empty, else the environment's. A `${VAR}` that
/// expanded to nothing counts as not configured.
fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or(from_env)
        .filter(|k| !k.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./reports"),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./screener.toml (current directory)
    /// 2. ~/.config/screener/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("screener.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "screener") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let config = Config::default();
        assert_eq!(config.output.dir, PathBuf::from("./reports"));
        assert_eq!(config.pipeline.to_pipeline_config(), PipelineConfig::default());
        assert_eq!(config.oracle.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("SCREENER_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${SCREENER_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("SCREENER_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[pipeline]
batch_size = 50
max_concurrent_requests = 8
min_request_interval_ms = 250
top_k = 5

[oracle]
api_key = "sk-literal"
rating_model = "deepseek/deepseek-chat"

[output]
dir = "/tmp/reports"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let pipeline = config.pipeline.to_pipeline_config();
        assert_eq!(pipeline.batch_size, 50);
        assert_eq!(pipeline.max_concurrent_requests, 8);
        assert_eq!(pipeline.min_request_interval, Duration::from_millis(250));
        assert_eq!(pipeline.top_k, 5);
        // Unset keys keep their defaults
        assert_eq!(pipeline.retry_count, 3);

        let oracle = config.oracle.to_oracle_config().unwrap();
        assert_eq!(oracle.api_key, "sk-literal");
        assert_eq!(oracle.rating_model, "deepseek/deepseek-chat");
        assert_eq!(oracle.analysis_model, DEFAULT_MODEL);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn unset_env_reference_falls_back_to_default_key() {
        let config: Config =
            toml::from_str("[oracle]\napi_key = \"${SCREENER_UNSET_VAR_98765}\"\n").unwrap();
        assert_eq!(config.oracle.api_key, None);
        assert_eq!(
            resolve_api_key(config.oracle.api_key.as_deref(), Some("sk-env".into())),
            Some("sk-env".to_string())
        );
    }

    #[test]
    fn configured_key_beats_environment() {
        assert_eq!(
            resolve_api_key(Some("sk-file"), Some("sk-env".into())),
            Some("sk-file".to_string())
        );
        assert_eq!(
            resolve_api_key(Some(""), Some("sk-env".into())),
            Some("sk-env".to_string())
        );
    }

    #[test]
    fn no_key_anywhere_is_missing() {
        assert_eq!(resolve_api_key(None, None), None);
        assert_eq!(resolve_api_key(Some(""), Some(String::new())), None);
    }

    #[test]
    fn from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screener.toml");
        std::fs::write(&path, "[pipeline\nbatch_size = ").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
