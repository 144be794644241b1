//! OpenAI-compatible chat model as the pipeline's remote oracle

pub mod client;
pub mod oracle;
pub mod parse;
pub mod prompts;

pub use client::ChatClient;
pub use oracle::{DEFAULT_BASE_URL, DEFAULT_MODEL, LlmOracle, OracleConfig};
pub use parse::{parse_analysis, parse_rating};
