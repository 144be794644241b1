//! Minimal client for OpenAI-compatible chat-completions endpoints

use std::sync::LazyLock;
use std::time::Duration;

use screener_pipeline::OracleError;
use serde::{Deserialize, Serialize};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error body kept in messages
const MAX_ERROR_BODY: usize = 200;

/// Shared HTTP client with connection pooling. Per-call timeouts are
/// applied by the pipeline, so only the connect phase is bounded here.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(32)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Map a reqwest failure onto the oracle error taxonomy.
pub fn from_reqwest(e: reqwest::Error) -> OracleError {
    let status = e.status().map(|s| s.as_u16());
    // Drop the URL so endpoints never reach the logs
    OracleError::transport(status, e.without_url().to_string())
}

/// Error for a non-2xx response.
pub fn status_error(status: u16, body: &str) -> OracleError {
    let body = body.trim();
    let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
    OracleError::transport(Some(status), snippet)
}

/// First choice's text, or `Malformed` when the reply carries none.
fn extract_content(body: &str) -> Result<String, OracleError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::Malformed(format!("invalid response JSON: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| OracleError::Malformed("response has no content".into()))
}

#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// `base_url` is the API root, e.g. `https://openrouter.ai/api/v1`.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One chat completion; returns the assistant's text.
    pub async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, OracleError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let request = ChatRequest { model, messages };

        let response = SHARED_CLIENT
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        log::trace!("{model}: {} bytes of response", body.len());
        extract_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = ChatClient::new("https://openrouter.ai/api/v1/", "k");
        assert_eq!(c.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn debug_hides_api_key() {
        let c = ChatClient::new("http://localhost:8080", "sk-secret");
        assert!(!format!("{c:?}").contains("sk-secret"));
    }

    #[test]
    fn request_serializes_openai_shape() {
        let req = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#
        );
    }

    #[test]
    fn content_extracted_from_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"72\nok"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "72\nok");
    }

    #[test]
    fn missing_content_is_malformed() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":"  "}}]}"#,
            "not json",
        ] {
            let err = extract_content(body).unwrap_err();
            assert!(matches!(err, OracleError::Malformed(_)), "{body}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn status_errors_classified() {
        assert!(!status_error(401, "bad key").is_retryable());
        assert!(status_error(429, "slow down").is_retryable());
        assert!(status_error(502, "").is_retryable());
        let long = "x".repeat(1000);
        match status_error(500, &long) {
            OracleError::Transport { message, .. } => assert_eq!(message.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {other:?}"),
        }
    }
}
