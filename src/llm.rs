use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Closed set of failure kinds a send can surface. The pipeline matches on
/// the variant: `RateLimited` is waited out, everything else stops the run.
#[derive(Debug)]
pub enum ApiFailure {
    RateLimited(String),
    Connection(String),
    Auth(String),
    BadRequest(String),
    Api(String),
    Unexpected(String),
}

impl ApiFailure {
    pub fn label(&self) -> &'static str {
        match self {
            ApiFailure::RateLimited(_) => "Rate limit exceeded",
            ApiFailure::Connection(_) => "API connection error",
            ApiFailure::Auth(_) => "Authentication error",
            ApiFailure::BadRequest(_) => "Invalid request",
            ApiFailure::Api(_) => "API error",
            ApiFailure::Unexpected(_) => "Unexpected error",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiFailure::RateLimited(s)
            | ApiFailure::Connection(s)
            | ApiFailure::Auth(s)
            | ApiFailure::BadRequest(s)
            | ApiFailure::Api(s)
            | ApiFailure::Unexpected(s) => s,
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.detail())
    }
}

impl std::error::Error for ApiFailure {}

#[async_trait::async_trait]
pub trait ModelProviderAdapter: Send + Sync + fmt::Debug {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse, ApiFailure>;
}

#[derive(Debug)]
pub struct OpenAiAdapter {
    http: Client,
    api_key: String,
    api_base: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let api_base = env::var("OPENAI_API_BASE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self { http, api_key, api_base })
    }
}

#[async_trait::async_trait]
impl ModelProviderAdapter for OpenAiAdapter {
    async fn send(&self, req: LlmRequest) -> Result<LlmResponse, ApiFailure> {
        let url = format!("{}/chat/completions", self.api_base);

        #[derive(Serialize)]
        struct OpenAiRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
        }

        #[derive(Deserialize)]
        struct OpenAiChoiceMessage {
            content: String,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: Option<OpenAiChoiceMessage>,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            prompt_tokens: Option<u32>,
            completion_tokens: Option<u32>,
            total_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
        }

        let body = OpenAiRequest {
            model: &req.model,
            messages: &req.messages,
        };

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    ApiFailure::Connection(e.to_string())
                } else {
                    ApiFailure::Unexpected(e.to_string())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let detail = format!("{}: {}", status, text);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ApiFailure::RateLimited(detail),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiFailure::Auth(detail),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ApiFailure::BadRequest(detail)
                }
                _ => ApiFailure::Api(detail),
            });
        }

        let parsed: OpenAiResponse = res
            .json()
            .await
            .map_err(|e| ApiFailure::Unexpected(format!("decoding response: {}", e)))?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let usage = parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        Ok(LlmResponse { content, usage })
    }
}

/// Offline stand-in used by tests and dry runs. Always answers "ok" and
/// reports 10 tokens of usage.
#[derive(Debug)]
pub struct MockAdapter;

#[async_trait::async_trait]
impl ModelProviderAdapter for MockAdapter {
    async fn send(&self, _req: LlmRequest) -> Result<LlmResponse, ApiFailure> {
        Ok(LlmResponse {
            content: "ok".to_string(),
            usage: Some(Usage {
                prompt_tokens: None,
                completion_tokens: None,
                total_tokens: Some(10),
            }),
        })
    }
}

pub fn adapter_for(
    provider: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<Box<dyn ModelProviderAdapter>> {
    match provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiAdapter::new(api_key.to_string(), timeout)?)),
        "mock" => Ok(Box::new(MockAdapter)),
        other => anyhow::bail!("unsupported provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_labels_match_report_wording() {
        let f = ApiFailure::RateLimited("429: slow down".into());
        assert_eq!(f.label(), "Rate limit exceeded");
        assert_eq!(f.to_string(), "Rate limit exceeded: 429: slow down");
        assert_eq!(ApiFailure::Connection(String::new()).label(), "API connection error");
        assert_eq!(ApiFailure::Auth(String::new()).label(), "Authentication error");
        assert_eq!(ApiFailure::BadRequest(String::new()).label(), "Invalid request");
        assert_eq!(ApiFailure::Api(String::new()).label(), "API error");
        assert_eq!(ApiFailure::Unexpected(String::new()).label(), "Unexpected error");
    }

    #[tokio::test]
    async fn mock_adapter_is_deterministic() {
        let res = MockAdapter
            .send(LlmRequest { model: "gpt-4o-mini".into(), messages: vec![] })
            .await
            .unwrap();
        assert_eq!(res.content, "ok");
        assert_eq!(res.usage.unwrap().total_tokens, Some(10));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = adapter_for("groq", "k", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("unsupported provider"));
    }
}
