use super::request::{AnalysisRequest, ContentItem};
use crate::error::AnalysisError;
use crate::http::build_http_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Feedback text above this length is accepted but flagged; it usually
/// means the upstream model ignored its output structure.
const OVERSIZE_FEEDBACK_CHARS: usize = 5_000;

const BODY_SNIPPET_CHARS: usize = 500;

/// Validated outcome of a successful analysis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub feedback: String,
    pub tokens_used: Option<u64>,
    pub processing_time_ms: u64,
}

/// Client for the chat-completions analysis endpoint.
///
/// One call, one armed deadline, no retries: a failed analysis becomes a
/// user-visible error by design rather than a second model bill. Dropping
/// the in-flight future on deadline expiry aborts the transfer itself, so
/// a late response cannot leak a connection.
pub struct AnalysisClient {
    endpoint: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    client: Client,
}

// ── Wire types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl AnalysisClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.into(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            client: build_http_client(),
        }
    }

    /// Issue the request under a hard deadline and validate the response
    /// structure before trusting its content.
    pub async fn call(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = Self::to_wire(request);
        let started = Instant::now();

        let response = tokio::time::timeout(timeout, self.post(&body))
            .await
            .map_err(|_| {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    model = %request.model,
                    "analysis call timed out"
                );
                AnalysisError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            })??;

        let result = Self::validate(response, started.elapsed())?;

        if result.feedback.chars().count() > OVERSIZE_FEEDBACK_CHARS {
            tracing::warn!(
                feedback_chars = result.feedback.chars().count(),
                "analysis feedback unusually long; upstream model may be misbehaving"
            );
        }

        Ok(result)
    }

    async fn post(&self, body: &ChatRequest) -> Result<ChatResponse, AnalysisError> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(auth) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth);
        }

        let response = builder.send().await.map_err(|e| AnalysisError::Network {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_snippet = snippet(&response.text().await.unwrap_or_default());
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body_snippet,
            });
        }

        let raw = response.text().await.map_err(|e| AnalysisError::Network {
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| AnalysisError::InvalidResponse {
            reason: format!("schema mismatch: {e}"),
        })
    }

    fn validate(
        response: ChatResponse,
        elapsed: Duration,
    ) -> Result<AnalysisResult, AnalysisError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::InvalidResponse {
                reason: "empty choices array".into(),
            })?;

        let feedback = choice
            .message
            .content
            .unwrap_or_default()
            .trim()
            .to_string();
        if feedback.is_empty() {
            return Err(AnalysisError::InvalidResponse {
                reason: "empty message content".into(),
            });
        }

        Ok(AnalysisResult {
            feedback,
            tokens_used: response.usage.map(|u| u.total_tokens),
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }

    fn to_wire(request: &AnalysisRequest) -> ChatRequest {
        // A lone text item rides as a plain string; any image promotes the
        // user content to a part array.
        let user_content = if request.content_items.len() == 1
            && let ContentItem::Text { text } = &request.content_items[0]
        {
            WireContent::Text(text.clone())
        } else {
            WireContent::Parts(
                request
                    .content_items
                    .iter()
                    .map(|item| match item {
                        ContentItem::Text { text } => WirePart::Text { text: text.clone() },
                        ContentItem::ImageUrl { url } => WirePart::ImageUrl {
                            image_url: ImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            model: request.model.clone(),
            messages: vec![
                WireMessage {
                    role: "system",
                    content: WireContent::Text(request.system_prompt.clone()),
                },
                WireMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with(items: Vec<ContentItem>) -> AnalysisRequest {
        AnalysisRequest {
            model: "qwen2-vl-7b-instruct".into(),
            system_prompt: "You are an analyst.".into(),
            content_items: items,
            max_tokens: 512,
            temperature: 0.7,
        }
    }

    fn text_request() -> AnalysisRequest {
        request_with(vec![ContentItem::Text {
            text: "Analyze this".into(),
        }])
    }

    async fn client_for(server: &MockServer) -> AnalysisClient {
        AnalysisClient::new(format!("{}/v1/chat/completions", server.uri()), None)
    }

    #[test]
    fn lone_text_item_serializes_as_plain_string() {
        let wire = AnalysisClient::to_wire(&text_request());
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["messages"][1]["content"], "Analyze this");
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn images_serialize_as_part_array_before_text() {
        let wire = AnalysisClient::to_wire(&request_with(vec![
            ContentItem::ImageUrl {
                url: "data:image/png;base64,aGk=".into(),
            },
            ContentItem::Text {
                text: "directive".into(),
            },
        ]));
        let json = serde_json::to_value(&wire).unwrap();
        let parts = json["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(parts[0]["image_url"]["url"], "data:image/png;base64,aGk=");
        assert_eq!(parts[1]["type"], "text");
    }

    #[tokio::test]
    async fn successful_call_yields_validated_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}],
                "usage": {"total_tokens": 42}
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.feedback, "ok");
        assert_eq!(result.tokens_used, Some(42));
    }

    #[tokio::test]
    async fn slow_response_yields_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "choices": [{"message": {"content": "late"}}]
                    }))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call(&text_request(), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_TIMEOUT");
    }

    #[tokio::test]
    async fn http_500_yields_http_error_with_status_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_HTTP_ERROR");
        assert_eq!(err.details()["status"], 500);
        assert_eq!(err.details()["body_snippet"], "upstream exploded");
    }

    #[tokio::test]
    async fn empty_choices_yields_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_INVALID_RESPONSE");
    }

    #[tokio::test]
    async fn malformed_schema_yields_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_INVALID_RESPONSE");
    }

    #[tokio::test]
    async fn whitespace_only_content_yields_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "   \n  "}}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_INVALID_RESPONSE");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_network_error() {
        // Port 1 is never listening.
        let client = AnalysisClient::new("http://127.0.0.1:1/v1/chat/completions", None);
        let err = client
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "LLM_NETWORK_ERROR");
    }

    #[tokio::test]
    async fn oversize_feedback_is_accepted() {
        let server = MockServer::start().await;
        let long = "x".repeat(6_000);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": long}}]
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .call(&text_request(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.feedback.len(), 6_000);
    }

    #[test]
    fn auth_header_is_precomputed() {
        let client = AnalysisClient::new("http://localhost/v1", Some("sk-test"));
        assert_eq!(client.cached_auth_header.as_deref(), Some("Bearer sk-test"));
    }
}
