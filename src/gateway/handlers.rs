use super::AppState;
use crate::analysis;
use crate::content::{self, InboundAttachment};
use crate::delivery::{self, OutboundEmail, RenderedEmail};
use crate::error::{ContentError, PersonaError};
use crate::persona::Persona;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Raw webhook payload as produced by the ingestion provider.
#[derive(Debug, Deserialize)]
pub struct InboundEmail {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<InboundAttachment>,
}

/// GET /health
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /webhooks/inbound — the whole pipeline, strictly sequential.
pub(super) async fn handle_inbound(
    State(state): State<AppState>,
    Json(payload): Json<InboundEmail>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();

    tracing::info!(
        %request_id,
        subject_len = payload.subject.len(),
        text_len = payload.text.as_deref().map_or(0, str::len),
        attachments = payload.attachments.len(),
        "webhook received"
    );

    if !sender_allowed(&state, &payload.from) {
        tracing::warn!("sender not on allow-list, dropping");
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "status": "forbidden" })),
        );
    }

    // Persona first: error notices carry its branding, and a missing
    // default persona must abort loudly before any external spend.
    let persona = match state.resolver.resolve(&payload.to).await {
        Ok(persona) => persona,
        Err(e @ PersonaError::NoPersonaFound { .. }) => {
            tracing::error!(code = e.code(), "FATAL: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "misconfigured" })),
            );
        }
        Err(e) => {
            tracing::error!(code = e.code(), "persona resolution failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error" })),
            );
        }
    };

    match run_pipeline(&state, &payload, &persona).await {
        Ok(feedback) => {
            let email = delivery::render_feedback(&persona, &payload.subject, &feedback.feedback);
            let result = deliver(&state, &payload.from, email).await;
            tracing::info!(
                %request_id,
                delivered = result.is_sent(),
                attempts = result.attempts(),
                feedback_len = feedback.feedback.len(),
                tokens_used = feedback.tokens_used,
                processing_time_ms = feedback.processing_time_ms,
                "analysis complete"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "processed",
                    "delivered": result.is_sent(),
                })),
            )
        }
        Err(handled) => {
            // Handled input/analysis failure: notify the sender politely
            // and acknowledge the webhook so it is not redelivered.
            let email = delivery::render_error_notice(&persona, handled.user_message);
            let result = deliver(&state, &payload.from, email).await;
            tracing::warn!(
                %request_id,
                code = handled.code,
                details = %handled.details,
                notified = result.is_sent(),
                "pipeline failed with handled error"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "handled_error",
                    "code": handled.code,
                })),
            )
        }
    }
}

/// A typed failure already reduced to what the handler needs: stable code
/// and detail bag for the logs, polite message for the outbound notice.
struct HandledError {
    code: &'static str,
    user_message: &'static str,
    details: serde_json::Value,
}

impl From<ContentError> for HandledError {
    fn from(e: ContentError) -> Self {
        Self {
            code: e.code(),
            user_message: e.user_message(),
            details: e.details(),
        }
    }
}

impl From<crate::error::AnalysisError> for HandledError {
    fn from(e: crate::error::AnalysisError) -> Self {
        Self {
            code: e.code(),
            user_message: e.user_message(),
            details: e.details(),
        }
    }
}

async fn run_pipeline(
    state: &AppState,
    payload: &InboundEmail,
    persona: &Persona,
) -> Result<analysis::AnalysisResult, HandledError> {
    let text = extract_text(payload);

    let raw = content::fetch_attachments(
        &state.download,
        &payload.attachments,
        Duration::from_millis(state.config.content.download_timeout_ms),
    )
    .await?;

    let max_bytes = state.config.content.max_image_bytes;
    let admission = content::admit_images(&raw, max_bytes);
    if admission.rejected() > 0 {
        tracing::info!(
            accepted = admission.accepted.len(),
            rejected_format = admission.rejected_format,
            rejected_size = admission.rejected_size,
            "some attachments rejected"
        );
    }
    if let Some(err) = admission.terminal_error(!text.trim().is_empty(), max_bytes) {
        return Err(err.into());
    }

    let package = content::classify(&text, admission.accepted);
    if package.content_type == content::ContentType::Empty {
        return Err(ContentError::NoContent.into());
    }
    tracing::info!(
        content_type = ?package.content_type,
        text_len = package.text.len(),
        images = package.images.len(),
        "content classified"
    );

    let request = analysis::build(&package, persona, &state.request_config());
    let result = state
        .analysis
        .call(
            &request,
            Duration::from_millis(state.config.analysis.timeout_ms),
        )
        .await?;
    Ok(result)
}

async fn deliver(
    state: &AppState,
    to: &str,
    email: RenderedEmail,
) -> delivery::DeliveryResult {
    let outbound = OutboundEmail {
        from: state.config.delivery.from_address.clone(),
        to: to.to_string(),
        subject: email.subject,
        text: email.text,
        html: email.html,
    };
    state
        .delivery
        .send_with_retry(
            &outbound,
            Duration::from_millis(state.config.delivery.timeout_ms),
        )
        .await
}

fn sender_allowed(state: &AppState, from: &str) -> bool {
    let allowed = &state.config.gateway.allowed_senders;
    if allowed.is_empty() {
        return true;
    }
    let from = from.trim().to_lowercase();
    allowed.iter().any(|a| a.trim().to_lowercase() == from)
}

/// Prefer the plain-text part; fall back to the rendered text of the HTML
/// part so an HTML-only email still classifies as text.
fn extract_text(payload: &InboundEmail) -> String {
    if let Some(text) = &payload.text
        && !text.trim().is_empty()
    {
        return text.clone();
    }
    payload.html.as_deref().map(html_to_text).unwrap_or_default()
}

fn html_to_text(html: &str) -> String {
    use scraper::{ElementRef, Html, Selector};

    let document = Html::parse_document(html);
    let Some(body) = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
    else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        if let Some(text) = node.value().as_text() {
            // Markup in campaign emails routinely inlines style and
            // tracking-script blocks; their contents are not copy.
            let styling = node
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|el| matches!(el.value().name(), "script" | "style"));
            if !styling {
                parts.push(&**text);
            }
        }
    }
    let joined = parts.join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
