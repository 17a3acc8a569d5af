use serde_json::{Value, json};
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `mailsage`.
///
/// The content-processing and analysis families are disjoint and carry a
/// stable machine code, a user-safe message, and a structured detail bag.
/// The detail bag is for logs only and must never be rendered into an
/// outbound email.
#[derive(Debug, Error)]
pub enum MailsageError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Inbound content processing ──────────────────────────────────────
    #[error("content: {0}")]
    Content(#[from] ContentError),

    // ── Persona resolution ──────────────────────────────────────────────
    #[error("persona: {0}")]
    Persona(#[from] PersonaError),

    // ── External analysis call ──────────────────────────────────────────
    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Content-processing errors ──────────────────────────────────────────────

/// Malformed or insufficient inbound input. Every variant maps to a polite
/// user-facing notice; the technical fields only ever reach the logs.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("email contained no analyzable content")]
    NoContent,

    #[error("attachment download failed: {filename}")]
    DownloadFailed { filename: String, message: String },

    #[error("{rejected} attachment(s) had an unsupported format")]
    InvalidFormat { rejected: usize },

    #[error("{rejected} attachment(s) exceeded the size limit of {limit_bytes} bytes")]
    SizeExceeded { rejected: usize, limit_bytes: usize },
}

impl ContentError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoContent => "NO_CONTENT",
            Self::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::SizeExceeded { .. } => "SIZE_EXCEEDED",
        }
    }

    /// Short, non-technical text safe to place in a reply email.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoContent => {
                "We couldn't find any text or screenshots to analyze in your email. \
                 Please send the campaign copy or a screenshot and we'll take a look."
            }
            Self::DownloadFailed { .. } => {
                "We couldn't retrieve one of your attachments. Please try sending it again."
            }
            Self::InvalidFormat { .. } => {
                "One or more attachments were in a format we can't analyze. \
                 Please send screenshots as PNG or JPEG images."
            }
            Self::SizeExceeded { .. } => {
                "One or more attachments were too large. Please send images under 10 MB."
            }
        }
    }

    /// Structured fields for logs. Lengths and counts only, never content.
    pub fn details(&self) -> Value {
        match self {
            Self::NoContent => json!({}),
            Self::DownloadFailed { filename, message } => {
                json!({ "filename": filename, "message": message })
            }
            Self::InvalidFormat { rejected } => json!({ "rejected": rejected }),
            Self::SizeExceeded {
                rejected,
                limit_bytes,
            } => json!({ "rejected": rejected, "limit_bytes": limit_bytes }),
        }
    }
}

// ─── Analysis errors ────────────────────────────────────────────────────────

/// External analysis-call failure. One variant per observable failure class;
/// empty choices and malformed schema are unified under `InvalidResponse`
/// because callers cannot usefully branch on the distinction.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("analysis call network failure: {message}")]
    Network { message: String },

    #[error("analysis endpoint returned HTTP {status}")]
    Http { status: u16, body_snippet: String },

    #[error("analysis response failed validation: {reason}")]
    InvalidResponse { reason: String },
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "LLM_TIMEOUT",
            Self::Network { .. } => "LLM_NETWORK_ERROR",
            Self::Http { .. } => "LLM_HTTP_ERROR",
            Self::InvalidResponse { .. } => "LLM_INVALID_RESPONSE",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => {
                "Our analysis took longer than expected. Please try again in a moment."
            }
            Self::Network { .. } | Self::Http { .. } => {
                "We hit a temporary problem reaching our analysis service. \
                 Please try again in a moment."
            }
            Self::InvalidResponse { .. } => {
                "We couldn't produce feedback for this email. Please try again in a moment."
            }
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::Timeout { timeout_ms } => json!({ "timeout_ms": timeout_ms }),
            Self::Network { message } => json!({ "message": message }),
            Self::Http {
                status,
                body_snippet,
            } => json!({ "status": status, "body_snippet": body_snippet }),
            Self::InvalidResponse { reason } => json!({ "reason": reason }),
        }
    }
}

// ─── Persona errors ─────────────────────────────────────────────────────────

/// Fatal configuration failure. Unknown recipients fall back to the default
/// persona and never surface here; this fires only when the default persona
/// itself cannot be loaded, which means the service is misconfigured.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("default persona {default_id} not found; service is misconfigured")]
    NoPersonaFound { default_id: String },

    #[error("persona store query failed: {0}")]
    Store(String),
}

impl PersonaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoPersonaFound { .. } => "NO_PERSONA_FOUND",
            Self::Store(_) => "PERSONA_STORE_ERROR",
        }
    }
}

impl From<sqlx::Error> for PersonaError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, MailsageError>;
