use crate::content::{ContentPackage, ContentType};
use crate::persona::Persona;
use serde::{Deserialize, Serialize};

/// One ordered entry in the multi-modal request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ImageUrl { url: String },
}

/// Model knobs pinned by operator configuration. Deliberately not taken
/// from per-request input, so a caller can neither inflate cost nor change
/// determinism.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// A fully assembled analysis request. Built fresh per call and never
/// retained past it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub model: String,
    pub system_prompt: String,
    pub content_items: Vec<ContentItem>,
    pub max_tokens: u32,
    pub temperature: f64,
}

const SCREENSHOT_DIRECTIVE: &str = "Analyze this email marketing campaign screenshot and \
provide detailed feedback following the structure specified in the system prompt.";

const SCREENSHOT_WITH_TEXT_DIRECTIVE: &str = "Analyze the email marketing campaign \
screenshot(s) above and provide detailed feedback following the structure specified in the \
system prompt. The email's extracted text is included below as additional context:";

const TEXT_DIRECTIVE: &str = "Analyze the following email marketing campaign copy and provide \
detailed feedback following the structure specified in the system prompt:";

/// Assemble the analysis request: images first, directive-wrapped text last.
/// The trailing text anchors the preceding images; the persona's system
/// prompt is carried verbatim. Pure function, no I/O.
pub fn build(
    package: &ContentPackage,
    persona: &Persona,
    config: &RequestConfig,
) -> AnalysisRequest {
    debug_assert!(package.content_type != ContentType::Empty);

    let mut content_items: Vec<ContentItem> = package
        .images
        .iter()
        .map(|image| ContentItem::ImageUrl {
            url: image.data_url.clone(),
        })
        .collect();

    let directive = if package.images.is_empty() {
        format!("{TEXT_DIRECTIVE}\n\n{}", package.text)
    } else if package.text.is_empty() {
        SCREENSHOT_DIRECTIVE.to_string()
    } else {
        format!("{SCREENSHOT_WITH_TEXT_DIRECTIVE}\n\n{}", package.text)
    };
    content_items.push(ContentItem::Text { text: directive });

    AnalysisRequest {
        model: config.model.clone(),
        system_prompt: persona.system_prompt.clone(),
        content_items,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}
