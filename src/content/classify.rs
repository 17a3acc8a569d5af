use super::types::{ContentPackage, ContentType, EncodedImage};

/// Classify already-admitted content into a typed package.
///
/// Pure and total: never fails for any input. Whitespace-only text counts
/// as absent. The categorization is evaluated in a fixed order so the
/// mapping from `(has_text, has_images)` to `ContentType` is exhaustive.
pub fn classify(text: &str, images: Vec<EncodedImage>) -> ContentPackage {
    let trimmed = text.trim();
    let has_text = !trimmed.is_empty();
    let has_images = !images.is_empty();

    let content_type = match (has_text, has_images) {
        (false, false) => ContentType::Empty,
        (false, true) => ContentType::ScreenshotOnly,
        (true, false) => ContentType::TextOnly,
        (true, true) => ContentType::Hybrid,
    };

    ContentPackage {
        content_type,
        text: trimmed.to_string(),
        images,
    }
}
