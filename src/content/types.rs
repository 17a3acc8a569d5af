use serde::{Deserialize, Serialize};

/// MIME types the analysis endpoint accepts as image input.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// Shape of the inbound email content, decided once at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    TextOnly,
    ScreenshotOnly,
    Hybrid,
    /// Terminal. Callers must raise `NO_CONTENT` instead of building a request.
    Empty,
}

/// An attachment as handed over by the ingestion layer: bytes already
/// downloaded, MIME type as declared by the sender.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An admitted image, base64-encoded into a self-describing data URL ready
/// for a multi-modal content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub filename: String,
    pub content_type: String,
    pub data_url: String,
}

/// The classified text/image bundle handed to request assembly. Immutable
/// once built; owned by the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPackage {
    pub content_type: ContentType,
    pub text: String,
    pub images: Vec<EncodedImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ContentType::TextOnly).unwrap(),
            "\"text-only\""
        );
        assert_eq!(
            serde_json::to_string(&ContentType::ScreenshotOnly).unwrap(),
            "\"screenshot-only\""
        );
        assert_eq!(
            serde_json::to_string(&ContentType::Hybrid).unwrap(),
            "\"hybrid\""
        );
        assert_eq!(
            serde_json::to_string(&ContentType::Empty).unwrap(),
            "\"empty\""
        );
    }

    #[test]
    fn supported_set_covers_jpeg_aliases() {
        assert!(SUPPORTED_IMAGE_TYPES.contains(&"image/jpeg"));
        assert!(SUPPORTED_IMAGE_TYPES.contains(&"image/jpg"));
        assert!(!SUPPORTED_IMAGE_TYPES.contains(&"image/gif"));
    }
}
