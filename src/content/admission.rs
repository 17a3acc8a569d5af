use super::types::{EncodedImage, RawAttachment, SUPPORTED_IMAGE_TYPES};
use crate::error::ContentError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Outcome of screening a batch of attachments: what survived, and how many
/// were dropped per reason. Rejections are counted rather than raised so the
/// caller can tell "some images rejected" apart from "all images rejected".
#[derive(Debug, Default)]
pub struct Admission {
    pub accepted: Vec<EncodedImage>,
    pub rejected_format: usize,
    pub rejected_size: usize,
}

impl Admission {
    pub fn rejected(&self) -> usize {
        self.rejected_format + self.rejected_size
    }

    /// The error to raise when rejection left nothing to analyze. Returns
    /// `None` while any image survived or the email still has text; the
    /// dominant rejection reason wins, format on ties.
    pub fn terminal_error(&self, has_text: bool, limit_bytes: usize) -> Option<ContentError> {
        if has_text || !self.accepted.is_empty() || self.rejected() == 0 {
            return None;
        }
        if self.rejected_size > self.rejected_format {
            Some(ContentError::SizeExceeded {
                rejected: self.rejected_size,
                limit_bytes,
            })
        } else {
            Some(ContentError::InvalidFormat {
                rejected: self.rejected_format,
            })
        }
    }
}

/// Screen attachments against the supported MIME set and the size ceiling,
/// encoding survivors into data URLs. Input order is preserved.
///
/// The declared type is cross-checked against magic-byte sniffing; bytes
/// that identify as some other format are a format rejection even when the
/// declared type looks fine. Unsniffable bytes fall back to the declared
/// type alone.
pub fn admit_images(attachments: &[RawAttachment], max_bytes: usize) -> Admission {
    let mut admission = Admission::default();

    for attachment in attachments {
        let declared = attachment.content_type.to_ascii_lowercase();
        if !SUPPORTED_IMAGE_TYPES.contains(&declared.as_str()) {
            tracing::debug!(
                filename = %attachment.filename,
                content_type = %declared,
                "attachment rejected: unsupported format"
            );
            admission.rejected_format += 1;
            continue;
        }
        if let Some(info) = infer::get(&attachment.bytes)
            && !SUPPORTED_IMAGE_TYPES.contains(&info.mime_type())
        {
            tracing::debug!(
                filename = %attachment.filename,
                declared = %declared,
                sniffed = info.mime_type(),
                "attachment rejected: declared type contradicts magic bytes"
            );
            admission.rejected_format += 1;
            continue;
        }
        if attachment.bytes.len() > max_bytes {
            tracing::debug!(
                filename = %attachment.filename,
                size = attachment.bytes.len(),
                limit = max_bytes,
                "attachment rejected: over size ceiling"
            );
            admission.rejected_size += 1;
            continue;
        }

        admission.accepted.push(EncodedImage {
            filename: attachment.filename.clone(),
            content_type: declared.clone(),
            data_url: format!("data:{declared};base64,{}", BASE64.encode(&attachment.bytes)),
        });
    }

    admission
}
