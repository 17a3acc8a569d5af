use super::types::RawAttachment;
use crate::error::ContentError;
use serde::Deserialize;
use std::time::Duration;

/// Attachment reference as it arrives on the webhook: a URL to pull, plus
/// the sender-declared name and type.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundAttachment {
    pub url: String,
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// Download every referenced attachment into memory. Each download runs
/// under its own deadline; the first failure aborts the batch, since a
/// partially fetched email would misclassify.
pub async fn fetch_attachments(
    client: &reqwest::Client,
    attachments: &[InboundAttachment],
    timeout: Duration,
) -> Result<Vec<RawAttachment>, ContentError> {
    let mut fetched = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let bytes = tokio::time::timeout(timeout, download(client, &attachment.url))
            .await
            .map_err(|_| ContentError::DownloadFailed {
                filename: attachment.filename.clone(),
                message: format!("timed out after {}ms", timeout.as_millis()),
            })?
            .map_err(|e| ContentError::DownloadFailed {
                filename: attachment.filename.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            filename = %attachment.filename,
            size = bytes.len(),
            "attachment downloaded"
        );
        fetched.push(RawAttachment {
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            bytes,
        });
    }

    Ok(fetched)
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
