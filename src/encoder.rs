//! Converts an `ImageAsset` into the base64 payload sent inline to the model.

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::asset::{ImageAsset, MediaType};

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("failed to read image: {0}")]
    Read(#[from] tokio::task::JoinError),

    #[error("data URI is missing its header separator")]
    MissingHeader,

    #[error("encoded image is empty")]
    Empty,
}

/// Base64 text of an image, without any data-URI header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// Wrap base64 text produced elsewhere.
    pub fn from_base64(payload: impl Into<String>) -> Self {
        EncodedPayload(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(&self.0)
    }
}

/// Encode the full content of `asset` as base64.
///
/// Runs on the blocking pool; a 4 MiB image is enough work to stall the
/// executor otherwise.
pub async fn encode(asset: &ImageAsset) -> Result<EncodedPayload, EncodingError> {
    let bytes = asset.bytes().clone();
    let media_type = asset.media_type();

    let data_uri = tokio::task::spawn_blocking(move || to_data_uri(media_type, &bytes)).await?;

    let payload = strip_data_uri_header(&data_uri)?;
    tracing::debug!(
        media_type = %media_type,
        encoded_len = payload.len(),
        "encoded image payload"
    );
    Ok(EncodedPayload::from_base64(payload))
}

pub fn to_data_uri(media_type: MediaType, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Drop the `data:<mime>;base64,` prefix, leaving only the payload.
pub fn strip_data_uri_header(data_uri: &str) -> Result<&str, EncodingError> {
    let (_, payload) = data_uri
        .split_once(',')
        .ok_or(EncodingError::MissingHeader)?;
    if payload.is_empty() {
        return Err(EncodingError::Empty);
    }
    Ok(payload)
}
