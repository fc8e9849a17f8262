//! Caption request/result types and the backend seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::encoder::EncodedPayload;

/// One outbound captioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    pub payload: EncodedPayload,
    pub mime_type: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Encoding,
    Credential,
    Transport,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionResult {
    Success { text: String },
    Failure { reason: ErrorKind, detail: String },
}

impl CaptionResult {
    pub fn success(text: impl Into<String>) -> Self {
        CaptionResult::Success { text: text.into() }
    }

    pub fn failure(reason: ErrorKind, detail: impl Into<String>) -> Self {
        CaptionResult::Failure {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaptionResult::Success { .. })
    }
}

/// Anything that can turn a `CaptionRequest` into a `CaptionResult`.
///
/// Implementations never fail outright; every error is folded into
/// `CaptionResult::Failure`.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn generate_caption(&self, request: CaptionRequest) -> CaptionResult;

    /// Model identifier reported to users.
    fn model(&self) -> &str;
}
