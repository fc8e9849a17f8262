//! Google Gemini caption client.
//!
//! Sends one `generateContent` call per caption with the image inline,
//! followed by the prompt text. See: <https://ai.google.dev/api/generate-content>

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::caption::{CaptionBackend, CaptionRequest, CaptionResult, ErrorKind};

pub const MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const API_KEY_HEADER: &str = "x-goog-api-key";
const INVALID_KEY_MARKER: &str = "API key not valid";
const LOG_BODY_LIMIT: usize = 500;

pub const INVALID_KEY_MESSAGE: &str =
    "The provided API key is not valid. Please check your configuration.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred while generating the caption.";

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("unrecognized error response (HTTP {status})")]
    UnrecognizedError { status: u16 },

    #[error("response did not contain any text")]
    MissingText,
}

impl GeminiError {
    /// Fold an error into the user-facing failure. The raw upstream message is
    /// never surfaced for credential problems.
    pub fn into_result(self) -> CaptionResult {
        match self {
            GeminiError::Api { message, .. } if message.contains(INVALID_KEY_MARKER) => {
                CaptionResult::failure(ErrorKind::Credential, INVALID_KEY_MESSAGE)
            }
            GeminiError::Api { message, .. } => CaptionResult::failure(
                ErrorKind::Transport,
                format!("Error calling AI model: {message}"),
            ),
            GeminiError::Http(e) => CaptionResult::failure(
                ErrorKind::Transport,
                format!("Error calling AI model: {}", e.without_url()),
            ),
            GeminiError::UnrecognizedError { .. } | GeminiError::MissingText => {
                CaptionResult::failure(ErrorKind::Unknown, UNKNOWN_ERROR_MESSAGE)
            }
        }
    }
}

/// Gemini client bound to a single API key and the fixed [`MODEL`].
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeminiError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host serving the same REST surface.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GeminiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("caption-studio/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, MODEL)
    }

    async fn request(&self, request: &CaptionRequest) -> Result<String, GeminiError> {
        let body = GenerateContentRequest::from(request);

        tracing::info!(
            model = MODEL,
            mime_type = %request.mime_type,
            payload_len = request.payload.as_str().len(),
            prompt_len = request.prompt.len(),
            "sending caption request to Gemini"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(
            status = status.as_u16(),
            body = %truncate(&text, LOG_BODY_LIMIT),
            "Gemini response"
        );

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(err) => GeminiError::Api {
                    code: err.error.code.unwrap_or(status.as_u16()),
                    message: err.error.message,
                },
                Err(_) => GeminiError::UnrecognizedError {
                    status: status.as_u16(),
                },
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|_| GeminiError::MissingText)?;
        parsed.text().ok_or(GeminiError::MissingText)
    }
}

#[async_trait]
impl CaptionBackend for GeminiClient {
    async fn generate_caption(&self, request: CaptionRequest) -> CaptionResult {
        match self.request(&request).await {
            Ok(text) => {
                tracing::info!(caption_len = text.len(), "caption generated");
                CaptionResult::success(text)
            }
            Err(e) => {
                tracing::error!(error = %e, "error generating caption from Gemini");
                e.into_result()
            }
        }
    }

    fn model(&self) -> &str {
        MODEL
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// --- Gemini API Request/Response Types ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
enum Part<'a> {
    InlineData { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

impl<'a> From<&'a CaptionRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a CaptionRequest) -> Self {
        // Media first, then the instruction text.
        GenerateContentRequest {
            contents: [Content {
                parts: [
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &request.mime_type,
                            data: request.payload.as_str(),
                        },
                    },
                    Part::Text {
                        text: &request.prompt,
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, skipping thoughts.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let texts: Vec<String> = content
            .parts
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MediaType;
    use crate::encoder::{strip_data_uri_header, to_data_uri, EncodedPayload};

    fn request() -> CaptionRequest {
        let uri = to_data_uri(MediaType::Png, b"png-bytes");
        CaptionRequest {
            payload: EncodedPayload::from_base64(strip_data_uri_header(&uri).unwrap()),
            mime_type: "image/png".to_string(),
            prompt: "Describe this image".to_string(),
        }
    }

    #[test]
    fn request_body_puts_media_before_text() {
        let req = request();
        let body = serde_json::to_value(GenerateContentRequest::from(&req)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": req.payload.as_str() } },
                        { "text": "Describe this image" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn response_text_is_verbatim_and_skips_thoughts() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "  A cat,\n" },
                    { "text": "asleep. " }
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("  A cat,\nasleep. "));
    }

    #[test]
    fn empty_candidates_have_no_text() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn invalid_key_is_sanitized() {
        let raw = "API key not valid. Please pass a valid API key. [secret-detail]";
        let result = GeminiError::Api {
            code: 400,
            message: raw.to_string(),
        }
        .into_result();
        assert_eq!(
            result,
            CaptionResult::failure(ErrorKind::Credential, INVALID_KEY_MESSAGE)
        );
    }

    #[test]
    fn api_errors_are_prefixed() {
        let result = GeminiError::Api {
            code: 429,
            message: "Resource has been exhausted".to_string(),
        }
        .into_result();
        assert_eq!(
            result,
            CaptionResult::failure(
                ErrorKind::Transport,
                "Error calling AI model: Resource has been exhausted"
            )
        );
    }

    #[test]
    fn odd_shapes_are_unknown() {
        for err in [
            GeminiError::UnrecognizedError { status: 502 },
            GeminiError::MissingText,
        ] {
            assert_eq!(
                err.into_result(),
                CaptionResult::failure(ErrorKind::Unknown, UNKNOWN_ERROR_MESSAGE)
            );
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GeminiClient::with_base_url("k", "http://localhost:9/").unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
