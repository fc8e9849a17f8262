//! The captioning session: selected image, prompt, and generation lifecycle.
//!
//! Phases move `Idle -> Loading -> Done`. Selecting an asset or resetting
//! returns to `Idle`. Generation is split into `begin_generate` and
//! `finish_generate` so the owner can release its lock while the request is in
//! flight; `generate` runs the whole sequence for single-owner callers.

use serde::Serialize;

use crate::asset::{ImageAsset, MediaType, SelectedFile, ValidationError};
use crate::caption::{CaptionBackend, CaptionRequest, CaptionResult, ErrorKind};
use crate::encoder;
use crate::preview::{PreviewHandle, PreviewStore};

pub const DEFAULT_PROMPT: &str = "Describe this image in detail. Be creative and evocative.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Done,
}

#[derive(Debug)]
pub struct SessionState {
    asset: Option<ImageAsset>,
    preview: Option<PreviewHandle>,
    prompt: String,
    phase: Phase,
    caption: String,
    error: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

impl SessionState {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            asset: None,
            preview: None,
            prompt: prompt.into(),
            phase: Phase::Idle,
            caption: String::new(),
            error: String::new(),
        }
    }

    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Replace the current asset with `file`, or clear it if `file` is invalid.
    ///
    /// The previous preview is released before a new one is registered.
    pub fn select_asset(
        &mut self,
        file: SelectedFile,
        previews: &PreviewStore,
    ) -> Result<(), ValidationError> {
        self.preview = None;
        self.caption.clear();
        self.phase = Phase::Idle;

        match ImageAsset::select(file) {
            Ok(asset) => {
                tracing::info!(
                    media_type = %asset.media_type(),
                    size_bytes = asset.size_bytes(),
                    file_name = asset.file_name().unwrap_or_default(),
                    "image selected"
                );
                self.preview = Some(previews.register(&asset));
                self.asset = Some(asset);
                self.error.clear();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "image rejected");
                self.asset = None;
                self.error = e.to_string();
                Err(e)
            }
        }
    }

    pub fn edit_prompt(&mut self, text: impl Into<String>) {
        self.prompt = text.into();
    }

    /// Enter `Loading` and hand back a snapshot of what to caption.
    ///
    /// Without an asset this records an error and leaves the phase alone.
    /// While already loading it changes nothing.
    pub fn begin_generate(&mut self) -> Result<CaptionJob, ValidationError> {
        if self.is_loading() {
            return Err(ValidationError::InFlight);
        }
        let Some(asset) = &self.asset else {
            self.error = ValidationError::NoAsset.to_string();
            return Err(ValidationError::NoAsset);
        };

        let job = CaptionJob {
            asset: asset.clone(),
            prompt: self.prompt.clone(),
        };
        self.caption.clear();
        self.error.clear();
        self.phase = Phase::Loading;
        Ok(job)
    }

    pub fn finish_generate(&mut self, result: CaptionResult) {
        match result {
            CaptionResult::Success { text } => {
                self.caption = text;
                self.error.clear();
            }
            CaptionResult::Failure { detail, .. } => {
                self.caption.clear();
                self.error = detail;
            }
        }
        self.phase = Phase::Done;
    }

    pub async fn generate(&mut self, backend: &dyn CaptionBackend) -> Result<(), ValidationError> {
        let job = self.begin_generate()?;
        let result = job.run(backend).await;
        self.finish_generate(result);
        Ok(())
    }

    /// Drop the asset and its preview. The prompt survives.
    pub fn reset(&mut self) {
        self.preview = None;
        self.asset = None;
        self.caption.clear();
        self.error.clear();
        self.phase = Phase::Idle;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            prompt: self.prompt.clone(),
            caption: self.caption.clone(),
            error: self.error.clone(),
            preview_url: self.preview.as_ref().map(PreviewHandle::uri),
            asset: self.asset.as_ref().map(|asset| AssetView {
                file_name: asset.file_name().map(str::to_string),
                media_type: asset.media_type(),
                size_bytes: asset.size_bytes(),
            }),
            can_generate: self.asset.is_some() && !self.is_loading(),
        }
    }
}

/// Snapshot of one generation attempt, detached from the session.
#[derive(Debug, Clone)]
pub struct CaptionJob {
    asset: ImageAsset,
    prompt: String,
}

impl CaptionJob {
    pub fn new(asset: ImageAsset, prompt: impl Into<String>) -> Self {
        Self {
            asset,
            prompt: prompt.into(),
        }
    }

    /// Encode the image, then ask the backend for a caption.
    pub async fn run(self, backend: &dyn CaptionBackend) -> CaptionResult {
        let payload = match encoder::encode(&self.asset).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode image");
                return CaptionResult::failure(
                    ErrorKind::Encoding,
                    format!("Failed to generate caption: {e}"),
                );
            }
        };

        backend
            .generate_caption(CaptionRequest {
                payload,
                mime_type: self.asset.media_type().as_str().to_string(),
                prompt: self.prompt,
            })
            .await
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub prompt: String,
    pub caption: String,
    pub error: String,
    pub preview_url: Option<String>,
    pub asset: Option<AssetView>,
    pub can_generate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetView {
    pub file_name: Option<String>,
    pub media_type: MediaType,
    pub size_bytes: u64,
}
