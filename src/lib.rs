//! # caption-studio
//!
//! Upload one image, edit a prompt, and get a caption back from Google Gemini.
//!
//! - [`asset`] validates what arrives at the upload boundary (PNG, JPEG, WEBP,
//!   at most 4 MiB).
//! - [`encoder`] turns the image into the base64 payload sent inline.
//! - [`gemini`] makes the single `generateContent` call and classifies failures.
//! - [`session`] holds the selected image, prompt and result, and drives
//!   `Idle -> Loading -> Done`.
//! - [`server`] exposes all of it over HTTP with axum.

pub mod asset;
pub mod caption;
pub mod config;
pub mod encoder;
pub mod gemini;
pub mod page;
pub mod preview;
pub mod server;
pub mod session;

pub use asset::{ImageAsset, MediaType, SelectedFile, ValidationError, MAX_IMAGE_BYTES};
pub use caption::{CaptionBackend, CaptionRequest, CaptionResult, ErrorKind};
pub use config::Config;
pub use encoder::{encode, EncodedPayload, EncodingError};
pub use gemini::{GeminiClient, GeminiError};
pub use preview::{PreviewHandle, PreviewStore};
pub use server::{router, AppState};
pub use session::{CaptionJob, Phase, SessionState, SessionView};
