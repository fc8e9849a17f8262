//! Image selection: the file boundary and the validated `ImageAsset`.

use std::fmt;

use bytes::Bytes;
use image::ImageFormat;
use serde::Serialize;
use thiserror::Error;

/// Inline image data accepted by Gemini is capped at 4 MiB.
pub const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;

/// Longest prompt accepted from an upload form.
pub const MAX_PROMPT_BYTES: usize = 32 * 1024;

/// Media types the file boundary accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
        }
    }

    /// Parse a declared content type, ignoring parameters and case.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(MediaType::Png),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(MediaType::Png),
            ImageFormat::Jpeg => Some(MediaType::Jpeg),
            ImageFormat::WebP => Some(MediaType::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised locally before anything reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Image size must be less than 4MB.")]
    TooLarge { size_bytes: u64 },

    #[error("Unsupported image type: {0}. Use PNG, JPG, or WEBP.")]
    UnsupportedType(String),

    #[error("Please select an image first.")]
    NoAsset,

    #[error("A caption is already being generated.")]
    InFlight,

    #[error("Prompt must be at most {max_bytes} bytes.")]
    PromptTooLong { max_bytes: usize },
}

/// A file as it arrived at the upload boundary, before validation.
///
/// `size_bytes` is the size the client sent; `bytes` may be truncated when the
/// upload was cut off after crossing the ceiling.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: Option<String>,
    pub declared_type: Option<String>,
    pub bytes: Bytes,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn new(file_name: Option<String>, declared_type: Option<String>, bytes: Bytes) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            file_name,
            declared_type,
            bytes,
            size_bytes,
        }
    }
}

/// A validated image, at most [`MAX_IMAGE_BYTES`] long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Bytes,
    media_type: MediaType,
    file_name: Option<String>,
}

impl ImageAsset {
    /// Validate a selected file. Size is checked before anything else.
    pub fn select(file: SelectedFile) -> Result<Self, ValidationError> {
        if file.size_bytes > MAX_IMAGE_BYTES || file.bytes.len() as u64 > MAX_IMAGE_BYTES {
            return Err(ValidationError::TooLarge {
                size_bytes: file.size_bytes.max(file.bytes.len() as u64),
            });
        }

        // Magic bytes take precedence over whatever the client declared.
        let media_type = match image::guess_format(&file.bytes) {
            Ok(format) => MediaType::from_format(format).ok_or_else(|| {
                ValidationError::UnsupportedType(format!("{format:?}").to_lowercase())
            })?,
            Err(_) => {
                let declared = file.declared_type.as_deref().unwrap_or("unknown");
                MediaType::from_mime(declared)
                    .ok_or_else(|| ValidationError::UnsupportedType(declared.to_string()))?
            }
        };

        Ok(Self {
            bytes: file.bytes,
            media_type,
            file_name: file.file_name,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    pub(crate) fn png_file(len: usize) -> SelectedFile {
        let mut data = PNG_MAGIC.to_vec();
        data.resize(len.max(PNG_MAGIC.len()), 0);
        SelectedFile::new(
            Some("cat.png".to_string()),
            Some("image/png".to_string()),
            Bytes::from(data),
        )
    }

    #[test]
    fn accepts_exactly_the_ceiling() {
        let asset = ImageAsset::select(png_file(MAX_IMAGE_BYTES as usize)).unwrap();
        assert_eq!(asset.size_bytes(), MAX_IMAGE_BYTES);
        assert_eq!(asset.media_type(), MediaType::Png);
        assert_eq!(asset.file_name(), Some("cat.png"));
    }

    #[test]
    fn rejects_one_byte_over() {
        let err = ImageAsset::select(png_file(MAX_IMAGE_BYTES as usize + 1)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLarge {
                size_bytes: MAX_IMAGE_BYTES + 1
            }
        );
    }

    #[test]
    fn rejects_truncated_upload_by_reported_size() {
        let mut file = png_file(64);
        file.size_bytes = 10 * 1024 * 1024;
        assert!(matches!(
            ImageAsset::select(file),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn sniffed_format_wins_over_declared_type() {
        let mut file = png_file(32);
        file.declared_type = Some("image/webp".to_string());
        let asset = ImageAsset::select(file).unwrap();
        assert_eq!(asset.media_type(), MediaType::Png);
    }

    #[test]
    fn falls_back_to_declared_type() {
        let file = SelectedFile::new(None, Some("image/jpeg; q=1".to_string()), Bytes::new());
        let asset = ImageAsset::select(file).unwrap();
        assert_eq!(asset.media_type(), MediaType::Jpeg);
        assert_eq!(asset.size_bytes(), 0);
    }

    #[test]
    fn rejects_other_media_types() {
        let file = SelectedFile::new(
            Some("notes.txt".to_string()),
            Some("text/plain".to_string()),
            Bytes::from_static(b"hello"),
        );
        assert_eq!(
            ImageAsset::select(file).unwrap_err(),
            ValidationError::UnsupportedType("text/plain".to_string())
        );
    }

    #[test]
    fn gif_is_rejected_even_when_declared_as_png() {
        let file = SelectedFile::new(
            None,
            Some("image/png".to_string()),
            Bytes::from_static(b"GIF89a\x01\x00\x01\x00"),
        );
        assert_eq!(
            ImageAsset::select(file).unwrap_err(),
            ValidationError::UnsupportedType("gif".to_string())
        );
    }
}
