use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Media type of every image submitted for classification.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// Image bytes ready to be submitted as the `image` multipart part.
///
/// Consumed by exactly one transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    file_name: String,
    media_type: &'static str,
}

impl ImagePayload {
    pub fn jpeg(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            media_type: JPEG_MEDIA_TYPE,
        }
    }

    /// Read an image file from disk, naming the part after the file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image file {:?}", path))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        Ok(Self::jpeg(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<u8>, String, &'static str) {
        (self.bytes, self.file_name, self.media_type)
    }
}

/// Body returned by the `predict` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub data: Option<ScanResult>,
}

/// Classification of a sidewalk photo. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ScanResponse {
    pub fn label(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.label.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.description.as_deref())
    }
}
