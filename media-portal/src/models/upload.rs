use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media the upload widget accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
}

impl FileType {
    /// Value for the file picker's `accept` attribute.
    pub fn accept(&self) -> &'static str {
        match self {
            FileType::Image => "image/*",
            FileType::Video => "video/*",
        }
    }
}

/// A file picked by the user, held in memory until the upload resolves.
#[derive(Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Short-lived signature/token pair authorizing one direct-to-CDN upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCredentials {
    pub signature: String,
    /// Unix timestamp (seconds) after which the signature is rejected.
    pub expire: i64,
    pub token: String,
}

/// Response body of a successful CDN upload.
///
/// The well-known fields are typed; everything else the CDN returns is kept
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
