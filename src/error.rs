use std::path::PathBuf;
use thiserror::Error;

/// The main error type for yolobox operations.
#[derive(Debug, Error)]
pub enum YoloboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to read image dimensions from {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Unsupported image file: {0}")]
    UnsupportedImage(String),

    #[error("Failed to parse JSON from {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON to {path}: {source}")]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YOLO label line {line:?}: {message}")]
    YoloLineParse { line: String, message: String },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to walk export tree {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("Label registry {path} is locked by another writer")]
    RegistryLocked { path: PathBuf },
}

impl YoloboxError {
    pub(crate) fn image_not_found(id: impl Into<String>) -> Self {
        YoloboxError::NotFound {
            what: "image",
            id: id.into(),
        }
    }

    /// Returns true for errors caused by the caller's input rather than by
    /// the workspace or the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            YoloboxError::NotFound { .. }
                | YoloboxError::Validation(_)
                | YoloboxError::UnsupportedImage(_)
        )
    }
}
