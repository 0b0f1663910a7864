use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Processing backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("Unsupported input: {0}")]
    UnsupportedFormat(String),

    #[error("Legacy .doc format must be converted to .docx before extraction: {}", .0.display())]
    LegacyWordFormat(PathBuf),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn backend_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        ExtractError::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
