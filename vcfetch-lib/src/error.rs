//! Error types for vcfetch

use thiserror::Error;

/// vcfetch result type
pub type Result<T> = std::result::Result<T, VcFetchError>;

/// Main error type for vcfetch operations
#[derive(Error, Debug)]
pub enum VcFetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool provisioning failed: {0}")]
    ToolProvisioning(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },

    #[error("Extraction failed: {tool} (exit code {code:?}): {detail}")]
    Extraction {
        tool: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("Expansion failed: {tool} (exit code {code:?}): {detail}")]
    Expansion {
        tool: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
