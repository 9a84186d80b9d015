//! Error types for journal loading, assembly and PDF output.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while turning journal exports into a PDF.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is JSON but not a journal export.
    #[error("Invalid journal export: {0}")]
    Parse(String),

    #[error("Manifest lists no readable journals: {}", .0.display())]
    ManifestEmpty(PathBuf),

    #[error("Nothing selected to export")]
    EmptySelection,

    /// Soft failure. The image renders as a placeholder.
    #[error("Image asset not found: {0}")]
    AssetUnresolved(String),

    /// Soft failure. The markup is left as-is.
    #[error("Could not normalize inline markup: {0}")]
    NormalizationFallback(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("A build is already running")]
    BuildInProgress,
}

pub type Result<T> = std::result::Result<T, Error>;
