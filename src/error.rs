//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting or printing a document subtree
#[derive(Error, Debug)]
pub enum Error {
    /// The designated source element does not exist in the document
    #[error("Element with id \"{0}\" not found")]
    NotFound(String),

    /// A computed property could not be resolved. Recovered per property
    /// during flattening; never returned by the entry points.
    #[error("Unsupported style for `{property}`: {reason}")]
    UnsupportedStyle { property: String, reason: String },

    /// The rasterizer could not produce a pixel buffer
    #[error("Rasterization failed: {0}")]
    RasterizationFailure(String),

    /// The print browsing context could not be opened
    #[error("Print window could not be opened (popup blocked)")]
    PopupBlocked,

    /// The PDF could not be assembled from the page images
    #[error("PDF assembly failed: {0}")]
    AssemblyFailure(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Source and clone subtrees are not structurally identical
    #[error("Source and clone trees differ: {0}")]
    TreeMismatch(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O error while persisting or spooling output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::AssemblyFailure(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::AssemblyFailure(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
