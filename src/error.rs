//! Error types for the coloring book client

use thiserror::Error;

/// Result type alias for colorbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the AI service or exporting a book
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration (API key, base URL, ...)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Transport-level failure reaching the AI service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The AI service answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The AI service answered, but not in the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Image generation succeeded at the HTTP level but carried no image
    #[error("No image returned by the image service")]
    NoImage,

    /// Failed to build the PDF document
    #[error("Export failed: {0}")]
    Export(String),

    /// I/O error (writing the exported book, reading stdin)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidResponse(err.to_string())
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Export(format!("image decode failed: {}", err))
    }
}
