//! Error types for pdfmodel.

use std::io;
use thiserror::Error;

/// Result type alias for pdfmodel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole conversion.
///
/// A failing conversion never yields a partial document; the error carries a
/// human-readable cause instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The PDF engine could not parse the input, or a page or resource is unreadable.
    #[error("Cannot read source PDF: {0}")]
    SourceRead(String),

    /// The PDF engine could not build a page or stream, or the output sink failed.
    #[error("Cannot write target PDF: {0}")]
    TargetWrite(String),

    /// The document model violates an invariant.
    #[error("Invalid document model: {0}")]
    InvalidModel(String),

    /// The document model could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::SourceRead(err.to_string()),
        }
    }
}

/// Failure to turn a color value into RGB.
///
/// Always recovered by falling back to black.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorConversionError {
    #[error("color space {0} has no RGB transform")]
    Unsupported(String),

    #[error("expected {expected} color components, got {actual}")]
    ComponentCount { expected: usize, actual: usize },

    #[error("palette index {0} is outside the lookup table")]
    PaletteIndex(usize),
}

/// Failure to decode or embed one raster image.
///
/// Always recovered by dropping that image from its page.
#[derive(Error, Debug)]
pub enum ImageDecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unsupported image encoding: {0}")]
    Unsupported(String),

    #[error("malformed image stream: {0}")]
    Malformed(String),

    #[error("raster codec error: {0}")]
    Codec(#[from] image::ImageError),
}
