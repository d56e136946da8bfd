//! Error types for imagelens.
//!
//! Mandatory headers fail with an [`ImageError`]. Absent optional tables and
//! unrecognized numeric codes are modelled as values (`None`, `Unknown(code)`)
//! and never reach this type.

use thiserror::Error;
use tracing::warn;

/// Main error type for image introspection.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The magic prefix matches none of PE, ELF or Mach-O
    #[error("Unrecognized image format")]
    UnrecognizedFormat,

    /// A recognized format failed a secondary header invariant
    #[error("Malformed {format} header: {message}")]
    MalformedHeader {
        format: &'static str,
        message: String,
    },

    /// The memory provider could not satisfy a read
    #[error("Unreadable region at {address:#x} ({length} bytes)")]
    UnreadableRegion { address: u64, length: u64 },

    /// A view was asked for a field its descriptor does not define, or for a
    /// field of the wrong shape
    #[error("Field {field} not available on {structure}")]
    UnknownField {
        structure: &'static str,
        field: String,
    },

    /// Options could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    pub(crate) fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn unreadable(address: u64, length: u64) -> Self {
        Self::UnreadableRegion { address, length }
    }

    /// True when the failure came from the memory provider rather than from
    /// the image contents.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::UnreadableRegion { .. })
    }
}

/// Result type alias for imagelens operations
pub type Result<T> = std::result::Result<T, ImageError>;

/// Converts the failure of an auxiliary table into "table absent".
///
/// The cause is logged so a damaged directory stays visible without
/// preventing the rest of the image from being read.
pub(crate) fn degrade<T>(table: &'static str, result: Result<Option<T>>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(table, error = %err, "auxiliary table unavailable");
            None
        }
    }
}
