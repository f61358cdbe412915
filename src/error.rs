//! Error types for quire operations.

use thiserror::Error;

/// Errors that can occur while opening a book or displaying a chapter.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A path requested from the archive does not exist.
    #[error("not found in archive: {0}")]
    NotFound(String),

    /// Malformed container, package or navigation markup.
    #[error("parse error: {0}")]
    Parse(String),

    /// A navigation request resolved to no usable content reference.
    #[error("invalid display target: {0}")]
    InvalidTarget(String),

    /// A single asset could not be turned into a resource handle.
    #[error("failed to materialize {path}: {reason}")]
    AssetMaterialization { path: String, reason: String },
}

impl Error {
    /// True for the error kinds raised by the package parsers.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Xml(_) | Error::Parse(_))
    }

    /// True when the archive had no entry for the requested path.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Zip(zip::result::ZipError::FileNotFound) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
