//! Structured warnings.
//!
//! Malformed packages and unreadable assets rarely stop a book from being
//! read. Those conditions are collected as [`Diagnostic`] values next to the
//! thing they concern (the spine, the book, the last display cycle) and are
//! also sent to the `log` facade as they happen.

use std::fmt;

/// A recoverable problem found while opening a book or displaying a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Diagnostic {
    /// A spine `itemref` names an id the manifest does not declare.
    MissingManifestItem { index: usize, idref: String },
    /// The navigation document could not be read or parsed.
    NavigationUnavailable { reason: String },
    /// A linked stylesheet could not be read; the chapter displays without it.
    StylesheetUnavailable { path: String, reason: String },
    /// An asset could not be materialized; its reference was left as written.
    AssetUnavailable {
        reference: String,
        path: String,
        reason: String,
    },
}

impl Diagnostic {
    /// Emit this diagnostic through `log::warn!` with a component prefix.
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::MissingManifestItem { .. } => log::warn!("[Spine] {self}"),
            Diagnostic::NavigationUnavailable { .. } => log::warn!("[Book] {self}"),
            Diagnostic::StylesheetUnavailable { .. } | Diagnostic::AssetUnavailable { .. } => {
                log::warn!("[Rendition] {self}")
            }
        }
    }

    /// Log and return `self`, for pushing straight into a collection.
    pub(crate) fn logged(self) -> Self {
        self.log();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingManifestItem { index, idref } => {
                write!(f, "spine item {index} references missing manifest id '{idref}'")
            }
            Diagnostic::NavigationUnavailable { reason } => {
                write!(f, "navigation unavailable: {reason}")
            }
            Diagnostic::StylesheetUnavailable { path, reason } => {
                write!(f, "stylesheet {path} unavailable: {reason}")
            }
            Diagnostic::AssetUnavailable {
                reference,
                path,
                reason,
            } => write!(f, "asset '{reference}' ({path}) unavailable: {reason}"),
        }
    }
}
