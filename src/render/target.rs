use std::convert::Infallible;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::path::split_fragment;
use crate::spine::Spine;

/// What to display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayRequest {
    /// A spine position.
    Index(usize),
    /// An archive path, optionally with `#fragment` (as found in navigation).
    Href(String),
    /// The first linear spine item.
    #[default]
    Default,
}

impl From<usize> for DisplayRequest {
    fn from(index: usize) -> Self {
        DisplayRequest::Index(index)
    }
}

impl From<&str> for DisplayRequest {
    fn from(href: &str) -> Self {
        DisplayRequest::Href(href.to_string())
    }
}

impl From<String> for DisplayRequest {
    fn from(href: String) -> Self {
        DisplayRequest::Href(href)
    }
}

impl FromStr for DisplayRequest {
    type Err = Infallible;

    /// `"default"` or an empty string selects the first linear item, a
    /// decimal number selects a spine index, anything else is an href.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(DisplayRequest::Default);
        }
        Ok(match s.parse::<usize>() {
            Ok(index) => DisplayRequest::Index(index),
            Err(_) => DisplayRequest::Href(s.to_string()),
        })
    }
}

/// How a [`DisplayTarget`] was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Index,
    Href,
    Default,
}

/// A request resolved to content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTarget {
    pub kind: TargetKind,
    /// Archive path of the chapter, without fragment.
    pub href: String,
    pub fragment: Option<String>,
    /// Spine position, when the chapter is in the spine.
    pub spine_index: Option<usize>,
}

/// Resolve a request against the spine.
///
/// Returns `Ok(None)` for an href request with an empty path (a fragment-only
/// link), which displays nothing and changes nothing.
pub fn resolve_target(spine: &Spine, request: &DisplayRequest) -> Result<Option<DisplayTarget>> {
    match request {
        DisplayRequest::Index(index) => {
            let href = spine
                .get(*index)
                .and_then(|item| item.href.clone())
                .ok_or_else(|| Error::InvalidTarget(format!("invalid spine index: {index}")))?;
            Ok(Some(DisplayTarget {
                kind: TargetKind::Index,
                href,
                fragment: None,
                spine_index: Some(*index),
            }))
        }
        DisplayRequest::Href(raw) => {
            let (path, fragment) = split_fragment(raw);
            if path.trim().is_empty() {
                return Ok(None);
            }
            Ok(Some(DisplayTarget {
                kind: TargetKind::Href,
                href: path.to_string(),
                fragment: fragment.map(str::to_string),
                spine_index: spine.index_of_href(path),
            }))
        }
        DisplayRequest::Default => {
            let index = spine
                .first_linear_index()
                .ok_or_else(|| Error::InvalidTarget("spine is empty".into()))?;
            let href = spine
                .get(index)
                .and_then(|item| item.href.clone())
                .ok_or_else(|| Error::InvalidTarget("no target href to display".into()))?;
            Ok(Some(DisplayTarget {
                kind: TargetKind::Default,
                href,
                fragment: None,
                spine_index: Some(index),
            }))
        }
    }
}
