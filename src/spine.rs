//! The reading order.
//!
//! A [`Spine`] is built once per opened book from the package's `itemref`
//! list and never changes afterwards. Traversal helpers skip non-linear
//! entries and entries whose manifest item is missing.

use crate::diagnostics::Diagnostic;
use crate::package::{Manifest, SpineRef};
use crate::path::{Fragment, resolve_href};

/// An entry in the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct SpineItem {
    /// Position in the spine.
    pub index: usize,
    pub idref: String,
    /// Resolved archive path; `None` when the manifest lacks `idref`.
    pub href: Option<String>,
    pub linear: bool,
    pub media_type: String,
    pub properties: String,
}

impl SpineItem {
    /// Linear and backed by a manifest item.
    pub fn is_navigable(&self) -> bool {
        self.linear && self.href.is_some()
    }
}

/// Ordered, indexed reading sequence.
#[derive(Debug, Clone, Default)]
pub struct Spine {
    items: Vec<SpineItem>,
    diagnostics: Vec<Diagnostic>,
}

impl Spine {
    /// Build the spine. Hrefs are resolved against `base_dir`, the directory
    /// of the package document.
    pub fn new(base_dir: &str, refs: &[SpineRef], manifest: &Manifest) -> Self {
        let mut diagnostics = Vec::new();

        let items = refs
            .iter()
            .enumerate()
            .map(|(index, spine_ref)| match manifest.get(&spine_ref.idref) {
                Some(item) => SpineItem {
                    index,
                    idref: spine_ref.idref.clone(),
                    href: Some(resolve_href(base_dir, &item.href, Fragment::Drop)),
                    linear: spine_ref.linear,
                    media_type: item.media_type.clone(),
                    properties: item.properties.clone(),
                },
                None => {
                    diagnostics.push(
                        Diagnostic::MissingManifestItem {
                            index,
                            idref: spine_ref.idref.clone(),
                        }
                        .logged(),
                    );
                    SpineItem {
                        index,
                        idref: spine_ref.idref.clone(),
                        href: None,
                        linear: spine_ref.linear,
                        media_type: String::new(),
                        properties: String::new(),
                    }
                }
            })
            .collect();

        Self { items, diagnostics }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SpineItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[SpineItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpineItem> {
        self.items.iter()
    }

    /// Problems found while building the spine.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// First linear entry with an href.
    ///
    /// Falls back to `Some(0)` for a spine without one, and `None` only for an
    /// empty spine.
    pub fn first_linear_index(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        Some(
            self.items
                .iter()
                .position(SpineItem::is_navigable)
                .unwrap_or(0),
        )
    }

    /// Next linear entry after `index`, or `index` itself at the end.
    pub fn next_linear_index(&self, index: usize) -> usize {
        self.items
            .iter()
            .skip(index.saturating_add(1))
            .find(|item| item.is_navigable())
            .map_or(index, |item| item.index)
    }

    /// Previous linear entry before `index`, or `index` itself at the start.
    pub fn prev_linear_index(&self, index: usize) -> usize {
        self.items
            .iter()
            .take(index.min(self.items.len()))
            .rev()
            .find(|item| item.is_navigable())
            .map_or(index, |item| item.index)
    }

    /// Index of the entry whose href equals `path` exactly.
    pub fn index_of_href(&self, path: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.href.as_deref() == Some(path))
    }
}

impl<'a> IntoIterator for &'a Spine {
    type Item = &'a SpineItem;
    type IntoIter = std::slice::Iter<'a, SpineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
