use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{find_attr, local_name, resolve_entity};
use crate::error::Result;

/// Book metadata (Dublin Core subset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Metadata {
    pub title: Option<String>,
    pub language: Option<String>,
    pub creators: Vec<String>,
    pub publisher: Option<String>,
    pub identifiers: Vec<String>,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creators.push(creator.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ManifestItem {
    pub id: String,
    /// Href as written, relative to the package document.
    pub href: String,
    pub media_type: String,
    /// Space-separated property list (`nav`, `cover-image`, ...).
    pub properties: String,
}

impl ManifestItem {
    pub fn new(id: impl Into<String>, href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: String::new(),
        }
    }

    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = properties.into();
        self
    }

    /// Whether `property` appears in the property list (ASCII case-insensitive).
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .split_ascii_whitespace()
            .any(|p| p.eq_ignore_ascii_case(property))
    }
}

/// Manifest items in document order, addressable by id.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    by_id: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. A repeated id replaces the earlier item in place.
    pub fn insert(&mut self, item: ManifestItem) {
        match self.by_id.get(&item.id) {
            Some(&idx) => self.items[idx] = item,
            None => {
                self.by_id.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First item declaring `property`.
    pub fn find_by_property(&self, property: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.has_property(property))
    }
}

impl FromIterator<ManifestItem> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestItem>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for item in iter {
            manifest.insert(item);
        }
        manifest
    }
}

/// A spine `itemref`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct SpineRef {
    pub idref: String,
    /// False only for `linear="no"`.
    pub linear: bool,
}

impl SpineRef {
    pub fn new(idref: impl Into<String>, linear: bool) -> Self {
        Self {
            idref: idref.into(),
            linear,
        }
    }
}

/// Parsed package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub metadata: Metadata,
    pub manifest: Manifest,
    pub spine_refs: Vec<SpineRef>,
    /// The spine's `toc` attribute (manifest id of the NCX).
    pub toc_id: Option<String>,
}

impl Package {
    /// The EPUB 3 navigation document.
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.find_by_property("nav")
    }

    /// The NCX: the spine's `toc` item, else any item with the NCX media type.
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.toc_id
            .as_deref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| {
                self.manifest
                    .iter()
                    .find(|item| item.media_type == "application/x-dtbncx+xml")
            })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Language,
    Creator,
    Publisher,
    Identifier,
}

impl Field {
    fn from_local(local: &[u8]) -> Option<Self> {
        match local {
            b"title" => Some(Field::Title),
            b"language" => Some(Field::Language),
            b"creator" => Some(Field::Creator),
            b"publisher" => Some(Field::Publisher),
            b"identifier" => Some(Field::Identifier),
            _ => None,
        }
    }
}

/// Parse an OPF package document.
pub fn parse_opf(content: &str) -> Result<Package> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut package = Package::default();

    let mut in_metadata = false;
    let mut in_manifest = false;
    let mut in_spine = false;
    let mut field: Option<(Field, usize)> = None;
    let mut depth = 0usize;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"manifest" => in_manifest = true,
                    b"spine" => {
                        in_spine = true;
                        package.toc_id = find_attr(e.attributes(), b"toc");
                    }
                    _ if in_metadata && field.is_none() => {
                        if let Some(f) = Field::from_local(local) {
                            field = Some((f, depth));
                            text.clear();
                        }
                    }
                    _ => handle_entry(&mut package, &e, in_manifest, in_spine),
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"spine" => package.toc_id = find_attr(e.attributes(), b"toc"),
                    _ => handle_entry(&mut package, &e, in_manifest, in_spine),
                }
            }
            Event::Text(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) if field.is_some() => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                if let Some((f, field_depth)) = field
                    && field_depth == depth
                {
                    store_field(&mut package.metadata, f, text.trim());
                    field = None;
                    text.clear();
                }

                match local_name(e.name().as_ref()) {
                    b"metadata" => in_metadata = false,
                    b"manifest" => in_manifest = false,
                    b"spine" => in_spine = false,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    log::debug!(
        "[Package] {} manifest items, {} spine refs",
        package.manifest.len(),
        package.spine_refs.len()
    );

    Ok(package)
}

fn handle_entry(package: &mut Package, e: &BytesStart<'_>, in_manifest: bool, in_spine: bool) {
    let name = e.name();
    match local_name(name.as_ref()) {
        b"item" if in_manifest => {
            let Some(id) = find_attr(e.attributes(), b"id").filter(|id| !id.is_empty()) else {
                return;
            };
            package.manifest.insert(ManifestItem {
                id,
                href: find_attr(e.attributes(), b"href").unwrap_or_default(),
                media_type: find_attr(e.attributes(), b"media-type").unwrap_or_default(),
                properties: find_attr(e.attributes(), b"properties").unwrap_or_default(),
            });
        }
        b"itemref" if in_spine => {
            let Some(idref) = find_attr(e.attributes(), b"idref").filter(|id| !id.is_empty())
            else {
                return;
            };
            let linear = find_attr(e.attributes(), b"linear")
                .is_none_or(|value| !value.trim().eq_ignore_ascii_case("no"));
            package.spine_refs.push(SpineRef { idref, linear });
        }
        _ => {}
    }
}

fn store_field(metadata: &mut Metadata, field: Field, value: &str) {
    match field {
        Field::Title if metadata.title.is_none() => metadata.title = Some(value.to_string()),
        Field::Language if metadata.language.is_none() => {
            metadata.language = Some(value.to_string())
        }
        Field::Publisher if metadata.publisher.is_none() => {
            metadata.publisher = Some(value.to_string())
        }
        Field::Creator if !value.is_empty() => metadata.creators.push(value.to_string()),
        Field::Identifier if !value.is_empty() => metadata.identifiers.push(value.to_string()),
        _ => {}
    }
}
