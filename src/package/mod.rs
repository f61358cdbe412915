//! Package metadata parsers.
//!
//! - [`parse_container`]: `META-INF/container.xml` to the package document path
//! - [`parse_opf`]: the package document (metadata, manifest, spine)
//! - [`parse_nav`]: the EPUB 3 navigation document
//! - [`parse_ncx`]: the EPUB 2 NCX, used when there is no navigation document

mod container;
mod nav;
mod ncx;
mod opf;

use std::borrow::Cow;

use quick_xml::events::attributes::Attributes;

pub use container::{CONTAINER_PATH, parse_container};
pub use nav::{NavNode, parse_nav};
pub use ncx::parse_ncx;
pub use opf::{Manifest, ManifestItem, Metadata, Package, SpineRef, parse_opf};

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the attribute named exactly `key`, entity references resolved.
pub(crate) fn find_attr(attributes: Attributes<'_>, key: &[u8]) -> Option<String> {
    attributes
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape(&String::from_utf8_lossy(&attr.value)).into_owned())
}

/// Resolve XML entity references.
pub(crate) fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// Replace `&name;` references in `raw`; unknown ones are kept as written.
pub(crate) fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        match tail.find(';') {
            Some(semi) if semi > 0 => match resolve_entity(&tail[..semi]) {
                Some(resolved) => {
                    out.push_str(&resolved);
                    rest = &tail[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = tail;
                }
            },
            _ => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
