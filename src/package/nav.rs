use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{find_attr, local_name, resolve_entity};
use crate::error::{Error, Result};
use crate::path::{Fragment, resolve_href};

/// A navigation tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct NavNode {
    pub label: String,
    /// Archive path, possibly with a `#fragment`.
    pub href: String,
    pub children: Vec<NavNode>,
}

impl NavNode {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Count this node and all its descendants.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NavNode::count).sum::<usize>()
    }
}

/// Element subtree captured while scanning `<nav>` elements.
#[derive(Debug, Default)]
struct Element {
    name: Vec<u8>,
    epub_type: Option<String>,
    role: Option<String>,
    id: Option<String>,
    href: Option<String>,
    children: Vec<Child>,
}

#[derive(Debug)]
enum Child {
    Element(Element),
    Text(String),
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let name = e.name();
        let local = local_name(name.as_ref()).to_ascii_lowercase();
        let is_nav = local == b"nav";
        let is_anchor = local == b"a";
        Element {
            epub_type: is_nav.then(|| find_attr(e.attributes(), b"epub:type")).flatten(),
            role: is_nav.then(|| find_attr(e.attributes(), b"role")).flatten(),
            id: is_nav.then(|| find_attr(e.attributes(), b"id")).flatten(),
            href: is_anchor.then(|| find_attr(e.attributes(), b"href")).flatten(),
            name: local,
            children: Vec::new(),
        }
    }

    fn is(&self, name: &[u8]) -> bool {
        self.name == name
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Child::Element(el) => Some(el),
            Child::Text(_) => None,
        })
    }

    fn child(&self, name: &[u8]) -> Option<&Element> {
        self.elements().find(|el| el.is(name))
    }

    /// First descendant named `name`, in document order.
    fn descendant(&self, name: &[u8]) -> Option<&Element> {
        self.elements()
            .find_map(|el| if el.is(name) { Some(el) } else { el.descendant(name) })
    }

    fn text_content(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Child::Text(text) => out.push_str(text),
                Child::Element(el) => el.text_content(out),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(Child::Text(existing)) => existing.push_str(text),
            _ => self.children.push(Child::Text(text.to_string())),
        }
    }
}

/// Parse an EPUB 3 navigation document into its table of contents.
///
/// `base_dir` is the directory of the navigation document; hrefs are
/// resolved against it and keep their fragments. The toc `<nav>` is the first
/// with an `epub:type` containing `toc`, else the first with
/// `role="doc-toc"`, else the first with `id="toc"`. A toc nav without a list
/// yields an empty tree; a document without a toc nav is an error.
pub fn parse_nav(xhtml: &str, base_dir: &str) -> Result<Vec<NavNode>> {
    let navs = collect_navs(xhtml)?;

    let toc = navs
        .iter()
        .find(|nav| {
            nav.epub_type
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().contains("toc"))
        })
        .or_else(|| {
            navs.iter().find(|nav| {
                nav.role
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case("doc-toc"))
            })
        })
        .or_else(|| {
            navs.iter()
                .find(|nav| nav.id.as_deref().is_some_and(|id| id.eq_ignore_ascii_case("toc")))
        })
        .ok_or_else(|| Error::Parse("no <nav> with toc found in navigation document".into()))?;

    Ok(toc
        .descendant(b"ol")
        .map(|ol| extract_list(ol, base_dir))
        .unwrap_or_default())
}

/// Capture every top-level `<nav>` subtree of the document.
fn collect_navs(xhtml: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().trim_text(false);

    let mut navs = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if !stack.is_empty() || local_name(e.name().as_ref()).eq_ignore_ascii_case(b"nav") {
                    stack.push(Element::from_start(&e));
                }
            }
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Child::Element(Element::from_start(&e)));
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(current) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        current.push_text(&resolved);
                    }
                }
            }
            Event::End(_) => {
                if let Some(done) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Child::Element(done)),
                        None => navs.push(done),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(navs)
}

fn extract_list(ol: &Element, base_dir: &str) -> Vec<NavNode> {
    let mut nodes = Vec::new();
    for li in ol.elements().filter(|el| el.is(b"li")) {
        let anchor = li
            .child(b"a")
            .or_else(|| li.elements().filter(|el| el.is(b"span")).find_map(|s| s.child(b"a")))
            .or_else(|| li.descendant(b"a"));
        let Some(anchor) = anchor else {
            continue;
        };

        let mut label = String::new();
        anchor.text_content(&mut label);

        let href = resolve_href(base_dir, anchor.href.as_deref().unwrap_or(""), Fragment::Keep);
        let children = li
            .child(b"ol")
            .map(|child_ol| extract_list(child_ol, base_dir))
            .unwrap_or_default();

        nodes.push(NavNode {
            label: label.trim().to_string(),
            href,
            children,
        });
    }
    nodes
}
