//! Chapter markup scanning.
//!
//! Chapters are XHTML in theory and tag soup in practice, so the scan runs
//! quick-xml with end-name checks off and records byte spans instead of
//! building a tree. The spans are later used to splice rewritten references
//! into the body markup.

use std::ops::Range;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::package::{local_name, resolve_entity, unescape};

/// An attribute value found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRef {
    /// Byte span of the raw value (inside the quotes, if any).
    pub span: Range<usize>,
    /// The value with entity references resolved.
    pub value: String,
}

/// What a display cycle needs to know about a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterMarkup {
    /// Byte span of the body content.
    pub body: Range<usize>,
    /// `img[src]`, `image[href]` and `image[xlink:href]` values inside the body.
    pub images: Vec<AttrRef>,
    /// `href`s of `<link rel="stylesheet">` elements, in document order.
    pub stylesheet_links: Vec<String>,
    /// Text of CSS `<style>` blocks, in document order.
    pub inline_styles: Vec<String>,
    /// Spans of whole CSS `<style>` elements inside the body. Their text is
    /// also in `inline_styles`.
    pub body_styles: Vec<Range<usize>>,
}

struct StyleBlock {
    start: usize,
    is_css: bool,
    text: String,
}

impl ChapterMarkup {
    /// Scan `source`.
    ///
    /// Never fails: a document without `<body>` is all body, and a document
    /// the reader gives up on has its body run to the end.
    pub fn scan(source: &str) -> Self {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;

        let mut markup = ChapterMarkup::default();
        let mut body_start: Option<usize> = None;
        let mut body_end: Option<usize> = None;
        let mut style: Option<StyleBlock> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    log::debug!("[Markup] scan stopped at byte {}: {e}", reader.error_position());
                    break;
                }
            };
            let end = offset(&reader, source);

            match &event {
                Event::Start(e) | Event::Empty(e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let start = start_tag_offset(source, end, e.len(), is_empty);
                    let name = e.name();
                    let local = local_name(name.as_ref()).to_ascii_lowercase();
                    let tag = &source[start..end];

                    match local.as_slice() {
                        b"body" if body_start.is_none() => {
                            body_start = Some(end);
                            if is_empty {
                                body_end = Some(end);
                            }
                        }
                        b"img" => markup.push_attr(tag, start, b"src"),
                        b"image" => {
                            markup.push_attr(tag, start, b"href");
                            markup.push_attr(tag, start, b"xlink:href");
                        }
                        b"link" => {
                            let attrs = tag_attributes(tag);
                            let is_stylesheet = attr_value(tag, &attrs, b"rel").is_some_and(|rel| {
                                rel.split_ascii_whitespace()
                                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                            });
                            if is_stylesheet
                                && let Some(href) = attr_value(tag, &attrs, b"href")
                            {
                                markup.stylesheet_links.push(href.trim().to_string());
                            }
                        }
                        b"style" if !is_empty => {
                            let attrs = tag_attributes(tag);
                            let is_css = attr_value(tag, &attrs, b"type").is_none_or(|t| {
                                let t = t.trim();
                                t.is_empty() || t.eq_ignore_ascii_case("text/css")
                            });
                            style = Some(StyleBlock {
                                start,
                                is_css,
                                text: String::new(),
                            });
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if let Some(block) = style.as_mut() {
                        block.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::CData(e) => {
                    if let Some(block) = style.as_mut() {
                        block.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::GeneralRef(e) => {
                    if let Some(block) = style.as_mut() {
                        let entity = String::from_utf8_lossy(e.as_ref());
                        match resolve_entity(&entity) {
                            Some(resolved) => block.text.push_str(&resolved),
                            None => {
                                block.text.push('&');
                                block.text.push_str(&entity);
                                block.text.push(';');
                            }
                        }
                    }
                }
                Event::End(e) => {
                    let name = e.name();
                    match local_name(name.as_ref()).to_ascii_lowercase().as_slice() {
                        b"body" if body_start.is_some() && body_end.is_none() => {
                            body_end = Some(source[..end].rfind('<').unwrap_or(end));
                        }
                        b"style" => {
                            if let Some(block) = style.take()
                                && block.is_css
                            {
                                markup.body_styles.push(block.start..end);
                                if !block.text.trim().is_empty() {
                                    markup.inline_styles.push(block.text);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        markup.body = match (body_start, body_end) {
            (Some(start), Some(end)) if end >= start => start..end,
            (Some(start), _) => start..source.len(),
            (None, _) => 0..source.len(),
        };

        let body = markup.body.clone();
        markup
            .images
            .retain(|image| image.span.start >= body.start && image.span.end <= body.end);
        markup
            .body_styles
            .retain(|span| span.start >= body.start && span.end <= body.end);

        markup
    }

    /// The body content of `source`.
    pub fn body_text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.body.clone()).unwrap_or("")
    }

    fn push_attr(&mut self, tag: &str, tag_offset: usize, key: &[u8]) {
        for attr in tag_attributes(tag) {
            if attr.name_matches(tag, key)
                && let Some(value) = attr.value.clone()
            {
                self.images.push(AttrRef {
                    span: tag_offset + value.start..tag_offset + value.end,
                    value: unescape(&tag[value]).into_owned(),
                });
            }
        }
    }
}

/// An element of a scanned document that carries an `id` or `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    /// Lowercased local tag name.
    pub tag: String,
    /// Byte offset of the start tag.
    pub offset: usize,
}

/// Find the first element whose `id` is `name`, else the first whose `name`
/// attribute is `name`.
pub fn find_element_by_id_or_name(source: &str, name: &str) -> Option<ElementRef> {
    let mut reader = Reader::from_str(source);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut by_name: Option<ElementRef> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(_) => break,
        };
        let end = offset(&reader, source);

        match &event {
            Event::Start(e) | Event::Empty(e) => {
                let start = start_tag_offset(source, end, e.len(), matches!(event, Event::Empty(_)));
                let tag = &source[start..end];
                let attrs = tag_attributes(tag);
                let element = || ElementRef {
                    tag: String::from_utf8_lossy(local_name(e.name().as_ref())).to_ascii_lowercase(),
                    offset: start,
                };
                if attr_value(tag, &attrs, b"id").as_deref() == Some(name) {
                    return Some(element());
                }
                if by_name.is_none() && attr_value(tag, &attrs, b"name").as_deref() == Some(name) {
                    by_name = Some(element());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    by_name
}

/// Position just past the last event.
fn offset(reader: &Reader<&[u8]>, source: &str) -> usize {
    usize::try_from(reader.buffer_position())
        .unwrap_or(usize::MAX)
        .min(source.len())
}

/// Offset of the `<` opening a start tag that ends at `end`.
///
/// `content_len` is the length of the tag content between `<` and `>` (or
/// `/>` for an empty element).
fn start_tag_offset(source: &str, end: usize, content_len: usize, is_empty: bool) -> usize {
    let delimiters = if is_empty { 3 } else { 2 };
    end.checked_sub(content_len + delimiters)
        .filter(|&start| source.as_bytes().get(start) == Some(&b'<'))
        .or_else(|| source[..end].rfind('<'))
        .unwrap_or(0)
}

/// An attribute of a raw start tag; ranges are relative to the tag text.
#[derive(Debug, Clone)]
struct RawAttr {
    name: Range<usize>,
    value: Option<Range<usize>>,
}

impl RawAttr {
    fn name_matches(&self, tag: &str, key: &[u8]) -> bool {
        tag.as_bytes()[self.name.clone()].eq_ignore_ascii_case(key)
    }
}

/// Split a raw start tag (`<img src=a.png alt="x"/>`) into attributes.
///
/// Accepts double-quoted, single-quoted, unquoted and valueless attributes.
fn tag_attributes(tag: &str) -> Vec<RawAttr> {
    let bytes = tag.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    // Skip "<name".
    if bytes.first() == Some(&b'<') {
        i = 1;
    }
    while i < bytes.len() && !is_tag_space(bytes[i]) && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }

    loop {
        while i < bytes.len() && (is_tag_space(bytes[i]) || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' {
            break;
        }

        let name_start = i;
        while i < bytes.len()
            && !is_tag_space(bytes[i])
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = name_start..i;

        let mut j = i;
        while j < bytes.len() && is_tag_space(bytes[j]) {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            attrs.push(RawAttr { name, value: None });
            continue;
        }
        j += 1;
        while j < bytes.len() && is_tag_space(bytes[j]) {
            j += 1;
        }

        let value = match bytes.get(j) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = j + 1;
                let value_end = memchr::memchr(quote, &bytes[value_start..])
                    .map_or(bytes.len(), |p| value_start + p);
                i = (value_end + 1).min(bytes.len());
                value_start..value_end
            }
            _ => {
                let value_start = j;
                let mut k = j;
                while k < bytes.len() && !is_tag_space(bytes[k]) && bytes[k] != b'>' {
                    k += 1;
                }
                // "a.png/>" : the slash belongs to the tag end.
                let value_end = if k > value_start && bytes[k - 1] == b'/' && k < bytes.len() {
                    k - 1
                } else {
                    k
                };
                i = k;
                value_start..value_end
            }
        };
        attrs.push(RawAttr {
            name,
            value: Some(value),
        });
    }

    attrs
}

fn attr_value(tag: &str, attrs: &[RawAttr], key: &[u8]) -> Option<String> {
    attrs
        .iter()
        .find(|attr| attr.name_matches(tag, key))
        .map(|attr| match &attr.value {
            Some(range) => unescape(&tag[range.clone()]).into_owned(),
            None => String::new(),
        })
}

fn is_tag_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}
