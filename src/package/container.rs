use quick_xml::Reader;
use quick_xml::events::Event;

use super::{find_attr, local_name};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};

/// Fixed location of the container document inside an EPUB.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// Parse `META-INF/container.xml` and return the package document path.
///
/// A `rootfile` with the OEBPS package media type wins; otherwise the first
/// `rootfile` is used.
pub fn parse_container(bytes: &[u8]) -> Result<String> {
    let content = decode_text(bytes, extract_xml_encoding(bytes));
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    // (full-path, media-type) per rootfile, in document order.
    let mut rootfiles: Vec<(Option<String>, Option<String>)> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                rootfiles.push((
                    find_attr(e.attributes(), b"full-path"),
                    find_attr(e.attributes(), b"media-type"),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let chosen = rootfiles
        .iter()
        .find(|(_, media_type)| media_type.as_deref() == Some(PACKAGE_MEDIA_TYPE))
        .or_else(|| rootfiles.first())
        .ok_or_else(|| Error::Parse("no <rootfile> found in container.xml".into()))?;

    match &chosen.0 {
        Some(path) if !path.is_empty() => Ok(path.clone()),
        _ => Err(Error::Parse(
            "missing full-path attribute in container.xml rootfile".into(),
        )),
    }
}
