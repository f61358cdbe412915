//! EPUB fixtures built in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const XHTML: &str = "application/xhtml+xml";

/// A 1x1 PNG.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89,
];

pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

struct Item {
    id: String,
    href: String,
    media_type: String,
    properties: Option<String>,
}

/// Builds a minimal EPUB with its package document at `OEBPS/content.opf`.
///
/// Paths passed to the builder are relative to `OEBPS/`.
pub struct EpubBuilder {
    title: String,
    author: Option<String>,
    items: Vec<Item>,
    spine: Vec<(String, bool)>,
    toc: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            author: None,
            items: Vec::new(),
            spine: Vec::new(),
            toc: None,
            files: Vec::new(),
        }
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// A linear content document.
    pub fn chapter(self, id: &str, href: &str, xhtml: &str) -> Self {
        self.spine_item(id, href, xhtml, true)
    }

    /// A non-linear content document.
    pub fn aside(self, id: &str, href: &str, xhtml: &str) -> Self {
        self.spine_item(id, href, xhtml, false)
    }

    /// A manifest item that is not in the spine.
    pub fn item(
        mut self,
        id: &str,
        href: &str,
        media_type: &str,
        properties: Option<&str>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.items.push(Item {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: properties.map(str::to_string),
        });
        self.files.push((href.to_string(), data.into()));
        self
    }

    /// A file the manifest does not mention.
    pub fn file(mut self, href: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.push((href.to_string(), data.into()));
        self
    }

    /// A spine reference to an id that may not exist.
    pub fn itemref(mut self, idref: &str) -> Self {
        self.spine.push((idref.to_string(), true));
        self
    }

    pub fn nav(self, xhtml: &str) -> Self {
        self.item("nav", "nav.xhtml", XHTML, Some("nav"), xhtml)
    }

    pub fn ncx(mut self, ncx: &str) -> Self {
        self.toc = Some("ncx".into());
        self.item("ncx", "toc.ncx", "application/x-dtbncx+xml", None, ncx)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        zip.start_file("META-INF/container.xml", deflated).unwrap();
        zip.write_all(CONTAINER_XML.as_bytes()).unwrap();

        zip.start_file("OEBPS/content.opf", deflated).unwrap();
        zip.write_all(self.opf().as_bytes()).unwrap();

        for (href, data) in &self.files {
            zip.start_file(format!("OEBPS/{href}"), deflated).unwrap();
            zip.write_all(data).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    fn spine_item(mut self, id: &str, href: &str, xhtml: &str, linear: bool) -> Self {
        self.spine.push((id.to_string(), linear));
        self.item(id, href, XHTML, None, xhtml)
    }

    fn opf(&self) -> String {
        let mut opf = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:quire-fixture</dc:identifier>
"#,
        );
        opf.push_str(&format!("    <dc:title>{}</dc:title>\n", self.title));
        if let Some(author) = &self.author {
            opf.push_str(&format!("    <dc:creator>{author}</dc:creator>\n"));
        }
        opf.push_str("    <dc:language>en</dc:language>\n  </metadata>\n  <manifest>\n");
        for item in &self.items {
            let properties = item
                .properties
                .as_ref()
                .map(|p| format!(r#" properties="{p}""#))
                .unwrap_or_default();
            opf.push_str(&format!(
                r#"    <item id="{}" href="{}" media-type="{}"{properties}/>"#,
                item.id, item.href, item.media_type
            ));
            opf.push('\n');
        }
        opf.push_str("  </manifest>\n");
        match &self.toc {
            Some(toc) => opf.push_str(&format!("  <spine toc=\"{toc}\">\n")),
            None => opf.push_str("  <spine>\n"),
        }
        for (idref, linear) in &self.spine {
            let linear = if *linear { "" } else { r#" linear="no""# };
            opf.push_str(&format!("    <itemref idref=\"{idref}\"{linear}/>\n"));
        }
        opf.push_str("  </spine>\n</package>\n");
        opf
    }
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

pub const NAV_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body>
  <nav epub:type="landmarks"><ol><li><a href="chap2.xhtml">Start</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="chap1.xhtml">Chapter One</a>
        <ol><li><a href="chap1.xhtml#s1">Section 1.1</a></li></ol>
      </li>
      <li><span>Untitled part</span></li>
      <li><a href="chap2.xhtml#section3"> Chapter Two </a></li>
    </ol>
  </nav>
</body>
</html>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head/>
  <docTitle><text>Fixture</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="chap1.xhtml"/>
      <navPoint id="np2" playOrder="2">
        <navLabel><text>Section 1.1</text></navLabel>
        <content src="chap1.xhtml#s1"/>
      </navPoint>
    </navPoint>
    <navPoint id="np3" playOrder="3">
      <navLabel><text>Chapter Two</text></navLabel>
      <content src="chap2.xhtml#section3"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const CHAP1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>One</title>
  <link rel="stylesheet" type="text/css" href="css/style.css"/>
  <style>h1 { border-image: url(images/a.png) 30; }</style>
</head>
<body>
  <h1 id="s1">Chapter One</h1>
  <img src="images/a.png" alt="a"/>
  <img src="images/missing.png" alt="missing"/>
  <img src="images/c.jpg" alt="c"/>
  <img src="https://example.com/remote.png" alt="remote"/>
</body>
</html>"#;

pub const CHAP2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Two</title></head>
<body>
  <h1>Chapter Two</h1>
  <p>Opening.</p>
  <h2 id="section3">Section Three</h2>
  <p>Body.</p>
</body>
</html>"#;

pub const NOTES: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>Notes</p></body></html>"#;

pub const STYLE_CSS: &str = "body { background: url(images/bg.png) no-repeat; }\n\
     @font-face { font-family: Body; src: url(\"../fonts/body.otf\"); }\n";

/// Three-chapter book: chap1 (linear, assets), notes (non-linear), chap2.
pub fn sample_book() -> EpubBuilder {
    EpubBuilder::new("Fixture Book")
        .author("Jane Doe")
        .chapter("chap1", "chap1.xhtml", CHAP1)
        .aside("notes", "notes.xhtml", NOTES)
        .chapter("chap2", "chap2.xhtml", CHAP2)
        .nav(NAV_XHTML)
        .item("css", "css/style.css", "text/css", None, STYLE_CSS)
        .item("bg", "css/images/bg.png", "image/png", None, PNG)
        .item("a", "images/a.png", "image/png", None, PNG)
        .item("c", "images/c.jpg", "image/jpeg", None, JPEG)
        .item("font", "fonts/body.otf", "font/otf", None, b"OTTO".to_vec())
}
