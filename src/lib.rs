//! # quire
//!
//! Display EPUB chapters one at a time.
//!
//! ## Features
//!
//! - Random-access reads from ZIP archives (stored and deflate entries)
//! - Container, OPF, EPUB 3 navigation and NCX parsing
//! - Spine traversal that skips non-linear entries
//! - Chapter display with images and stylesheet `url()`s rewritten to
//!   resource handles, materialized concurrently
//! - Handles scoped to one display cycle and released before the next
//!
//! ## Quick Start
//!
//! ```no_run
//! use quire::{Book, HtmlSink, RenditionOptions};
//!
//! # async fn run() -> quire::Result<()> {
//! let book = Book::open("input.epub").await?;
//! println!("{:?}", book.metadata().title);
//!
//! let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());
//! rendition.display("OEBPS/chap2.xhtml#section3").await.into_result()?;
//! rendition.next().await.into_result()?;
//!
//! println!("{}", rendition.sink().to_html());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom surfaces
//!
//! Anything implementing [`DocumentSink`] can receive chapters, and any
//! [`Materializer`] can back the resource handles:
//!
//! ```
//! use std::sync::Arc;
//! use quire::{BlobStore, HtmlSink, MemoryStore, Rendition, RenditionOptions, Spine};
//!
//! let blobs = Arc::new(BlobStore::new());
//! let rendition = Rendition::with_materializer(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(Spine::default()),
//!     HtmlSink::new(),
//!     RenditionOptions::new().scroll_to_top_on_chapter_change(false),
//!     blobs.clone(),
//! );
//! assert_eq!(rendition.lifecycle().live_count(), 0);
//! ```

pub mod archive;
pub mod book;
pub mod diagnostics;
pub mod error;
pub mod package;
pub mod path;
pub mod render;
pub mod spine;
pub(crate) mod util;

pub use archive::{ArchiveStore, MemoryStore, ZipStore};
pub use book::Book;
pub use diagnostics::Diagnostic;
pub use error::{Error, Result};
pub use package::{Metadata, NavNode};
pub use render::{
    BlobStore, DisplayOutcome, DisplayReport, DisplayRequest, DocumentSink, HtmlSink,
    Materializer, Rendition, RenditionOptions, ResourceHandle, ResourceLifecycle,
    ScrollBehavior, ScrollOptions,
};
pub use spine::{Spine, SpineItem};
