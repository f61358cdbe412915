//! Archive access.
//!
//! The pipeline only needs one capability from a packaged document: read the
//! bytes stored at an archive path. [`ArchiveStore`] expresses that as an
//! async read so chapter fetches and asset fan-out can suspend on I/O.

mod memory;
mod source;
mod zip_store;

use std::future::Future;

pub use memory::MemoryStore;
pub use source::{ByteSource, FileSource, MemorySource, SourceCursor};
pub use zip_store::ZipStore;

use crate::error::Result;
use crate::util::{decode_text, extract_xml_encoding};

/// Read access to the files of a packaged document.
pub trait ArchiveStore: Send + Sync + 'static {
    /// Read the raw bytes at `path`.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when the archive
    /// has no such entry.
    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Whether the archive has an entry at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Read `path` as text, honouring a BOM or an XML encoding declaration.
    fn read_text(&self, path: &str) -> impl Future<Output = Result<String>> + Send {
        async move {
            let bytes = self.read(path).await?;
            let hint = extract_xml_encoding(&bytes);
            Ok(decode_text(&bytes, hint).into_owned())
        }
    }
}
