use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use zip::{CompressionMethod, ZipArchive};

use super::source::{ByteSource, FileSource, MemorySource, SourceCursor};
use super::ArchiveStore;
use crate::error::{Error, Result};

/// ZIP-backed archive with random-access entry reads.
///
/// The central directory is scanned once; afterwards each read seeks straight
/// to the entry's data and decompresses it on tokio's blocking pool.
pub struct ZipStore {
    source: Arc<dyn ByteSource>,
    index: HashMap<String, EntryLoc>,
    /// Entry names in archive order.
    names: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct EntryLoc {
    data_offset: u64,
    compressed_size: u64,
    method: Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Stored,
    Deflated,
    Unsupported,
}

impl ZipStore {
    /// Open a ZIP file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_source(Arc::new(FileSource::new(file)?))
    }

    /// Open a ZIP archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(data)))
    }

    /// Scan the central directory of `source`.
    pub fn from_source(source: Arc<dyn ByteSource>) -> Result<Self> {
        let mut archive = ZipArchive::new(SourceCursor::new(Arc::clone(&source)))?;

        let mut index = HashMap::with_capacity(archive.len());
        let mut names = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            index.insert(
                name.clone(),
                EntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    method: method_of(file.compression()),
                },
            );
            names.push(name);
        }

        log::debug!("[ZipStore] indexed {} entries", names.len());

        Ok(Self {
            source,
            index,
            names,
        })
    }

    /// Entry names in archive order (directories excluded).
    pub fn entries(&self) -> &[String] {
        &self.names
    }

    /// Read and decompress an entry synchronously.
    pub fn read_blocking(&self, path: &str) -> Result<Vec<u8>> {
        let loc = self
            .lookup(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(read_entry(self.source.as_ref(), loc)?)
    }

    fn lookup(&self, path: &str) -> Option<EntryLoc> {
        if let Some(loc) = self.index.get(path) {
            return Some(*loc);
        }

        // Some packages store percent-encoded names verbatim while their
        // manifests use the decoded form, or the other way round.
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8().ok()?;
        self.index.get(decoded.as_ref()).copied()
    }
}

impl ArchiveStore for ZipStore {
    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let loc = self.lookup(path);
        let source = Arc::clone(&self.source);
        let path = path.to_string();

        async move {
            let loc = loc.ok_or(Error::NotFound(path))?;
            let data = tokio::task::spawn_blocking(move || read_entry(source.as_ref(), loc))
                .await
                .map_err(io::Error::other)??;
            Ok(data)
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }
}

fn read_entry(source: &dyn ByteSource, loc: EntryLoc) -> io::Result<Vec<u8>> {
    let len = usize::try_from(loc.compressed_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "entry too large"))?;
    let compressed = source.read_at(loc.data_offset, len)?;

    match loc.method {
        Method::Stored => Ok(compressed),
        Method::Deflated => {
            let mut decoder = flate2::read::DeflateDecoder::new(&compressed[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Method::Unsupported => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unsupported compression method",
        )),
    }
}

fn method_of(method: CompressionMethod) -> Method {
    match method {
        CompressionMethod::Stored => Method::Stored,
        CompressionMethod::Deflated => Method::Deflated,
        other => {
            log::debug!("[ZipStore] entry uses {other:?} compression");
            Method::Unsupported
        }
    }
}
