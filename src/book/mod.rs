//! Opened books.
//!
//! [`Book`] reads the container, package and navigation documents of an
//! archive once and keeps the results next to the store, ready to hand to a
//! [`Rendition`].

use std::path::Path;
use std::sync::Arc;

use crate::archive::{ArchiveStore, ZipStore};
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::package::{
    CONTAINER_PATH, Manifest, Metadata, NavNode, Package, parse_container, parse_nav, parse_ncx,
    parse_opf,
};
use crate::path::{Fragment, dirname, resolve_href};
use crate::render::{DocumentSink, Rendition, RenditionOptions};
use crate::spine::Spine;

/// A packaged document, parsed and ready to display.
pub struct Book<A: ArchiveStore = ZipStore> {
    store: Arc<A>,
    opf_path: String,
    package: Package,
    spine: Arc<Spine>,
    navigation: Vec<NavNode>,
    diagnostics: Vec<Diagnostic>,
}

impl Book<ZipStore> {
    /// Open an EPUB file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = tokio::task::spawn_blocking(move || ZipStore::open(path))
            .await
            .map_err(std::io::Error::other)??;
        Self::from_store(store).await
    }

    /// Open an EPUB held in memory.
    pub async fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_store(ZipStore::from_bytes(data)?).await
    }
}

impl<A: ArchiveStore> Book<A> {
    /// Parse the package documents found in `store`.
    ///
    /// A missing container or package document is an error. Missing or
    /// malformed navigation is not: the book opens with an empty navigation
    /// tree and a [`Diagnostic::NavigationUnavailable`].
    pub async fn from_store(store: A) -> Result<Self> {
        let container = store.read(CONTAINER_PATH).await?;
        let opf_path = parse_container(&container)?;
        let package = parse_opf(&store.read_text(&opf_path).await?)?;

        let opf_dir = dirname(&opf_path);
        let spine = Spine::new(opf_dir, &package.spine_refs, &package.manifest);

        let mut diagnostics = Vec::new();
        let navigation = match load_navigation(&store, opf_dir, &package).await {
            Ok(navigation) => navigation,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::NavigationUnavailable {
                        reason: e.to_string(),
                    }
                    .logged(),
                );
                Vec::new()
            }
        };

        log::debug!(
            "[Book] opened {opf_path}: {} spine items, {} nav entries",
            spine.len(),
            navigation.iter().map(NavNode::count).sum::<usize>()
        );

        Ok(Self {
            store: Arc::new(store),
            opf_path,
            package,
            spine: Arc::new(spine),
            navigation,
            diagnostics,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.package.metadata
    }

    pub fn manifest(&self) -> &Manifest {
        &self.package.manifest
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Archive path of the package document.
    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    pub fn spine(&self) -> &Spine {
        &self.spine
    }

    /// Table of contents; empty when the book has none.
    pub fn navigation(&self) -> &[NavNode] {
        &self.navigation
    }

    /// Problems found while opening, including the spine's.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.spine
            .diagnostics()
            .iter()
            .chain(&self.diagnostics)
            .cloned()
            .collect()
    }

    pub fn store(&self) -> &Arc<A> {
        &self.store
    }

    /// Create a rendition of this book on `sink`.
    pub fn render_to<S: DocumentSink>(&self, sink: S, options: RenditionOptions) -> Rendition<A, S> {
        Rendition::new(Arc::clone(&self.store), Arc::clone(&self.spine), sink, options)
    }
}

/// The navigation document, else the NCX.
async fn load_navigation<A: ArchiveStore>(
    store: &A,
    opf_dir: &str,
    package: &Package,
) -> Result<Vec<NavNode>> {
    let mut last_error = None;

    if let Some(item) = package.nav_item() {
        let path = resolve_href(opf_dir, &item.href, Fragment::Drop);
        match read_nav(store, &path).await {
            Ok(nav) => return Ok(nav),
            Err(e) => {
                log::debug!("[Book] nav document {path} unusable: {e}");
                last_error = Some(e);
            }
        }
    }

    if let Some(item) = package.ncx_item() {
        let path = resolve_href(opf_dir, &item.href, Fragment::Drop);
        let content = store.read_text(&path).await?;
        return parse_ncx(&content, dirname(&path));
    }

    Err(last_error.unwrap_or_else(|| Error::Parse("no navigation document".into())))
}

async fn read_nav<A: ArchiveStore>(store: &A, path: &str) -> Result<Vec<NavNode>> {
    let content = store.read_text(path).await?;
    parse_nav(&content, dirname(path))
}
