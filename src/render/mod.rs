//! Chapter display.
//!
//! A [`Rendition`] shows one chapter of a book at a time on a
//! [`DocumentSink`]. Each [`display`](Rendition::display) call is one display
//! cycle:
//!
//! 1. resolve the request to a chapter ([`resolve_target`])
//! 2. release the previous cycle's resource handles
//! 3. read and scan the chapter markup
//! 4. fetch stylesheets and materialize assets concurrently
//! 5. push the rewritten body and styles to the sink and scroll
//!
//! Failures of single assets are reported as [`Diagnostic`]s; failures of the
//! chapter itself put the sink into its error state.

mod assets;
mod css;
mod lifecycle;
mod markup;
mod sink;
mod target;

use std::sync::Arc;

pub use assets::{AssetRewriter, RewrittenChapter};
pub use css::{CssUrl, scan_urls};
pub use lifecycle::{
    Blob, BlobStore, CycleToken, Materializer, ResourceHandle, ResourceLifecycle,
};
pub use markup::{AttrRef, ChapterMarkup, ElementRef, find_element_by_id_or_name};
pub use sink::{DocumentSink, HtmlSink, ScrollBehavior, ScrollPosition, SinkEvent};
pub use target::{DisplayRequest, DisplayTarget, TargetKind, resolve_target};

use crate::archive::ArchiveStore;
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::spine::Spine;

/// Stylesheet applied before the chapter's own.
pub const DEFAULT_BASE_STYLESHEET: &str =
    "body { margin: 16px; font-family: system-ui, Arial, sans-serif; } \
     img { max-width: 100%; height: auto; } figure { margin: 0; }";

/// Rendition configuration.
#[derive(Debug, Clone)]
pub struct RenditionOptions {
    /// Scroll to the top when a chapter is displayed without a fragment.
    pub scroll_to_top_on_chapter_change: bool,
    /// Applied before chapter stylesheets; `None` for no base style.
    pub base_stylesheet: Option<String>,
}

impl Default for RenditionOptions {
    fn default() -> Self {
        Self {
            scroll_to_top_on_chapter_change: true,
            base_stylesheet: Some(DEFAULT_BASE_STYLESHEET.to_string()),
        }
    }
}

impl RenditionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_to_top_on_chapter_change(mut self, enabled: bool) -> Self {
        self.scroll_to_top_on_chapter_change = enabled;
        self
    }

    pub fn base_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.base_stylesheet = Some(css.into());
        self
    }

    pub fn without_base_stylesheet(mut self) -> Self {
        self.base_stylesheet = None;
        self
    }
}

/// Options for [`Rendition::scroll_to_top`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOptions {
    pub behavior: ScrollBehavior,
}

/// Summary of a successful display cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayReport {
    pub target: DisplayTarget,
    /// Handles live for this chapter.
    pub handles: Vec<ResourceHandle>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of [`Rendition::display`].
#[derive(Debug)]
pub enum DisplayOutcome {
    /// The chapter is on the sink.
    Displayed(DisplayReport),
    /// Nothing to do (fragment-only link, or already at the spine boundary).
    Unchanged,
    /// The cycle was aborted and the sink shows the error.
    Failed(Error),
}

impl DisplayOutcome {
    pub fn is_displayed(&self) -> bool {
        matches!(self, DisplayOutcome::Displayed(_))
    }

    pub fn report(&self) -> Option<&DisplayReport> {
        match self {
            DisplayOutcome::Displayed(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            DisplayOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Turn into a `Result`, treating `Unchanged` as success.
    pub fn into_result(self) -> Result<Option<DisplayReport>> {
        match self {
            DisplayOutcome::Displayed(report) => Ok(Some(report)),
            DisplayOutcome::Unchanged => Ok(None),
            DisplayOutcome::Failed(e) => Err(e),
        }
    }
}

/// Displays chapters of a book on a sink.
pub struct Rendition<A: ArchiveStore, S: DocumentSink> {
    store: Arc<A>,
    spine: Arc<Spine>,
    sink: S,
    options: RenditionOptions,
    lifecycle: LifecycleGuard,
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<A: ArchiveStore, S: DocumentSink> Rendition<A, S> {
    /// Create a rendition that materializes assets into a fresh [`BlobStore`].
    pub fn new(store: Arc<A>, spine: Arc<Spine>, sink: S, options: RenditionOptions) -> Self {
        Self::with_materializer(store, spine, sink, options, Arc::new(BlobStore::new()))
    }

    pub fn with_materializer(
        store: Arc<A>,
        spine: Arc<Spine>,
        sink: S,
        options: RenditionOptions,
        materializer: Arc<dyn Materializer>,
    ) -> Self {
        Self {
            store,
            spine,
            sink,
            options,
            lifecycle: LifecycleGuard(ResourceLifecycle::new(materializer)),
            index: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Run one display cycle.
    pub async fn display(&mut self, request: impl Into<DisplayRequest>) -> DisplayOutcome {
        let request = request.into();

        let target = match resolve_target(&self.spine, &request) {
            Ok(Some(target)) => target,
            Ok(None) => {
                log::debug!("[Rendition] nothing to display for {request:?}");
                return DisplayOutcome::Unchanged;
            }
            Err(e) => return self.fail(e),
        };

        let token = self.lifecycle.0.begin_cycle();
        log::debug!(
            "[Rendition] displaying {} (cycle {})",
            target.href,
            token.generation()
        );

        let source = match self.store.read_text(&target.href).await {
            Ok(source) => source,
            Err(e) => return self.fail(e),
        };

        let markup = ChapterMarkup::scan(&source);
        let rewriter = AssetRewriter::new(Arc::clone(&self.store), self.lifecycle.0.clone());
        let chapter = rewriter.rewrite(&source, &markup, &target.href, token).await;

        if !self.lifecycle.0.is_current(token) {
            // Superseded while fetching; everything it made is already gone.
            return self.fail(Error::AssetMaterialization {
                path: target.href,
                reason: "display cycle superseded".into(),
            });
        }

        let mut styles = Vec::with_capacity(chapter.styles.len() + 1);
        if let Some(base) = &self.options.base_stylesheet {
            styles.push(base.clone());
        }
        styles.extend(chapter.styles);
        self.sink.set_content(&chapter.body, &styles);

        if target.fragment.is_none() && self.options.scroll_to_top_on_chapter_change {
            self.sink.scroll_to_top(ScrollBehavior::Auto);
        }

        if let Some(index) = target.spine_index {
            self.index = index;
        }

        if let Some(fragment) = target.fragment.as_deref() {
            match self.sink.find_element_by_id_or_name(fragment) {
                Some(element) => self.sink.scroll_into_view(&element),
                None => log::debug!("[Rendition] fragment #{fragment} not found"),
            }
        }

        self.diagnostics = chapter.diagnostics.clone();
        DisplayOutcome::Displayed(DisplayReport {
            target,
            handles: chapter.handles,
            diagnostics: chapter.diagnostics,
        })
    }

    /// Display the next linear chapter. `Unchanged` at the end of the spine.
    pub async fn next(&mut self) -> DisplayOutcome {
        let next = self.spine.next_linear_index(self.index);
        if next == self.index {
            return DisplayOutcome::Unchanged;
        }
        self.display(next).await
    }

    /// Display the previous linear chapter. `Unchanged` at the start.
    pub async fn prev(&mut self) -> DisplayOutcome {
        let prev = self.spine.prev_linear_index(self.index);
        if prev == self.index {
            return DisplayOutcome::Unchanged;
        }
        self.display(prev).await
    }

    pub fn scroll_to_top(&mut self, options: ScrollOptions) {
        self.sink.scroll_to_top(options.behavior);
    }

    /// Spine position of the last chapter displayed from the spine.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Diagnostics of the last display cycle.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn lifecycle(&self) -> &ResourceLifecycle {
        &self.lifecycle.0
    }

    pub fn spine(&self) -> &Spine {
        &self.spine
    }

    pub fn options(&self) -> &RenditionOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Release every handle and return the sink.
    pub fn close(self) -> S {
        self.lifecycle.0.shutdown();
        self.sink
    }

    fn fail(&mut self, error: Error) -> DisplayOutcome {
        log::warn!("[Rendition] failed to display content: {error}");
        self.lifecycle.0.release_all();
        self.diagnostics.clear();
        self.sink.show_error(&error.to_string());
        DisplayOutcome::Failed(error)
    }
}

/// Shuts the lifecycle down when the rendition goes away.
struct LifecycleGuard(ResourceLifecycle);

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}
