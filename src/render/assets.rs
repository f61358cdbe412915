//! Rewriting chapter asset references into resource handles.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use tokio::task::JoinSet;

use super::css::{scan_urls, url_expression};
use super::lifecycle::{CycleToken, ResourceHandle, ResourceLifecycle};
use super::markup::ChapterMarkup;
use crate::archive::ArchiveStore;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::path::{Fragment, dirname, is_absolute_reference, resolve};
use crate::util::splice;

/// A chapter with its references rewritten.
#[derive(Debug, Clone, Default)]
pub struct RewrittenChapter {
    /// Body markup with image references replaced.
    pub body: String,
    /// Linked stylesheets (document order), then inline `<style>` blocks.
    pub styles: Vec<String>,
    /// Handles created for this chapter, one per unique resolved path.
    pub handles: Vec<ResourceHandle>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Where an occurrence lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Body,
    Style(usize),
}

#[derive(Debug)]
struct Occurrence {
    location: Location,
    span: Range<usize>,
    reference: String,
    path: String,
}

/// Fetches and materializes the assets of one chapter.
pub struct AssetRewriter<A> {
    store: Arc<A>,
    lifecycle: ResourceLifecycle,
}

impl<A: ArchiveStore> AssetRewriter<A> {
    pub fn new(store: Arc<A>, lifecycle: ResourceLifecycle) -> Self {
        Self { store, lifecycle }
    }

    /// Rewrite `source`, the chapter stored at `chapter_path`.
    ///
    /// Unreadable stylesheets and assets are reported as diagnostics and
    /// leave their references as written; they never fail the chapter.
    pub async fn rewrite(
        &self,
        source: &str,
        markup: &ChapterMarkup,
        chapter_path: &str,
        token: CycleToken,
    ) -> RewrittenChapter {
        let chapter_dir = dirname(chapter_path);
        let mut diagnostics = Vec::new();

        // (text, directory its url()s resolve against)
        let mut styles: Vec<(String, String)> = self
            .fetch_stylesheets(&markup.stylesheet_links, chapter_dir, &mut diagnostics)
            .await;
        styles.extend(
            markup
                .inline_styles
                .iter()
                .map(|css| (css.clone(), chapter_dir.to_string())),
        );

        let body = markup.body_text(source);
        let mut occurrences = Vec::new();

        for image in &markup.images {
            if let Some(path) = asset_path(chapter_dir, &image.value) {
                occurrences.push(Occurrence {
                    location: Location::Body,
                    span: image.span.start - markup.body.start..image.span.end - markup.body.start,
                    reference: image.value.clone(),
                    path,
                });
            }
        }

        for (idx, (css, base_dir)) in styles.iter().enumerate() {
            for url in scan_urls(css) {
                if let Some(path) = asset_path(base_dir, &url.url) {
                    occurrences.push(Occurrence {
                        location: Location::Style(idx),
                        span: url.span,
                        reference: url.url,
                        path,
                    });
                }
            }
        }

        let (handles, failed) = self.materialize_all(&occurrences, token).await;
        diagnostics.extend(failed);

        let by_path: HashMap<&str, &str> = handles
            .iter()
            .map(|h| (h.resolved_path.as_str(), h.handle.as_str()))
            .collect();

        // Body <style> blocks are delivered through `styles`; drop the raw copies.
        let mut body_edits: Vec<(Range<usize>, String)> = markup
            .body_styles
            .iter()
            .map(|span| (span.start - markup.body.start..span.end - markup.body.start, String::new()))
            .collect();
        let mut style_edits: Vec<Vec<(Range<usize>, String)>> = vec![Vec::new(); styles.len()];
        for occurrence in &occurrences {
            let Some(handle) = by_path.get(occurrence.path.as_str()) else {
                continue;
            };
            match occurrence.location {
                Location::Body => body_edits.push((occurrence.span.clone(), handle.to_string())),
                Location::Style(idx) => {
                    style_edits[idx].push((occurrence.span.clone(), url_expression(handle)))
                }
            }
        }

        let styles = styles
            .iter()
            .zip(style_edits)
            .map(|((css, _), edits)| splice(css, edits))
            .collect();

        RewrittenChapter {
            body: splice(body, body_edits),
            styles,
            handles,
            diagnostics,
        }
    }

    /// Read every linked stylesheet concurrently, keeping document order.
    async fn fetch_stylesheets(
        &self,
        links: &[String],
        chapter_dir: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<(String, String)> {
        let mut tasks = JoinSet::new();
        for (idx, href) in links.iter().enumerate() {
            let Some(path) = asset_path(chapter_dir, href) else {
                continue;
            };
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let result = store.read_text(&path).await;
                (idx, path, result)
            });
        }

        let mut fetched: Vec<(usize, String, String)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, path, Ok(css))) => {
                    let base_dir = dirname(&path).to_string();
                    fetched.push((idx, css, base_dir));
                }
                Ok((_, path, Err(e))) => diagnostics.push(
                    Diagnostic::StylesheetUnavailable {
                        path,
                        reason: e.to_string(),
                    }
                    .logged(),
                ),
                Err(e) => log::warn!("[Rendition] stylesheet task failed: {e}"),
            }
        }

        fetched.sort_by_key(|(idx, _, _)| *idx);
        fetched
            .into_iter()
            .map(|(_, css, base_dir)| (css, base_dir))
            .collect()
    }

    /// Materialize each unique path once, all concurrently.
    async fn materialize_all(
        &self,
        occurrences: &[Occurrence],
        token: CycleToken,
    ) -> (Vec<ResourceHandle>, Vec<Diagnostic>) {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut tasks = JoinSet::new();

        for (order, occurrence) in occurrences.iter().enumerate() {
            if !seen.insert(occurrence.path.as_str()) {
                continue;
            }
            let store = Arc::clone(&self.store);
            let lifecycle = self.lifecycle.clone();
            let reference = occurrence.reference.clone();
            let path = occurrence.path.clone();
            tasks.spawn(async move {
                let result = materialize_one(store.as_ref(), &lifecycle, token, &reference, &path).await;
                (order, reference, path, result)
            });
        }

        let mut handles = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((order, _, _, Ok(handle))) => handles.push((order, handle)),
                Ok((order, reference, path, Err(e))) => failed.push((
                    order,
                    Diagnostic::AssetUnavailable {
                        reference,
                        path,
                        reason: e.to_string(),
                    }
                    .logged(),
                )),
                Err(e) => log::warn!("[Rendition] asset task failed: {e}"),
            }
        }

        handles.sort_by_key(|(order, _)| *order);
        failed.sort_by_key(|(order, _)| *order);
        (
            handles.into_iter().map(|(_, h)| h).collect(),
            failed.into_iter().map(|(_, d)| d).collect(),
        )
    }
}

async fn materialize_one<A: ArchiveStore>(
    store: &A,
    lifecycle: &ResourceLifecycle,
    token: CycleToken,
    reference: &str,
    path: &str,
) -> Result<ResourceHandle> {
    let data = store.read(path).await?;
    lifecycle.materialize(token, reference, path, data)
}

/// Archive path for an asset reference, or `None` if it is left alone.
fn asset_path(base_dir: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') || is_absolute_reference(reference) {
        return None;
    }
    let resolved = resolve(base_dir, reference, Fragment::Drop);
    (!resolved.path.is_empty()).then_some(resolved.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryStore;
    use crate::render::lifecycle::BlobStore;

    fn rewriter(store: MemoryStore) -> (Arc<BlobStore>, AssetRewriter<MemoryStore>) {
        let blobs = Arc::new(BlobStore::new());
        let lifecycle = ResourceLifecycle::new(blobs.clone());
        (blobs, AssetRewriter::new(Arc::new(store), lifecycle))
    }

    #[test]
    fn test_asset_path() {
        assert_eq!(asset_path("OEBPS/text/", "../img/a.png").as_deref(), Some("OEBPS/img/a.png"));
        assert_eq!(asset_path("OEBPS/", " img/a.png#x ").as_deref(), Some("OEBPS/img/a.png"));
        assert_eq!(asset_path("OEBPS/", "#frag"), None);
        assert_eq!(asset_path("OEBPS/", ""), None);
        assert_eq!(asset_path("OEBPS/", "data:image/png;base64,AA"), None);
        assert_eq!(asset_path("OEBPS/", "HTTPS://example.com/a.png"), None);
    }

    #[tokio::test]
    async fn test_rewrites_images_and_styles() {
        let store = MemoryStore::new()
            .with_file("OEBPS/images/a.png", vec![0x89, b'P', b'N', b'G'])
            .with_file("OEBPS/css/style.css", "body { background: url(images/bg.png) }")
            .with_file("OEBPS/css/images/bg.png", vec![1])
            .with_file("OEBPS/text/inline.png", vec![2]);
        let (blobs, rewriter) = rewriter(store);
        let token = rewriter.lifecycle.begin_cycle();

        let source = r#"<html><head><link rel="stylesheet" href="../css/style.css"/>
<style>p { background: url('inline.png') }</style></head>
<body><img src="../images/a.png"/><img src="../images/a.png"/><img src="http://x/y.png"/></body></html>"#;
        let markup = ChapterMarkup::scan(source);
        let chapter = rewriter.rewrite(source, &markup, "OEBPS/text/ch1.xhtml", token).await;

        assert!(chapter.diagnostics.is_empty(), "{:?}", chapter.diagnostics);
        assert_eq!(chapter.handles.len(), 3);
        assert_eq!(blobs.len(), 3);
        assert_eq!(rewriter.lifecycle.live_count(), 3);

        let image = &chapter.handles[0];
        assert_eq!(image.resolved_path, "OEBPS/images/a.png");
        assert_eq!(
            chapter.body,
            format!(
                r#"<img src="{0}"/><img src="{0}"/><img src="http://x/y.png"/>"#,
                image.handle
            )
        );

        let bg = chapter
            .handles
            .iter()
            .find(|h| h.resolved_path == "OEBPS/css/images/bg.png")
            .unwrap();
        assert_eq!(chapter.styles.len(), 2);
        assert_eq!(
            chapter.styles[0],
            format!(r#"body {{ background: url("{}") }}"#, bg.handle)
        );
        assert!(chapter.styles[1].contains("url(\"blob:quire/"));
    }

    #[tokio::test]
    async fn test_missing_assets_are_tolerated() {
        let store = MemoryStore::new()
            .with_file("OEBPS/a.png", vec![1])
            .with_file("OEBPS/c.png", vec![3]);
        let (_blobs, rewriter) = rewriter(store);
        let token = rewriter.lifecycle.begin_cycle();

        let source = r#"<body><img src="a.png"/><img src="b.png"/><img src="c.png"/><link rel="stylesheet" href="gone.css"/></body>"#;
        let markup = ChapterMarkup::scan(source);
        let chapter = rewriter.rewrite(source, &markup, "OEBPS/ch.xhtml", token).await;

        assert_eq!(chapter.handles.len(), 2);
        assert!(chapter.body.contains(r#"src="b.png""#));
        assert!(!chapter.body.contains(r#"src="a.png""#));
        assert!(!chapter.body.contains(r#"src="c.png""#));
        assert!(chapter.styles.is_empty());

        assert_eq!(chapter.diagnostics.len(), 2);
        assert!(chapter.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::StylesheetUnavailable { path, .. } if path == "OEBPS/gone.css"
        )));
        assert!(chapter.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::AssetUnavailable { reference, path, .. }
                if reference == "b.png" && path == "OEBPS/b.png"
        )));
    }

    #[tokio::test]
    async fn test_stale_cycle_materializes_nothing() {
        let store = MemoryStore::new().with_file("OEBPS/a.png", vec![1]);
        let (blobs, rewriter) = rewriter(store);
        let stale = rewriter.lifecycle.begin_cycle();
        rewriter.lifecycle.begin_cycle();

        let source = r#"<body><img src="a.png"/></body>"#;
        let markup = ChapterMarkup::scan(source);
        let chapter = rewriter.rewrite(source, &markup, "OEBPS/ch.xhtml", stale).await;

        assert!(chapter.handles.is_empty());
        assert!(blobs.is_empty());
        assert_eq!(chapter.body, r#"<img src="a.png"/>"#);
    }

    #[tokio::test]
    async fn test_protocol_relative_image_is_left_alone() {
        let (blobs, rewriter) = rewriter(MemoryStore::new());
        let token = rewriter.lifecycle.begin_cycle();

        let source = r#"<body><img src="//cdn.example.com/x.png"/></body>"#;
        let markup = ChapterMarkup::scan(source);
        let chapter = rewriter.rewrite(source, &markup, "OEBPS/ch.xhtml", token).await;

        assert_eq!(asset_path("OEBPS/", "//cdn.example.com/x.png"), None);
        assert!(chapter.diagnostics.is_empty(), "{:?}", chapter.diagnostics);
        assert!(chapter.handles.is_empty());
        assert!(blobs.is_empty());
        assert_eq!(chapter.body, r#"<img src="//cdn.example.com/x.png"/>"#);
    }

    #[tokio::test]
    async fn test_body_style_block_moves_to_styles() {
        let store = MemoryStore::new().with_file("OEBPS/bg.png", vec![1]);
        let (_blobs, rewriter) = rewriter(store);
        let token = rewriter.lifecycle.begin_cycle();

        let source = r#"<body><style>p { background: url(bg.png) }</style><p>x</p></body>"#;
        let markup = ChapterMarkup::scan(source);
        let chapter = rewriter.rewrite(source, &markup, "OEBPS/ch.xhtml", token).await;

        assert_eq!(chapter.handles.len(), 1);
        assert_eq!(chapter.body, "<p>x</p>");
        assert!(!chapter.body.contains("url(bg.png)"));
        assert_eq!(
            chapter.styles,
            [format!(r#"p {{ background: url("{}") }}"#, chapter.handles[0].handle)]
        );
    }
}
