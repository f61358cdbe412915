//! Displaying chapters: targets, asset rewriting and handle lifecycle.

mod common;

use std::sync::Arc;

use common::{CHAP1, EpubBuilder, PNG, sample_book};
use quire::render::{ScrollPosition, SinkEvent};
use quire::{
    BlobStore, Book, Diagnostic, DisplayOutcome, DisplayRequest, Error, HtmlSink, Rendition,
    RenditionOptions, ScrollBehavior, ScrollOptions,
};

async fn sample() -> Book {
    Book::from_bytes(sample_book().build()).await.unwrap()
}

/// A rendition whose blob store the test can inspect.
fn rendition_with_blobs(book: &Book) -> (Rendition<quire::ZipStore, HtmlSink>, Arc<BlobStore>) {
    let blobs = Arc::new(BlobStore::new());
    let rendition = Rendition::with_materializer(
        Arc::clone(book.store()),
        Arc::new(book.spine().clone()),
        HtmlSink::new(),
        RenditionOptions::default(),
        blobs.clone(),
    );
    (rendition, blobs)
}

// ============================================================================
// Targets
// ============================================================================

#[tokio::test]
async fn test_default_displays_first_linear_chapter() {
    let book = sample().await;
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    let report = rendition.display(DisplayRequest::Default).await.into_result().unwrap().unwrap();
    assert_eq!(report.target.href, "OEBPS/chap1.xhtml");
    assert_eq!(report.target.spine_index, Some(0));
    assert_eq!(rendition.current_index(), 0);
    assert!(rendition.sink().body().unwrap().contains("Chapter One"));
}

#[tokio::test]
async fn test_fragment_skips_scroll_to_top() {
    let book = sample().await;
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    let href = &book.navigation()[1].href;
    assert_eq!(href, "OEBPS/chap2.xhtml#section3");

    let report = rendition.display(href.as_str()).await.into_result().unwrap().unwrap();
    assert_eq!(report.target.href, "OEBPS/chap2.xhtml");
    assert_eq!(report.target.fragment.as_deref(), Some("section3"));
    assert_eq!(rendition.current_index(), 2);

    let events = rendition.sink().events();
    assert!(!events.iter().any(|e| matches!(e, SinkEvent::ScrollToTop(_))));
    match rendition.sink().scroll_position() {
        ScrollPosition::Element(element) => assert_eq!(element.tag, "h2"),
        other => panic!("expected element scroll, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chapter_change_scrolls_to_top() {
    let book = sample().await;
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    rendition.display(2usize).await.into_result().unwrap();
    assert_eq!(
        rendition.sink().events(),
        [SinkEvent::SetContent, SinkEvent::ScrollToTop(ScrollBehavior::Auto)]
    );

    let mut quiet = book.render_to(
        HtmlSink::new(),
        RenditionOptions::new().scroll_to_top_on_chapter_change(false),
    );
    quiet.display(2usize).await.into_result().unwrap();
    assert_eq!(quiet.sink().events(), [SinkEvent::SetContent]);

    quiet.scroll_to_top(ScrollOptions {
        behavior: ScrollBehavior::Smooth,
    });
    assert_eq!(
        quiet.sink().events().last(),
        Some(&SinkEvent::ScrollToTop(ScrollBehavior::Smooth))
    );
}

#[tokio::test]
async fn test_next_prev_skip_non_linear() {
    let book = sample().await;
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());
    rendition.display(DisplayRequest::Default).await;

    assert!(rendition.next().await.is_displayed());
    assert_eq!(rendition.current_index(), 2);
    assert!(matches!(rendition.next().await, DisplayOutcome::Unchanged));

    assert!(rendition.prev().await.is_displayed());
    assert_eq!(rendition.current_index(), 0);
    assert!(matches!(rendition.prev().await, DisplayOutcome::Unchanged));
}

#[tokio::test]
async fn test_non_linear_chapter_by_index() {
    let book = sample().await;
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    assert!(rendition.display(1usize).await.is_displayed());
    assert!(rendition.sink().body().unwrap().contains("Notes"));
    // Traversal continues from the non-linear position.
    assert!(rendition.next().await.is_displayed());
    assert_eq!(rendition.current_index(), 2);
}

#[test]
fn test_request_parsing() {
    assert_eq!("3".parse::<DisplayRequest>().unwrap(), DisplayRequest::Index(3));
    assert_eq!("".parse::<DisplayRequest>().unwrap(), DisplayRequest::Default);
    assert_eq!(
        "OEBPS/chap2.xhtml#x".parse::<DisplayRequest>().unwrap(),
        DisplayRequest::Href("OEBPS/chap2.xhtml#x".into())
    );
}

// ============================================================================
// Assets
// ============================================================================

#[tokio::test]
async fn test_partial_asset_failure() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);

    let report = rendition.display(0usize).await.into_result().unwrap().unwrap();

    // a.png (body and inline style), c.jpg, css/images/bg.png, fonts/body.otf
    let mut paths: Vec<_> = report.handles.iter().map(|h| h.resolved_path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        [
            "OEBPS/css/images/bg.png",
            "OEBPS/fonts/body.otf",
            "OEBPS/images/a.png",
            "OEBPS/images/c.jpg",
        ]
    );
    assert_eq!(blobs.len(), 4);

    assert_eq!(report.diagnostics.len(), 1);
    match &report.diagnostics[0] {
        Diagnostic::AssetUnavailable { reference, path, .. } => {
            assert_eq!(reference, "images/missing.png");
            assert_eq!(path, "OEBPS/images/missing.png");
        }
        other => panic!("unexpected diagnostic {other:?}"),
    }
    assert_eq!(rendition.diagnostics(), report.diagnostics.as_slice());

    let body = rendition.sink().body().unwrap();
    assert!(!body.contains("\"images/a.png\""));
    assert!(!body.contains("\"images/c.jpg\""));
    assert!(body.contains("src=\"images/missing.png\""));
    assert!(body.contains("https://example.com/remote.png"));

    for handle in &report.handles {
        let in_styles = rendition.sink().styles().iter().any(|s| s.contains(&handle.handle));
        assert!(body.contains(&handle.handle) || in_styles);
        assert!(blobs.get(&handle.handle).is_some());
    }
}

#[tokio::test]
async fn test_stylesheet_urls_resolve_against_stylesheet() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);

    let report = rendition.display(0usize).await.into_result().unwrap().unwrap();
    let bg = report
        .handles
        .iter()
        .find(|h| h.original_reference == "images/bg.png")
        .unwrap();
    assert_eq!(bg.resolved_path, "OEBPS/css/images/bg.png");
    assert_eq!(blobs.get(&bg.handle).unwrap().media_type, "image/png");

    // Base stylesheet, linked stylesheet, inline style.
    let styles = rendition.sink().styles();
    assert_eq!(styles.len(), 3);
    assert_eq!(styles[0], quire::render::DEFAULT_BASE_STYLESHEET);
    assert!(styles[1].contains(&format!("url(\"{}\")", bg.handle)));
    assert!(!styles[1].contains("images/bg.png"));
    assert!(styles[2].contains("border-image: url(\"blob:quire/"));
}

#[tokio::test]
async fn test_missing_stylesheet_is_a_diagnostic() {
    let chapter = r#"<html><head><link rel="stylesheet" href="gone.css"/></head>
<body><img src="a.png"/></body></html>"#;
    let bytes = EpubBuilder::new("No CSS")
        .chapter("c", "c.xhtml", chapter)
        .file("a.png", PNG)
        .build();
    let book = Book::from_bytes(bytes).await.unwrap();
    let options = RenditionOptions::new().without_base_stylesheet();
    let mut rendition = book.render_to(HtmlSink::new(), options);

    let report = rendition.display(0usize).await.into_result().unwrap().unwrap();
    assert_eq!(report.handles.len(), 1);
    assert_eq!(
        report.diagnostics,
        [Diagnostic::StylesheetUnavailable {
            path: "OEBPS/gone.css".into(),
            reason: "not found in archive: OEBPS/gone.css".into(),
        }]
    );
    assert!(rendition.sink().styles().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_no_handle_survives_two_displays() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);

    let first = rendition.display(0usize).await.into_result().unwrap().unwrap();
    let second = rendition.display(0usize).await.into_result().unwrap().unwrap();

    for handle in &first.handles {
        assert!(blobs.get(&handle.handle).is_none());
        assert!(!second.handles.contains(handle));
    }
    assert_eq!(blobs.len(), second.handles.len());
    assert_eq!(rendition.lifecycle().live_count(), second.handles.len());

    rendition.display(2usize).await.into_result().unwrap();
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn test_invalid_index_shows_error() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);
    rendition.display(0usize).await.into_result().unwrap();
    assert!(!blobs.is_empty());

    let outcome = rendition.display(42usize).await;
    assert!(matches!(outcome.error(), Some(Error::InvalidTarget(_))));
    assert_eq!(rendition.lifecycle().live_count(), 0);
    assert!(blobs.is_empty());
    assert!(rendition.sink().body().is_none());
    assert!(rendition.sink().to_html().contains("Failed to display content"));
    // The position is unchanged.
    assert_eq!(rendition.current_index(), 0);
}

#[tokio::test]
async fn test_missing_chapter_shows_error() {
    let bytes = EpubBuilder::new("Broken")
        .chapter("c1", "c1.xhtml", CHAP1)
        .build();
    let book = Book::from_bytes(bytes).await.unwrap();
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    let outcome = rendition.display("OEBPS/elsewhere.xhtml").await;
    assert!(outcome.error().unwrap().is_not_found());
    assert!(rendition.sink().error().is_some());
}

#[tokio::test]
async fn test_drop_releases_handles() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);
    rendition.display(0usize).await.into_result().unwrap();
    let lifecycle = rendition.lifecycle().clone();

    drop(rendition);
    assert!(blobs.is_empty());
    assert_eq!(lifecycle.live_count(), 0);
    assert!(lifecycle.is_shut_down());
}

#[tokio::test]
async fn test_close_returns_sink() {
    let book = sample().await;
    let (mut rendition, blobs) = rendition_with_blobs(&book);
    rendition.display(2usize).await.into_result().unwrap();

    let sink = rendition.close();
    assert!(sink.body().unwrap().contains("Section Three"));
    assert!(blobs.is_empty());
}
