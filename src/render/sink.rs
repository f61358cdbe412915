//! Display surfaces.

use super::markup::{ElementRef, find_element_by_id_or_name};

/// Scroll animation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
}

/// Where a rendition draws chapters.
///
/// The rendition owns its sink and drives it one display cycle at a time.
pub trait DocumentSink {
    /// A located element of the displayed content.
    type Element;

    /// Replace the displayed document. `styles` are applied in order.
    fn set_content(&mut self, body: &str, styles: &[String]);

    /// Replace the displayed document with a visible error.
    fn show_error(&mut self, message: &str);

    fn scroll_to_top(&mut self, behavior: ScrollBehavior);

    /// Find an element by `id`, falling back to `name`.
    fn find_element_by_id_or_name(&self, name: &str) -> Option<Self::Element>;

    fn scroll_into_view(&mut self, element: &Self::Element);
}

/// What an [`HtmlSink`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    SetContent,
    ShowError(String),
    ScrollToTop(ScrollBehavior),
    ScrollIntoView(ElementRef),
}

/// Scroll state of an [`HtmlSink`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScrollPosition {
    #[default]
    Top,
    Element(ElementRef),
}

/// An in-memory sink that keeps the current document as HTML text.
#[derive(Debug, Clone, Default)]
pub struct HtmlSink {
    body: Option<String>,
    styles: Vec<String>,
    error: Option<String>,
    scroll: ScrollPosition,
    events: Vec<SinkEvent>,
}

impl HtmlSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body markup currently displayed.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// The error message, while in the error state.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn scroll_position(&self) -> &ScrollPosition {
        &self.scroll
    }

    /// Every call received, oldest first.
    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Render the displayed document (or error) as a standalone HTML page.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!doctype html>\n<html><head><meta charset=\"utf-8\">");
        for css in &self.styles {
            out.push_str("<style>");
            out.push_str(css);
            out.push_str("</style>");
        }
        out.push_str("</head><body>");
        match (&self.error, &self.body) {
            (Some(message), _) => {
                out.push_str("<div class=\"quire-error\">Failed to display content: ");
                out.push_str(&quick_xml::escape::escape(message.as_str()));
                out.push_str("</div>");
            }
            (None, Some(body)) => out.push_str(body),
            (None, None) => {}
        }
        out.push_str("</body></html>\n");
        out
    }
}

impl DocumentSink for HtmlSink {
    type Element = ElementRef;

    fn set_content(&mut self, body: &str, styles: &[String]) {
        self.body = Some(body.to_string());
        self.styles = styles.to_vec();
        self.error = None;
        self.scroll = ScrollPosition::Top;
        self.events.push(SinkEvent::SetContent);
    }

    fn show_error(&mut self, message: &str) {
        self.body = None;
        self.styles.clear();
        self.error = Some(message.to_string());
        self.scroll = ScrollPosition::Top;
        self.events.push(SinkEvent::ShowError(message.to_string()));
    }

    fn scroll_to_top(&mut self, behavior: ScrollBehavior) {
        self.scroll = ScrollPosition::Top;
        self.events.push(SinkEvent::ScrollToTop(behavior));
    }

    fn find_element_by_id_or_name(&self, name: &str) -> Option<ElementRef> {
        find_element_by_id_or_name(self.body.as_deref()?, name)
    }

    fn scroll_into_view(&mut self, element: &ElementRef) {
        self.scroll = ScrollPosition::Element(element.clone());
        self.events.push(SinkEvent::ScrollIntoView(element.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_and_error_states() {
        let mut sink = HtmlSink::new();
        sink.set_content("<p id=\"a\">Hi</p>", &["p { color: red }".to_string()]);

        assert_eq!(sink.body(), Some("<p id=\"a\">Hi</p>"));
        assert!(sink.to_html().contains("<style>p { color: red }</style>"));

        sink.show_error("bad <index>");
        assert_eq!(sink.body(), None);
        assert_eq!(sink.error(), Some("bad <index>"));
        assert!(sink.to_html().contains("Failed to display content: bad &lt;index&gt;"));
        assert!(sink.find_element_by_id_or_name("a").is_none());

        sink.set_content("<p/>", &[]);
        assert_eq!(sink.error(), None);
        assert_eq!(
            sink.events(),
            [
                SinkEvent::SetContent,
                SinkEvent::ShowError("bad <index>".into()),
                SinkEvent::SetContent,
            ]
        );
    }

    #[test]
    fn test_scrolling() {
        let mut sink = HtmlSink::new();
        sink.set_content("<h2 id=\"s3\">Three</h2>", &[]);

        let element = sink.find_element_by_id_or_name("s3").unwrap();
        sink.scroll_into_view(&element);
        assert_eq!(sink.scroll_position(), &ScrollPosition::Element(element));

        sink.scroll_to_top(ScrollBehavior::Smooth);
        assert_eq!(sink.scroll_position(), &ScrollPosition::Top);
        assert_eq!(sink.events().last(), Some(&SinkEvent::ScrollToTop(ScrollBehavior::Smooth)));
    }
}
