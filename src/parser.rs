use lol_html::errors::RewritingError;
use lol_html::{HtmlRewriter, Settings, element, text};
use std::cell::Cell;
use std::rc::Rc;

/// Elements whose text is code or fallback markup, not page prose.
const NON_VISIBLE: &str = "script, style, noscript";

/// Visible text and raw outbound hrefs of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub text: String,
    pub links: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to parse html: {0}")]
pub struct ExtractError(#[from] RewritingError);

/// Turns raw page content into text and links.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, content: &[u8]) -> Result<ExtractedPage, ExtractError>;
}

/// Streaming extractor built on `lol_html`. Hrefs are returned as written in
/// the page; resolving them is the caller's job. Text inside `script`,
/// `style` and `noscript` is left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl PageExtractor for HtmlExtractor {
    fn extract(&self, content: &[u8]) -> Result<ExtractedPage, ExtractError> {
        let mut links = Vec::new();
        let mut text = String::new();
        let hidden_depth = Rc::new(Cell::new(0usize));
        let hidden_depth_start = Rc::clone(&hidden_depth);

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("a[href]", |el| {
                        if let Some(href) = el.get_attribute("href") {
                            links.push(href);
                        }
                        Ok(())
                    }),
                    element!(NON_VISIBLE, move |el| {
                        if let Some(handlers) = el.end_tag_handlers() {
                            hidden_depth_start.set(hidden_depth_start.get() + 1);
                            let depth = Rc::clone(&hidden_depth_start);
                            let on_end: lol_html::EndTagHandler<'static> = Box::new(move |_end| {
                                depth.set(depth.get().saturating_sub(1));
                                Ok(())
                            });
                            handlers.push(on_end);
                        }
                        Ok(())
                    }),
                    // Chunks of one text node are glued together; separate
                    // nodes get a space so words never run into each other.
                    text!("body", |t| {
                        if hidden_depth.get() > 0 {
                            return Ok(());
                        }
                        text.push_str(t.as_str());
                        if t.last_in_text_node() {
                            text.push(' ');
                        }
                        Ok(())
                    }),
                ],
                ..Settings::new()
            },
            |_: &[u8]| {},
        );

        rewriter.write(content)?;
        rewriter.end()?;

        Ok(ExtractedPage { text, links })
    }
}
