//! HTML helpers on top of `scraper`.
//!
//! `scraper::Html` is not `Send`, so every function here parses, extracts
//! owned data and drops the document before returning. Async code must never
//! hold a parsed document across an `.await`.

use scraper::{ElementRef, Html, Selector};

/// Compile a selector list, skipping (and logging) invalid entries.
pub fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::debug!(selector = %s, error = %e, "Skipping invalid selector");
                None
            }
        })
        .collect()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, whitespace-collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// First non-empty text among `selectors` (first match wins), searched under `scope`.
pub fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// First non-empty attribute value among `selectors`, searched under `scope`.
pub fn first_attr(scope: ElementRef<'_>, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Plain text of an HTML fragment (e.g. a listing's `body_html`).
pub fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element())
}

const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
    "iframe",
];

const MAIN_CONTENT: &[&str] = &["main", "article", "[role='main']", "#content", "#main", "body"];

/// Render a page as cleaned text for a language model.
///
/// Prefers the main content region, drops scripts, styles and page chrome,
/// collapses whitespace and caps the result at `max_chars` characters.
pub fn render_page_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let scope = compile(MAIN_CONTENT)
        .iter()
        .find_map(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in scope.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| SKIPPED_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    collapse_whitespace(&parts.join(" "))
        .chars()
        .take(max_chars)
        .collect()
}
