/// Utility helpers used by all adapters.
///
/// This module contains:
/// - Text cleanup helpers (whitespace, HTML fragments)
/// - URL helpers
/// - CSS selector / element text helpers
///
/// IMPORTANT:
/// - No source-specific business logic should live here.
/// - Every helper is a pure function.
///

use scraper::{ElementRef, Html, Selector};

use crate::error::{ParseError, RecordFieldError};

/// Collapse every run of whitespace into a single space and trim.
///
/// Examples:
/// - "  Senior \n  Trader " -> "Senior Trader"
/// - "\t"                   -> ""
///
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup from an HTML fragment and return its cleaned text.
///
/// Entities are decoded by the HTML parser, so
/// "<p>R&amp;D</p>" becomes "R&D".
///
/// Used for JSON APIs that embed HTML descriptions.
///
pub fn html_to_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text: Vec<&str> = doc.root_element().text().collect();
    clean_text(&text.join(" "))
}

/// Turn a possibly relative link into an absolute URL.
///
/// Handles:
/// - absolute URLs        (returned unchanged)
/// - protocol-relative    ("//host/path" -> "https://host/path")
/// - root-relative paths  ("/careers/1"  -> "{origin}/careers/1")
///
/// `origin` must not carry a trailing slash.
///
pub fn absolute_url(origin: &str, href: &str) -> String {
    let href = href.trim();

    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

/// Build a CSS selector, mapping failures into a structural error.
pub fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css,
        reason: format!("{e:?}"),
    })
}

/// Cleaned text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    let text: Vec<&str> = el.text().collect();
    clean_text(&text.join(" "))
}

/// Cleaned text of the first descendant matching `sel`, if any.
pub fn select_text(parent: ElementRef<'_>, sel: &Selector) -> Option<String> {
    parent.select(sel).next().map(element_text)
}

/// Like `select_text`, but the field is required and must be non-empty.
pub fn require_text(
    parent: ElementRef<'_>,
    sel: &Selector,
    field: &'static str,
) -> Result<String, RecordFieldError> {
    select_text(parent, sel)
        .filter(|t| !t.is_empty())
        .ok_or(RecordFieldError::Missing(field))
}

/// Highest page number among the elements matching `css`.
///
/// Pagination widgets mix numbers with "Next" / "…" links; only
/// elements whose last word is an integer count. No numbered
/// element means a single page.
///
pub fn max_page_number(html: &str, css: &'static str) -> Result<usize, ParseError> {
    let doc = Html::parse_document(html);
    let sel = selector(css)?;

    let max = doc
        .select(&sel)
        .filter_map(|el| {
            element_text(el)
                .split_whitespace()
                .last()
                .and_then(|w| w.parse::<usize>().ok())
        })
        .max()
        .unwrap_or(1);

    Ok(max.max(1))
}

/// Required, non-empty string field of a JSON object.
pub fn require_str<'a>(
    entry: &'a serde_json::Value,
    field: &'static str,
) -> Result<&'a str, RecordFieldError> {
    entry
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RecordFieldError::Missing(field))
}

/// Optional string field of a JSON object, empty when absent.
pub fn optional_str<'a>(entry: &'a serde_json::Value, field: &'static str) -> &'a str {
    entry.get(field).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Join a JSON array of strings with `sep`, skipping non-strings.
pub fn join_str_array(entry: &serde_json::Value, field: &'static str, sep: &str) -> String {
    entry
        .get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(sep)
        })
        .unwrap_or_default()
}
