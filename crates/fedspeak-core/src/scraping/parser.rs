//! HTML parsing helpers shared by the scrapers.
//!
//! Uses the `scraper` crate (html5ever + CSS selectors).

use crate::error::ScrapeError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Compiles a CSS selector.
pub fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::ParseError(format!("Invalid CSS selector '{}': {:?}", css, e)))
}

/// Text content of an element with whitespace runs collapsed to one space.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the document's `<title>`, if present and non-empty.
pub fn page_title(document: &Html) -> Result<Option<String>, ScrapeError> {
    let title = selector("title")?;
    Ok(document
        .select(&title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty()))
}

/// Extracts the `href` of every element matching `css` as an absolute URL.
///
/// Relative links are resolved against `base_url`. Empty hrefs, fragments,
/// `javascript:` links and non-http(s) targets are skipped. Duplicates are
/// removed, keeping the first occurrence.
///
/// **Example:**
/// ```
/// use fedspeak_core::scraping::parser::extract_links;
///
/// let html = r#"<ul id="letters"><li><a href="/terms/a">A</a></li></ul>"#;
/// let links = extract_links(html, "https://example.com/dict", "ul#letters a[href]").unwrap();
/// assert_eq!(links, vec!["https://example.com/terms/a"]);
/// ```
pub fn extract_links(html: &str, base_url: &str, css: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(base_url)
        .map_err(|e| ScrapeError::InvalidUrl(format!("Invalid base URL {}: {}", base_url, e)))?;
    let link_selector = selector(css)?;

    Ok(resolve_hrefs(
        &base,
        document
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href")),
    ))
}

/// Resolves hrefs against `base`, dropping unusable ones and duplicates.
pub(crate) fn resolve_hrefs<'a>(
    base: &url::Url,
    hrefs: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in hrefs {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        let Ok(absolute) = base.join(href) else {
            continue;
        };
        if absolute.scheme() != "http" && absolute.scheme() != "https" {
            continue;
        }
        let link = absolute.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}
