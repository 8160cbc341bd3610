//! Link discovery in HTML pages
//!
//! Detectors find resources hidden in CSS and lazy-load attributes; this
//! module covers the ordinary references: anchors, stylesheets, scripts,
//! images and frames.

use crate::url::resolve_reference;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Element/attribute pairs that reference other resources
const LINK_SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("iframe[src]", "src"),
    ("source[src]", "src"),
];

/// Extracts every crawlable reference from an HTML document
///
/// References are resolved against `base_url`, fragments are dropped and
/// duplicates removed. `javascript:`, `mailto:`, `tel:`, `data:` and
/// fragment-only references are skipped. A `<base href>` overrides
/// `base_url` when present.
///
/// # Example
///
/// ```
/// use crawl_relay::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/page#top">Link</a><img src="logo.png">"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base);
/// assert_eq!(links[0].as_str(), "https://example.com/page");
/// assert_eq!(links[1].as_str(), "https://example.com/logo.png");
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for (selector, attr) in LINK_SOURCES {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(href) = element.value().attr(attr) else {
                continue;
            };
            if let Some(url) = resolve_reference(&base, href) {
                if seen.insert(url.as_str().to_string()) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}
