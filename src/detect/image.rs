use crate::detect::{dedupe, is_inline, qualify, Detector};
use crate::state::ResponseMeta;
use crate::RelayError;
use regex::Regex;

/// Finds CSS background images and lazy-load image attributes
///
/// Recognized forms:
/// - `background: ... url(...)` and `background-image: url(...)`, in CSS
///   files, `<style>` blocks and `style` attributes
/// - `data-src` and `data-src-retina` attributes
///
/// Captured values are decoded of HTML entities and stripped of quote
/// characters.
pub struct ImageDetector {
    declaration: Regex,
    css_url: Regex,
    data_src: Regex,
}

impl ImageDetector {
    pub fn new() -> Result<Self, RelayError> {
        Ok(Self {
            // Entities are matched as a unit so `&quot;` doesn't end the declaration at its `;`
            declaration: Regex::new(r"(?i)background(?:-image)?\s*:\s*((?:&#?\w+;|[^;{}<>])+)")?,
            css_url: Regex::new(r"(?i)url\(\s*([^)]*?)\s*\)")?,
            data_src: Regex::new(
                r#"(?i)\bdata-src(?:-retina)?\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#,
            )?,
        })
    }

    fn background_urls<'a>(&'a self, body: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.declaration
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .flat_map(move |value| {
                self.css_url
                    .captures_iter(value.as_str())
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str())
            })
    }

    fn data_src_urls<'a>(&'a self, body: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.data_src
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Decodes entities, then strips quotes and surrounding whitespace
fn clean_reference(raw: &str) -> String {
    html_escape::decode_html_entities(raw)
        .replace(['"', '\''], "")
        .trim()
        .to_string()
}

impl Detector for ImageDetector {
    fn name(&self) -> &'static str {
        "image"
    }

    fn applies(&self, response: &ResponseMeta) -> bool {
        response.is_html() || response.media_type().as_deref() == Some("text/css")
    }

    fn detect(
        &self,
        body: &str,
        host: Option<&str>,
        protocol: &str,
    ) -> Result<Vec<String>, RelayError> {
        let urls = self
            .background_urls(body)
            .chain(self.data_src_urls(body))
            .map(clean_reference)
            .filter(|reference| !is_inline(reference))
            .map(|reference| qualify(&reference, host, protocol))
            .collect();

        Ok(dedupe(urls))
    }
}
