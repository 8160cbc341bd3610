use crate::detect::{dedupe, is_inline, qualify, Detector};
use crate::state::ResponseMeta;
use crate::RelayError;
use scraper::{Html, Selector};

/// Finds every image candidate in `<picture>` blocks and `<img>` tags
///
/// Both `src` and `srcset` are read. A `srcset` is split on commas and only
/// the URL part of each candidate is kept, so `a.jpg 480w` yields `a.jpg`.
pub struct ResponsiveImageDetector {
    candidates: Selector,
}

impl ResponsiveImageDetector {
    pub fn new() -> Result<Self, RelayError> {
        let candidates =
            Selector::parse("picture source, picture img, img").map_err(|e| {
                RelayError::Detector {
                    detector: "responsive-image",
                    message: format!("invalid selector: {:?}", e),
                }
            })?;
        Ok(Self { candidates })
    }
}

/// Splits a `src`/`srcset` value into candidate URLs, dropping descriptors
fn candidate_urls(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

impl Detector for ResponsiveImageDetector {
    fn name(&self) -> &'static str {
        "responsive-image"
    }

    fn applies(&self, response: &ResponseMeta) -> bool {
        response.is_html()
    }

    fn detect(
        &self,
        body: &str,
        host: Option<&str>,
        protocol: &str,
    ) -> Result<Vec<String>, RelayError> {
        let document = Html::parse_document(body);
        let mut urls = Vec::new();

        for element in document.select(&self.candidates) {
            for attr in ["src", "srcset"] {
                let Some(value) = element.value().attr(attr) else {
                    continue;
                };
                // A data URI contains commas of its own
                if is_inline(value) {
                    continue;
                }
                urls.extend(
                    candidate_urls(value)
                        .filter(|url| !is_inline(url))
                        .map(|url| qualify(url, host, protocol)),
                );
            }
        }

        Ok(dedupe(urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(body: &str, host: Option<&str>) -> Vec<String> {
        ResponsiveImageDetector::new()
            .unwrap()
            .detect(body, host, "https")
            .unwrap()
    }

    #[test]
    fn test_picture_sources() {
        let body = r#"
            <picture>
                <source srcset="/img/hero-480.webp 480w, /img/hero-960.webp 960w" type="image/webp">
                <img src="/img/hero.jpg" alt="">
            </picture>"#;
        assert_eq!(
            detect(body, Some("example.com")),
            vec![
                "https://example.com/img/hero-480.webp",
                "https://example.com/img/hero-960.webp",
                "https://example.com/img/hero.jpg",
            ]
        );
    }

    #[test]
    fn test_img_srcset_density_descriptors() {
        let body = r#"<img src="/a.png" srcset="/a.png 1x, /a@2x.png 2x">"#;
        assert_eq!(detect(body, None), vec!["/a.png", "/a@2x.png"]);
    }

    #[test]
    fn test_no_duplicates() {
        let body = r#"<img src="/a.png"><img src="/a.png" srcset="/a.png 100w">"#;
        assert_eq!(detect(body, Some("example.com")), vec!["https://example.com/a.png"]);
    }

    #[test]
    fn test_hotlinked_not_double_prefixed() {
        let body = r#"<img srcset="https://example.com/wp/a.jpg 300w, https://cdn.other.com/b.jpg 600w">"#;
        assert_eq!(
            detect(body, Some("example.com")),
            vec!["https://example.com/wp/a.jpg", "https://cdn.other.com/b.jpg"]
        );
    }

    #[test]
    fn test_relative_without_leading_slash() {
        let body = r#"<img src="uploads/pic.png">"#;
        assert_eq!(
            detect(body, Some("example.com")),
            vec!["https://example.com/uploads/pic.png"]
        );
    }

    #[test]
    fn test_entities_in_attributes_decoded() {
        let body = r#"<img src="/thumb.php?w=10&amp;h=20">"#;
        assert_eq!(detect(body, None), vec!["/thumb.php?w=10&h=20"]);
    }

    #[test]
    fn test_inline_images_skipped() {
        let body = r#"<img src="data:image/gif;base64,R0lGOD"><img src="/real.gif">"#;
        assert_eq!(detect(body, None), vec!["/real.gif"]);
    }

    #[test]
    fn test_html_only() {
        let detector = ResponsiveImageDetector::new().unwrap();
        let css = ResponseMeta {
            status_code: 200,
            content_type: Some("text/css".to_string()),
            ..Default::default()
        };
        assert!(!detector.applies(&css));
    }
}
