//! Cover image discovery from page markup.
//!
//! Search order, first match wins:
//! 1. Open Graph: `og:image:secure_url`, `og:image:url`, `og:image` (property),
//!    `og:image` (name)
//! 2. Twitter card: `twitter:image` (name, then property)
//! 3. `<link rel="image_src">`
//! 4. First `<img>` whose id or class contains "hero" or "cover"
//!
//! Relative URLs are resolved against the page URL.

use std::sync::Arc;

use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::fetch::PageFetcher;

/// Metadata selectors and the attribute holding the image URL, in priority order.
const META_SELECTORS: &[(&str, &str)] = &[
    (r#"meta[property="og:image:secure_url"]"#, "content"),
    (r#"meta[property="og:image:url"]"#, "content"),
    (r#"meta[property="og:image"]"#, "content"),
    (r#"meta[name="og:image"]"#, "content"),
    (r#"meta[name="twitter:image"]"#, "content"),
    (r#"meta[property="twitter:image"]"#, "content"),
    (r#"link[rel="image_src"]"#, "href"),
];

const HERO_IMG_SELECTOR: &str =
    r#"img[id*="hero"], img[class*="hero"], img[id*="cover"], img[class*="cover"]"#;

/// Find the most likely cover image URL in `html`.
///
/// Pure: no network access. Returns an absolute URL.
pub fn find_cover_image_url(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    for (selector, attr) in META_SELECTORS {
        let selector = Selector::parse(selector).expect("Invalid selector");
        let value = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr));
        if let Some(url) = value.and_then(|v| resolve(v, base.as_ref())) {
            return Some(url);
        }
    }

    let selector = Selector::parse(HERO_IMG_SELECTOR).expect("Invalid selector");
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("src"))
        .and_then(|v| resolve(v, base.as_ref()))
}

fn resolve(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(raw).ok().map(String::from),
        None => Some(raw.to_string()),
    }
}

/// Finds a cover URL in markup and downloads it.
#[derive(Clone)]
pub struct HtmlCoverParser {
    fetcher: Arc<dyn PageFetcher>,
}

impl HtmlCoverParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Candidate cover bytes for the page, or `None` when no metadata
    /// matches or the matched image cannot be fetched.
    pub async fn parse_cover_image(&self, html: &str, base_url: &str) -> Option<Vec<u8>> {
        let url = find_cover_image_url(html, base_url)?;
        debug!(url = %url, "Fetching cover candidate");

        match self.fetcher.fetch_bytes(&url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(url = %url, error = %e, "Cover candidate fetch failed");
                None
            }
        }
    }
}
