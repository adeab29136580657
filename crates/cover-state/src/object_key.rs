//! Deterministic object keys for news covers
//!
//! A key is derived from the article URL alone: host (without `www.`) plus
//! path, lower-cased, every run of characters outside `[a-z0-9-]` collapsed
//! into a single hyphen, trimmed, and suffixed with `.png`. Query strings and
//! fragments do not take part.

use reqwest::Url;

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// Derive the storage key for the cover of the article at `url`.
pub fn object_key_for_url(url: &str) -> StorageResult<String> {
    let parsed = Url::parse(url).map_err(|e| StorageError::InvalidUrl(format!("{url}: {e}")))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| StorageError::InvalidUrl(format!("{url}: no host")))?;

    let mut name = host.strip_prefix("www.").unwrap_or(host).to_string();

    let path = parsed.path();
    if !path.is_empty() && path != "/" {
        name.push('-');
        name.push_str(&path.trim_start_matches('/').replace('/', "-"));
    }

    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(StorageError::InvalidUrl(format!("{url}: empty key")));
    }

    Ok(format!("{slug}.png"))
}

fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_only() {
        assert_eq!(
            object_key_for_url("https://example.com").unwrap(),
            "example-com.png"
        );
        assert_eq!(
            object_key_for_url("https://example.com/").unwrap(),
            "example-com.png"
        );
    }

    #[test]
    fn test_www_prefix_stripped() {
        assert_eq!(
            object_key_for_url("https://www.theverge.com/2025/1/10/ai-news").unwrap(),
            "theverge-com-2025-1-10-ai-news.png"
        );
    }

    #[test]
    fn test_case_and_trailing_slash_are_irrelevant() {
        let a = object_key_for_url("https://GitHub.com/Owner/Repo/").unwrap();
        let b = object_key_for_url("https://github.com/owner/repo").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "github-com-owner-repo.png");
    }

    #[test]
    fn test_protocol_query_and_fragment_ignored() {
        let a = object_key_for_url("http://example.com/a/b?utm_source=rss#top").unwrap();
        let b = object_key_for_url("https://example.com/a/b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_special_characters_collapse() {
        assert_eq!(
            object_key_for_url("https://blog.rust-lang.org/2024/11/28/Rust-1.83.0.html").unwrap(),
            "blog-rust-lang-org-2024-11-28-rust-1-83-0-html.png"
        );
        assert_eq!(
            object_key_for_url("https://example.com/a__b//c").unwrap(),
            "example-com-a-b-c.png"
        );
    }

    #[test]
    fn test_deterministic() {
        let url = "https://news.ycombinator.com/item?id=1";
        assert_eq!(
            object_key_for_url(url).unwrap(),
            object_key_for_url(url).unwrap()
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            object_key_for_url("not a url"),
            Err(StorageError::InvalidUrl(_))
        ));
        assert!(matches!(
            object_key_for_url("mailto:someone@example.com"),
            Err(StorageError::InvalidUrl(_))
        ));
    }
}
