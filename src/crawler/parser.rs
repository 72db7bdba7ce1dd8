//! Rendered feed markup scanning
//!
//! This module extracts from the rendered page:
//! - (post ID, title) pairs from item cards
//! - Embed `<iframe>` sources inside item cards
//! - `<video>` and `<video><source>` sources inside item cards
//! - `main_video_url` values inlined as JSON anywhere in the page

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static POST_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/posts/(?:[^/]*-)?(\d+)/?$").expect("valid post ID regex")
});

static INLINE_VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""main_video_url"\s*:\s*"(https?:[^"]+)""#).expect("valid video URL regex")
});

static CARD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-tag="post-card"]"#).expect("valid selector"));

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[data-tag="post-title"] a"#).expect("valid selector"));

static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").expect("valid selector"));

static VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video[src], video source[src]").expect("valid selector"));

/// Everything a snapshot needs from the rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// (post ID, title) for every card with a titled permalink
    pub titles: Vec<(String, String)>,

    /// Iframe embed sources inside item cards
    pub embed_links: Vec<String>,

    /// Video element sources inside item cards
    pub media_sources: Vec<String>,

    /// Video links inlined as JSON in the page markup, unfiltered
    pub inline_video_links: Vec<String>,
}

/// Extracts the numeric post ID from a permalink
///
/// Accepts both `/posts/<slug>-<id>` and `/posts/<id>`; query strings and
/// fragments are ignored.
///
/// # Example
///
/// ```
/// use gleaner::crawler::extract_post_id;
///
/// let url = "https://www.patreon.com/posts/episode-12-98765?utm=x";
/// assert_eq!(extract_post_id(url), Some("98765".to_string()));
/// ```
pub fn extract_post_id(permalink: &str) -> Option<String> {
    let path = permalink
        .split(['?', '#'])
        .next()
        .unwrap_or(permalink);
    POST_ID_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Scans item cards for (post ID, title) pairs
pub fn scan_titles(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SELECTOR)
        .filter_map(|card| card_title(&card))
        .collect()
}

/// Scans the full rendered page
///
/// Relative sources are resolved against `base_url`.
pub fn scan_page(html: &str, base_url: &Url) -> PageScan {
    let document = Html::parse_document(html);
    let mut scan = PageScan::default();

    for card in document.select(&CARD_SELECTOR) {
        if let Some(pair) = card_title(&card) {
            scan.titles.push(pair);
        }

        for iframe in card.select(&IFRAME_SELECTOR) {
            if let Some(src) = iframe.value().attr("src").and_then(|s| resolve_src(s, base_url)) {
                scan.embed_links.push(src);
            }
        }

        for video in card.select(&VIDEO_SELECTOR) {
            if let Some(src) = video.value().attr("src").and_then(|s| resolve_src(s, base_url)) {
                scan.media_sources.push(src);
            }
        }
    }

    scan.inline_video_links = inline_video_links(html);
    scan
}

/// Finds `"main_video_url":"..."` values in raw markup
pub fn inline_video_links(html: &str) -> Vec<String> {
    INLINE_VIDEO_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_json_url(m.as_str()))
        .collect()
}

fn card_title(card: &ElementRef<'_>) -> Option<(String, String)> {
    let anchor = card.select(&TITLE_SELECTOR).next()?;
    let post_id = extract_post_id(anchor.value().attr("href")?)?;
    let title = anchor.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some((post_id, title))
    }
}

/// Resolves an element source to an absolute HTTP(S) URL
fn resolve_src(src: &str, base_url: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") || src.starts_with("blob:") {
        return None;
    }

    match base_url.join(src) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}

/// Undoes the JSON escapes that show up in inlined URLs
fn unescape_json_url(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u003d", "=")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.patreon.com/somecreator/posts").unwrap()
    }

    fn card(href: &str, title: &str, body: &str) -> String {
        format!(
            r#"<div><div data-tag="post-card"><span data-tag="post-title"><a href="{}">{}</a></span>{}</div></div>"#,
            href, title, body
        )
    }

    #[test]
    fn test_extract_post_id() {
        assert_eq!(
            extract_post_id("https://www.patreon.com/posts/my-post-123"),
            Some("123".to_string())
        );
        assert_eq!(
            extract_post_id("https://www.patreon.com/posts/456"),
            Some("456".to_string())
        );
        assert_eq!(
            extract_post_id("https://www.patreon.com/posts/year-2024-recap-789/#comments"),
            Some("789".to_string())
        );
        assert_eq!(extract_post_id("https://www.patreon.com/posts/no-id"), None);
        assert_eq!(extract_post_id("https://www.patreon.com/somecreator"), None);
    }

    #[test]
    fn test_scan_titles() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            card("/posts/first-post-1", "  First Post ", ""),
            card("/posts/2", "Second", ""),
            card("/posts/untitled-3", "", ""),
        );
        let titles = scan_titles(&html);
        assert_eq!(
            titles,
            vec![
                ("1".to_string(), "First Post".to_string()),
                ("2".to_string(), "Second".to_string()),
            ]
        );
    }

    #[test]
    fn test_card_without_permalink_is_ignored() {
        let html = r#"<div data-tag="post-card"><span data-tag="post-title">Locked</span></div>"#;
        assert!(scan_titles(html).is_empty());
    }

    #[test]
    fn test_scan_page_collects_embeds_and_sources() {
        let html = format!(
            "<html><body>{}<iframe src=\"https://www.youtube.com/embed/outside\"></iframe></body></html>",
            card(
                "/posts/clip-10",
                "Clip",
                r#"<iframe src="https://www.youtube.com/embed/abc"></iframe>
                   <video src="/media/clip.mp4"></video>
                   <video><source src="https://cdn.example.com/alt.webm"></video>
                   <video src="blob:https://www.patreon.com/1234"></video>"#,
            )
        );
        let scan = scan_page(&html, &base_url());

        assert_eq!(scan.titles, vec![("10".to_string(), "Clip".to_string())]);
        assert_eq!(scan.embed_links, vec!["https://www.youtube.com/embed/abc"]);
        assert_eq!(
            scan.media_sources,
            vec![
                "https://www.patreon.com/media/clip.mp4",
                "https://cdn.example.com/alt.webm"
            ]
        );
    }

    #[test]
    fn test_inline_video_links_are_unescaped() {
        let html = r#"<script>window.data = {"main_video_url":"https:\/\/www.youtube.com\/watch?v=abc&t=5","other":1,
            "main_video_url": "https://vimeo.com/12345", "main_video_url":null}</script>"#;
        assert_eq!(
            inline_video_links(html),
            vec![
                "https://www.youtube.com/watch?v=abc&t=5",
                "https://vimeo.com/12345"
            ]
        );
    }
}
