//! Response classification rules
//!
//! Each observed response matches at most one rule, tried in order:
//! 1. audio/video file on the user-content host
//! 2. per-post image asset
//! 3. feed listing API (JSON list of post payloads)
//! 4. single post API, excluding its comments sub-resource

use crate::collector::{ObservedResponse, ResourceEvent};
use crate::config::PlatformConfig;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

static RE_MEDIA_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp3|mp4|m4a|wav|ogg|webm|flac)(\?|$)").expect("valid media regex")
});
static RE_IMAGE_ASSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"patreon-media/p/post/\d+").expect("valid image path regex"));
static RE_IMAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)(\?|$)").expect("valid image regex")
});

/// Which rule a response URL matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Media,
    Image,
    ListingApi,
    PostApi,
    Unmatched,
}

impl Classification {
    /// Whether the response body is needed to finish classification
    pub fn needs_body(&self) -> bool {
        matches!(self, Self::ListingApi | Self::PostApi)
    }
}

/// Classification rules bound to one platform's hosts
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    user_content_host: String,
    api_host: String,
    video_hosts: Vec<String>,
}

impl ClassificationRules {
    pub fn new(platform: &PlatformConfig) -> Self {
        let api_host = Url::parse(&platform.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_default();

        Self {
            user_content_host: platform.user_content_host.to_lowercase(),
            api_host,
            video_hosts: platform
                .video_hosts
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
        }
    }

    /// Classifies a response by its URL alone
    pub fn classify_url(&self, url: &str) -> Classification {
        if RE_MEDIA_FILE.is_match(url) && url.contains(&self.user_content_host) {
            return Classification::Media;
        }

        if RE_IMAGE_ASSET.is_match(url) && RE_IMAGE_FILE.is_match(url) {
            return Classification::Image;
        }

        let Ok(parsed) = Url::parse(url) else {
            return Classification::Unmatched;
        };
        if !self.is_api_host(&parsed) {
            return Classification::Unmatched;
        }

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["api", "campaigns", rest @ ..] if rest.contains(&"posts") => {
                Classification::ListingApi
            }
            ["api", "posts", id, rest @ ..]
                if is_numeric(id) && !rest.contains(&"comments") =>
            {
                Classification::PostApi
            }
            _ => Classification::Unmatched,
        }
    }

    /// Classifies a response into at most one kind of resource event
    ///
    /// API bodies that fail to parse yield no events.
    pub fn classify(&self, response: &ObservedResponse) -> Vec<ResourceEvent> {
        match self.classify_url(&response.url) {
            Classification::Media => vec![ResourceEvent::Media(response.url.clone())],
            Classification::Image => vec![ResourceEvent::Image(response.url.clone())],
            Classification::ListingApi | Classification::PostApi => response
                .body
                .as_deref()
                .map(|body| self.video_links_from_json(body))
                .unwrap_or_default()
                .into_iter()
                .map(ResourceEvent::ThirdPartyLink)
                .collect(),
            Classification::Unmatched => Vec::new(),
        }
    }

    /// Extracts third-party video links from a post API body
    ///
    /// `data` may hold a single post payload or a list of them.
    pub fn video_links_from_json(&self, body: &str) -> Vec<String> {
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };

        let posts: Vec<&Value> = match json.get("data") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        };

        posts
            .into_iter()
            .filter_map(|post| post.pointer("/attributes/main_video_url"))
            .filter_map(Value::as_str)
            .filter(|link| self.is_video_link(link))
            .map(str::to_string)
            .collect()
    }

    /// Whether `link` points at one of the known third-party video hosts
    pub fn is_video_link(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        self.video_hosts
            .iter()
            .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
    }

    fn is_api_host(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) if !self.api_host.is_empty() => {
                host == self.api_host || host.ends_with(&format!(".{}", self.api_host))
            }
            _ => false,
        }
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ClassificationRules {
        ClassificationRules::new(&PlatformConfig::default())
    }

    #[test]
    fn test_media_on_user_content_host() {
        let rules = rules();
        assert_eq!(
            rules.classify_url("https://c10.patreonusercontent.com/4/e30/post/123/abc.mp3?token=x"),
            Classification::Media
        );
        assert_eq!(
            rules.classify_url("https://c10.patreonusercontent.com/post/123/clip.MP4"),
            Classification::Media
        );
        assert_eq!(
            rules.classify_url("https://cdn.other.com/post/123/clip.mp4"),
            Classification::Unmatched
        );
    }

    #[test]
    fn test_image_asset() {
        let rules = rules();
        assert_eq!(
            rules.classify_url(
                "https://c10.patreonusercontent.com/3/patreon-media/p/post/123/deadbeef/1.jpg?x=1"
            ),
            Classification::Image
        );
        assert_eq!(
            rules.classify_url("https://c10.patreonusercontent.com/3/patreon-media/p/user/9/a.png"),
            Classification::Unmatched
        );
    }

    #[test]
    fn test_api_endpoints() {
        let rules = rules();
        assert_eq!(
            rules.classify_url("https://www.patreon.com/api/campaigns/42/posts?page=2"),
            Classification::ListingApi
        );
        assert_eq!(
            rules.classify_url("https://www.patreon.com/api/posts/123?include=media"),
            Classification::PostApi
        );
        assert_eq!(
            rules.classify_url("https://www.patreon.com/api/posts/123/comments"),
            Classification::Unmatched
        );
        assert_eq!(
            rules.classify_url("https://evil.example.com/api/posts/123"),
            Classification::Unmatched
        );
        assert!(Classification::ListingApi.needs_body());
        assert!(!Classification::Media.needs_body());
    }

    #[test]
    fn test_listing_body_yields_video_links() {
        let rules = rules();
        let body = r#"{"data":[
            {"attributes":{"main_video_url":"https://www.youtube.com/watch?v=abc"}},
            {"attributes":{"main_video_url":"https://vimeo.com/123"}},
            {"attributes":{"main_video_url":"https://example.com/video"}},
            {"attributes":{"title":"no video"}}
        ]}"#;
        let response = ObservedResponse::with_body(
            "https://www.patreon.com/api/campaigns/42/posts",
            body,
        );

        assert_eq!(
            rules.classify(&response),
            vec![
                ResourceEvent::ThirdPartyLink("https://www.youtube.com/watch?v=abc".to_string()),
                ResourceEvent::ThirdPartyLink("https://vimeo.com/123".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_post_body() {
        let rules = rules();
        let response = ObservedResponse::with_body(
            "https://www.patreon.com/api/posts/77",
            r#"{"data":{"attributes":{"main_video_url":"https://youtu.be/xyz"}}}"#,
        );
        assert_eq!(
            rules.classify(&response),
            vec![ResourceEvent::ThirdPartyLink("https://youtu.be/xyz".to_string())]
        );
    }

    #[test]
    fn test_invalid_json_is_ignored() {
        let rules = rules();
        let response =
            ObservedResponse::with_body("https://www.patreon.com/api/posts/77", "<html>oops");
        assert!(rules.classify(&response).is_empty());

        let no_body = ObservedResponse::new("https://www.patreon.com/api/posts/77");
        assert!(rules.classify(&no_body).is_empty());
    }

    #[test]
    fn test_is_video_link() {
        let rules = rules();
        assert!(rules.is_video_link("https://www.youtube.com/watch?v=1"));
        assert!(rules.is_video_link("https://m.youtube.com/watch?v=1"));
        assert!(rules.is_video_link("https://player.vimeo.com/video/1"));
        assert!(!rules.is_video_link("https://notyoutube.com/watch?v=1"));
        assert!(!rules.is_video_link("not a url"));
    }
}
