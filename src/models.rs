//! Data models for ingested posts and their extracted body content.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Post`]: A single article with feed metadata and its extracted body
//! - [`ContentItem`]: One typed unit of body content (text, quote, image, video, link)
//!
//! Both types serialize to JSON for the output writer. `ContentItem` is tagged
//! by a `"type"` field so downstream consumers can dispatch on the kind.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_text;

/// A single article as produced by one ingestion run.
///
/// A `Post` starts as a skeleton built from feed fields, receives its
/// [`ContentItem`]s from the extraction engine, and is never modified after
/// it has been appended to a source's result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Identifier of the site profile that produced this post.
    pub source: String,
    /// Article headline.
    pub title: String,
    /// Short summary. Always non-empty once the post is finalized.
    pub description: String,
    /// Publication time, if the feed provided a parseable one.
    pub published: Option<DateTime<FixedOffset>>,
    /// Canonical article URL.
    pub url: String,
    /// Lead image URL.
    pub image: Option<String>,
    /// Body content in document order.
    pub items: Vec<ContentItem>,
}

impl Post {
    /// Create a post skeleton from feed-level fields with an empty body.
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        published: Option<DateTime<FixedOffset>>,
        url: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            source: source.into(),
            title: normalize_text(&title.into()),
            description: description.into(),
            published,
            url: url.into(),
            image,
            items: Vec::new(),
        }
    }

    /// Remove the first [`ContentItem::Text`] from the body and return its text.
    ///
    /// Used to backfill the description when the feed did not supply one.
    pub fn take_first_text(&mut self) -> Option<String> {
        let pos = self
            .items
            .iter()
            .position(|item| matches!(item, ContentItem::Text { .. }))?;
        match self.items.remove(pos) {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One typed unit of extracted body content.
///
/// Every variant carries only the payload relevant to its kind. The
/// constructors return `None` for empty or unusable payloads so callers never
/// emit placeholder items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// A paragraph, heading or flattened list.
    Text { text: String },
    /// A quoted passage.
    Quote { text: String },
    /// An absolute, percent-encoded image URL.
    Image { url: String },
    /// A platform video identifier.
    Video { id: String },
    /// An absolute, validated hyperlink.
    Link { url: String },
}

impl ContentItem {
    /// Text item from raw node text; whitespace is collapsed and trimmed.
    pub fn text(raw: &str) -> Option<Self> {
        non_empty(normalize_text(raw)).map(|text| ContentItem::Text { text })
    }

    /// Quote item from raw node text; whitespace is collapsed and trimmed.
    pub fn quote(raw: &str) -> Option<Self> {
        non_empty(normalize_text(raw)).map(|text| ContentItem::Quote { text })
    }

    pub fn image(url: impl Into<String>) -> Option<Self> {
        non_empty(url.into()).map(|url| ContentItem::Image { url })
    }

    pub fn video(id: impl Into<String>) -> Option<Self> {
        non_empty(id.into()).map(|id| ContentItem::Video { id })
    }

    pub fn link(url: impl Into<String>) -> Option<Self> {
        non_empty(url.into()).map(|url| ContentItem::Link { url })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_item_trims_and_collapses() {
        let item = ContentItem::text("  Hello \n\t world  ").unwrap();
        assert_eq!(
            item,
            ContentItem::Text {
                text: "Hello world".to_string()
            }
        );
    }

    #[test]
    fn test_empty_payloads_yield_no_item() {
        assert!(ContentItem::text("   \n ").is_none());
        assert!(ContentItem::quote("").is_none());
        assert!(ContentItem::image("").is_none());
        assert!(ContentItem::video(" ").is_none());
        assert!(ContentItem::link("").is_none());
    }

    #[test]
    fn test_content_item_serialization_is_tagged() {
        let item = ContentItem::video("dQw4w9WgXcQ").unwrap();
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"type":"video","id":"dQw4w9WgXcQ"}"#);

        let parsed: ContentItem =
            serde_json::from_str(r#"{"type":"link","url":"https://example.com/a"}"#).unwrap();
        assert_eq!(
            parsed,
            ContentItem::Link {
                url: "https://example.com/a".to_string()
            }
        );
    }

    #[test]
    fn test_take_first_text_removes_only_first_text() {
        let mut post = Post::new("test", "Title", "", None, "https://example.com/1", None);
        post.items = vec![
            ContentItem::image("https://example.com/a.jpg").unwrap(),
            ContentItem::text("Lead").unwrap(),
            ContentItem::text("Body").unwrap(),
        ];

        assert_eq!(post.take_first_text().as_deref(), Some("Lead"));
        assert_eq!(post.items.len(), 2);
        assert_eq!(post.items[1], ContentItem::text("Body").unwrap());
    }

    #[test]
    fn test_take_first_text_without_text_items() {
        let mut post = Post::new("test", "Title", "", None, "https://example.com/1", None);
        post.items = vec![ContentItem::link("https://example.com/b").unwrap()];
        assert!(post.take_first_text().is_none());
        assert_eq!(post.items.len(), 1);
    }

    #[test]
    fn test_post_serialization_round_trip_fields() {
        let published = DateTime::parse_from_rfc2822("Tue, 06 May 2025 14:30:00 +0300").unwrap();
        let post = Post::new(
            "vecherka",
            "  Headline  ",
            "Summary.",
            Some(published),
            "https://example.com/news/1",
            Some("https://example.com/lead.jpg".to_string()),
        );
        assert_eq!(post.title, "Headline");

        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains("\"source\":\"vecherka\""));
        assert!(json.contains("2025-05-06T14:30:00+03:00"));

        let back: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(back, post);
    }
}
