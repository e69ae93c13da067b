//! Feed ingestion: from a source's feed or listing to finished [`Post`]s.
//!
//! Each source follows the same two-phase pattern:
//!
//! 1. **Indexing**: discover candidate articles from the RSS feed ([`rss`]) or
//!    from a paginated HTML listing ([`listing`])
//! 2. **Building**: fetch every candidate's page, locate the content
//!    container and run the extraction engine ([`article`])
//!
//! Per-article failures (fetch errors, missing containers, empty
//! descriptions) drop that article only. A configuration problem (bad
//! selector, unreadable feed, listing without pager) aborts the source but
//! keeps whatever was already collected.

pub mod article;
pub mod listing;
pub mod rss;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::fetch::{Fetch, FetchError};
use crate::models::Post;
use crate::profile::{FeedSource, ProfileError, SiteProfile};

/// Reasons a whole source run is aborted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unreadable feed {url}: {source}")]
    Feed {
        url: String,
        #[source]
        source: quick_xml::de::DeError,
    },
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("listing page {url} has no pagination marker")]
    MissingPager { url: String },
}

/// An article discovered in a feed or listing, before its page is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub description: String,
    pub published: Option<DateTime<FixedOffset>>,
    pub link: String,
    pub image: Option<String>,
}

/// Run one source end to end.
///
/// Never fails: errors are logged and the posts collected so far are
/// returned. At most `concurrency` article pages are in flight at once and
/// the result keeps feed order.
#[instrument(level = "info", skip_all, fields(source = %profile.id))]
pub async fn ingest_source<F: Fetch>(fetcher: &F, profile: &SiteProfile, concurrency: usize) -> Vec<Post> {
    let mut posts = Vec::new();
    let outcome = match &profile.feed {
        FeedSource::Rss { url, skip } => {
            rss::ingest(fetcher, profile, url, *skip, concurrency, &mut posts).await
        }
        FeedSource::Listing(listing) => {
            listing::ingest(fetcher, profile, listing, concurrency, &mut posts).await
        }
    };

    if let Err(e) = outcome {
        error!(error = %e, collected = posts.len(), "Source run aborted");
    }
    info!(count = posts.len(), "Ingested source");
    posts
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::profile::parse_table;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory [`Fetch`] serving canned documents; unknown URLs are 404.
    #[derive(Debug, Default)]
    pub(crate) struct FakeFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetch for FakeFetcher {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    /// Single-profile table with the shared test header and `extra` fields.
    pub(crate) fn profile(feed: &str, extra: &str) -> SiteProfile {
        let yaml = format!(
            "sites:\n  - id: test\n    base_url: https://example.com\n    feed: {feed}\n    body_selector: article\n    content_selector: .text\n{extra}"
        );
        parse_table(&yaml).unwrap().remove(0)
    }

    pub(crate) fn article(paragraphs: &[&str]) -> String {
        let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
        format!("<html><body><article><div class=\"text\">{body}</div></article></body></html>")
    }

    #[tokio::test]
    async fn test_ingest_source_survives_missing_feed() {
        let fetcher = FakeFetcher::default();
        let p = profile("{ kind: rss, url: \"https://example.com/rss\" }", "");
        let posts = ingest_source(&fetcher, &p, 4).await;
        assert!(posts.is_empty());
        assert_eq!(fetcher.requests(), vec!["https://example.com/rss"]);
    }
}
