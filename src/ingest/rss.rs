//! RSS 2.0 indexing.
//!
//! The feed is deserialized with `quick-xml`'s serde support into a minimal
//! `rss/channel/item` model; every item with a usable link becomes a
//! [`Candidate`]. Item text may carry markup (CDATA descriptions with `<p>`
//! and `<img>`), so it is flattened to plain text here.

use std::borrow::Cow;

use chrono::DateTime;
use quick_xml::de::from_str;
use scraper::Html;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::fetch::Fetch;
use crate::ingest::{Candidate, IngestError, article};
use crate::media::absolute_url;
use crate::models::Post;
use crate::profile::SiteProfile;
use crate::utils::{decode_entities, normalize_text};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(default)]
    enclosure: Vec<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// Index an RSS feed and build posts for the selected items.
///
/// The first `skip` usable items are ignored and at most
/// [`SiteProfile::max_items`] of the rest are built.
#[instrument(level = "info", skip(fetcher, profile, posts))]
pub async fn ingest<F: Fetch>(
    fetcher: &F,
    profile: &SiteProfile,
    url: &str,
    skip: usize,
    concurrency: usize,
    posts: &mut Vec<Post>,
) -> Result<(), IngestError> {
    let xml = fetcher.get(url).await?;
    let candidates = parse_feed(&xml, &profile.base_url).map_err(|source| IngestError::Feed {
        url: url.to_string(),
        source,
    })?;

    let total = candidates.len();
    let selected: Vec<Candidate> = candidates
        .into_iter()
        .skip(skip)
        .take(profile.max_items)
        .collect();
    info!(total, selected = selected.len(), "Indexed feed");

    posts.extend(article::build_posts(fetcher, profile, selected, concurrency).await);
    Ok(())
}

/// Deserialize a feed document into candidates, in feed order.
fn parse_feed(xml: &str, base: &Url) -> Result<Vec<Candidate>, quick_xml::de::DeError> {
    let rss: Rss = from_str(&with_declaration(xml))?;

    let candidates = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let Some(link) = item.link.as_deref().and_then(|l| absolute_url(l.trim(), base)) else {
                debug!(title = ?item.title, "Feed item without usable link; skipping");
                return None;
            };
            Some(Candidate {
                title: plain_text(item.title.as_deref().unwrap_or_default()),
                description: plain_text(item.description.as_deref().unwrap_or_default()),
                published: item
                    .pub_date
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok()),
                link,
                image: item
                    .enclosure
                    .iter()
                    .filter_map(|e| e.url.as_deref())
                    .find_map(|u| absolute_url(u.trim(), base)),
            })
        })
        .collect();
    Ok(candidates)
}

/// Drop a byte-order mark and make sure the document opens with an XML declaration.
fn with_declaration(xml: &str) -> Cow<'_, str> {
    let xml = xml.trim_start_matches('\u{feff}').trim_start();
    if xml.starts_with("<?xml") {
        Cow::Borrowed(xml)
    } else {
        Cow::Owned(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{xml}"))
    }
}

/// Feed text with any embedded markup reduced to its text content.
///
/// Text without markup may still be double-escaped (`&amp;laquo;`), so its
/// entities are decoded once more.
fn plain_text(raw: &str) -> String {
    if !raw.contains('<') {
        return normalize_text(&decode_entities(raw));
    }
    let fragment = Html::parse_fragment(raw);
    normalize_text(&fragment.root_element().text().collect::<String>())
}
