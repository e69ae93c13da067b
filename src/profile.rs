//! Per-site configuration consumed by the ingestor and the extraction engine.
//!
//! Every supported source is described by one [`SiteProfile`]: where its feed
//! lives, which selectors locate the article body, and which structural
//! quirks the extraction engine has to honor. Profiles are plain data. The
//! built-in table is `config/sites.yaml`, compiled into the binary; a
//! different table can be supplied at runtime with `--config`.
//!
//! # Example
//!
//! ```yaml
//! sites:
//!   - id: example
//!     base_url: https://example.com
//!     feed: { kind: rss, url: https://example.com/rss.xml }
//!     body_selector: article
//!     content_selector: .entry-content
//!     cut_marker_pattern: related-posts
//!     max_depth: 3
//! ```

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Deserializer, de};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};
use url::Url;

/// The profile table shipped with the binary.
const BUILTIN_SITES: &str = include_str!("../config/sites.yaml");

/// Errors raised while loading or validating profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed profile table: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("profile `{profile}`: invalid selector `{selector}`: {reason}")]
    Selector {
        profile: String,
        selector: String,
        reason: String,
    },
    #[error("duplicate profile id `{0}`")]
    Duplicate(String),
}

/// A compiled regular expression read from configuration.
///
/// Deserializes from a string; an empty string is rejected so that a
/// disabled pattern is always spelled as an absent field.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.0.as_str()).finish()
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(de::Error::custom("empty pattern; omit the field instead"));
        }
        Pattern::new(&raw).map_err(de::Error::custom)
    }
}

/// Where a source's candidate articles come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedSource {
    /// An RSS 2.0 document; the first `skip` items are ignored.
    Rss {
        url: String,
        #[serde(default)]
        skip: usize,
    },
    /// A paginated HTML listing of articles.
    Listing(ListingSource),
}

/// Selectors for a paginated HTML listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingSource {
    /// First listing page; further pages carry `page={n}` in the query.
    pub url: Url,
    /// One match per article row.
    pub row_selector: String,
    pub title_selector: String,
    pub description_selector: String,
    /// Anchor whose `href` is the article URL.
    pub link_selector: String,
    /// Anchor of the "last page" pager link carrying `?page=N`.
    pub pager_last_selector: String,
}

/// How an `<a>` wrapping an `<img>` is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedImage {
    /// The wrapped image always wins; no link item is produced.
    Always,
    /// Only a link pointing at the image itself is treated as an image.
    #[default]
    SameTarget,
}

/// Immutable description of one news source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteProfile {
    /// Source identifier, also used as the output file name.
    pub id: String,
    /// Base for resolving relative links and image addresses.
    pub base_url: Url,
    pub feed: FeedSource,

    /// Element holding the whole article page body (title, lead image, text).
    pub body_selector: String,
    /// Element, inside the body, whose child nodes are the extraction roots.
    pub content_selector: String,
    /// Climb from the content match to its closest ancestor with this tag.
    #[serde(default)]
    pub content_ancestor: Option<String>,

    /// Nodes whose `class` matches are skipped with their whole subtree.
    #[serde(default)]
    pub exclude_class_pattern: Option<Pattern>,
    /// Matched against `"{id} {class}"`; the article ends at the first match.
    #[serde(default)]
    pub cut_marker_pattern: Option<Pattern>,

    #[serde(default = "default_quote_tag")]
    pub quote_tag: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub lazy_image_attr: Option<String>,
    #[serde(default = "default_list_prefix")]
    pub list_prefix: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Layout wrappers the engine descends into.
    #[serde(default = "default_container_tags")]
    pub container_tags: Vec<String>,
    /// Paragraph-like text carriers.
    #[serde(default = "default_text_tags")]
    pub text_tags: Vec<String>,
    /// Tags emitted verbatim as text, without deduplication or descent.
    #[serde(default)]
    pub heading_tags: Vec<String>,

    #[serde(default)]
    pub recurse_text_children: bool,
    #[serde(default)]
    pub recurse_link_children: bool,
    #[serde(default)]
    pub linked_image: LinkedImage,
    /// Pull linked images out of layout tables.
    #[serde(default)]
    pub scan_table_links: bool,
    /// Emit text nodes sitting directly under the content root.
    #[serde(default)]
    pub bare_text_nodes: bool,

    /// Exact text of a "share this article" widget to skip.
    #[serde(default)]
    pub share_sentinel: Option<String>,
    /// Substrings marking an `src` as a tracking pixel or "no photo" stub.
    #[serde(default = "default_image_placeholders")]
    pub image_placeholders: Vec<String>,
    /// Class of wrappers that hold a single captioned image.
    #[serde(default)]
    pub media_container_class: Option<String>,
    /// Links carrying this class ("read more" buttons) are dropped.
    #[serde(default)]
    pub link_exclude_class: Option<String>,
    /// Lead image inside the body container, used when the feed has none.
    #[serde(default)]
    pub lead_image_selector: Option<String>,

    /// Always take the description from the first body paragraph.
    #[serde(default)]
    pub description_from_body: bool,
    /// Text up to and including this marker is cut from a backfilled description.
    #[serde(default)]
    pub description_dateline_marker: Option<String>,
    /// Cut a feed description ending in `[…]` back to its last full sentence.
    #[serde(default)]
    pub trim_truncated_description: bool,
}

fn default_quote_tag() -> String {
    "blockquote".to_string()
}

fn default_max_depth() -> usize {
    3
}

fn default_list_prefix() -> String {
    "-".to_string()
}

fn default_max_items() -> usize {
    10
}

fn default_container_tags() -> Vec<String> {
    vec!["div".to_string()]
}

fn default_text_tags() -> Vec<String> {
    vec!["p".to_string()]
}

fn default_image_placeholders() -> Vec<String> {
    vec!["1x1.trans.gif".to_string(), "foto.gif".to_string()]
}

#[derive(Debug, Deserialize)]
struct SiteTable {
    sites: Vec<SiteProfile>,
}

impl SiteProfile {
    /// Whether a node with this `class` attribute must be skipped entirely.
    pub fn is_excluded(&self, class: &str) -> bool {
        self.exclude_class_pattern
            .as_ref()
            .is_some_and(|p| p.is_match(class))
    }

    /// Whether a node with this `id`/`class` marks the end of the article.
    pub fn is_cut_marker(&self, id: &str, class: &str) -> bool {
        self.cut_marker_pattern
            .as_ref()
            .is_some_and(|p| p.is_match(&format!("{id} {class}")))
    }

    /// Compile one of this profile's CSS selectors.
    pub fn selector(&self, css: &str) -> Result<Selector, ProfileError> {
        Selector::parse(css).map_err(|e| ProfileError::Selector {
            profile: self.id.clone(),
            selector: css.to_string(),
            reason: e.to_string(),
        })
    }

    /// Check that every selector in the profile compiles.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let mut selectors = vec![self.body_selector.as_str(), self.content_selector.as_str()];
        if let Some(lead) = &self.lead_image_selector {
            selectors.push(lead);
        }
        if let FeedSource::Listing(listing) = &self.feed {
            selectors.extend([
                listing.row_selector.as_str(),
                listing.title_selector.as_str(),
                listing.description_selector.as_str(),
                listing.link_selector.as_str(),
                listing.pager_last_selector.as_str(),
            ]);
        }
        for css in selectors {
            self.selector(css)?;
        }
        Ok(())
    }
}

/// Parse and validate a profile table.
pub fn parse_table(yaml: &str) -> Result<Vec<SiteProfile>, ProfileError> {
    let table: SiteTable = serde_yaml::from_str(yaml)?;
    let mut seen = HashSet::new();
    for profile in &table.sites {
        if !seen.insert(profile.id.as_str()) {
            return Err(ProfileError::Duplicate(profile.id.clone()));
        }
        profile.validate()?;
    }
    Ok(table.sites)
}

/// The profile table compiled into the binary.
pub fn builtin() -> Result<Vec<SiteProfile>, ProfileError> {
    parse_table(BUILTIN_SITES)
}

/// Load a profile table from a YAML file.
#[instrument(level = "info")]
pub async fn load_file(path: &str) -> Result<Vec<SiteProfile>, ProfileError> {
    let yaml = fs::read_to_string(path).await.map_err(|source| ProfileError::Io {
        path: path.to_string(),
        source,
    })?;
    let sites = parse_table(&yaml)?;
    debug!(count = sites.len(), "Loaded profile table");
    Ok(sites)
}

/// Keep the profiles named in `ids`, in table order; an empty filter keeps all.
///
/// Unknown ids are logged and ignored.
pub fn select(profiles: Vec<SiteProfile>, ids: &[String]) -> Vec<SiteProfile> {
    if ids.is_empty() {
        return profiles;
    }
    for id in ids {
        if !profiles.iter().any(|p| &p.id == id) {
            warn!(source = %id, "Unknown source id; ignoring");
        }
    }
    profiles
        .into_iter()
        .filter(|p| ids.contains(&p.id))
        .collect()
}
