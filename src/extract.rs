//! The content-extraction engine.
//!
//! [`extract`] walks the child nodes of an article's content container and
//! turns them into an ordered list of [`ContentItem`]s. The walk is
//! depth-first and pre-order, bounded by [`SiteProfile::max_depth`], and
//! stops for good once a node matches the profile's cut marker. Everything
//! site-specific (which tags are containers, which carry text, how linked
//! images are read) comes from the profile; the engine itself has no notion
//! of individual sites.
//!
//! Paragraphs that merely restate the feed description are dropped. The
//! description is reduced to at most two sentences by [`summarize`] and those
//! sentences are threaded through the walk.

use std::collections::HashSet;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Selector};
use tracing::{debug, trace};

use crate::media::{absolute_url, extract_video_id, resolve_image_src};
use crate::models::ContentItem;
use crate::profile::{LinkedImage, SiteProfile};
use crate::utils::{decode_entities, normalize_text};

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static LINKED_IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("a > img").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("source").unwrap());

/// Feed description reduced for storage and deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// The description to store on the post.
    pub description: String,
    /// Sentences body paragraphs are compared against.
    pub sentences: Vec<String>,
}

/// Decode and split a feed description on `". "`.
///
/// When more than two sentences come out, only the first two are kept and
/// the stored description becomes `"s1. s2."`.
///
/// # Examples
///
/// ```ignore
/// let summary = summarize("First. Second. Third.");
/// assert_eq!(summary.description, "First. Second.");
/// assert_eq!(summary.sentences, vec!["First", "Second"]);
/// ```
pub fn summarize(raw: &str) -> Summary {
    let decoded = normalize_text(&decode_entities(raw));
    let sentences: Vec<String> = decoded
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if sentences.len() <= 2 {
        return Summary {
            description: decoded,
            sentences,
        };
    }

    let sentences = sentences[..2].to_vec();
    let mut description = sentences.join(". ");
    if !description.ends_with(['.', '!', '?', '…']) {
        description.push('.');
    }
    Summary {
        description,
        sentences,
    }
}

/// Walk the child nodes of `root` and collect content items.
///
/// `summary` holds the retained description sentences; text nodes restating
/// them are suppressed. Calling this twice on the same subtree with the same
/// profile yields the same items.
pub fn extract(root: ElementRef<'_>, profile: &SiteProfile, summary: &[String]) -> Vec<ContentItem> {
    let engine = Engine { profile, summary };
    let mut cx = Traversal::default();
    engine.walk_children(root, profile.max_depth, profile.bare_text_nodes, &mut cx);
    debug!(
        profile = %profile.id,
        items = cx.items.len(),
        stopped = cx.stopped,
        "Extraction finished"
    );
    cx.items
}

/// Mutable state of one extraction call.
#[derive(Debug, Default)]
struct Traversal {
    /// Set once the cut marker is seen; every pending sibling is skipped.
    stopped: bool,
    /// `<img>` nodes already handled; each one yields at most one item.
    seen_images: HashSet<NodeId>,
    items: Vec<ContentItem>,
}

impl Traversal {
    fn push(&mut self, item: Option<ContentItem>) {
        if let Some(item) = item {
            self.items.push(item);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Quote,
    Container,
    TextCarrier,
    Heading,
    Image,
    Video,
    Frame,
    Link,
    List,
    Table,
    Other,
}

struct Engine<'p> {
    profile: &'p SiteProfile,
    summary: &'p [String],
}

impl Engine<'_> {
    fn classify(&self, name: &str) -> NodeKind {
        let p = self.profile;
        let listed = |tags: &[String]| tags.iter().any(|t| t == name);
        if name == p.quote_tag {
            NodeKind::Quote
        } else if listed(&p.container_tags) {
            NodeKind::Container
        } else if listed(&p.text_tags) {
            NodeKind::TextCarrier
        } else if listed(&p.heading_tags) {
            NodeKind::Heading
        } else {
            match name {
                "img" => NodeKind::Image,
                "video" => NodeKind::Video,
                "iframe" => NodeKind::Frame,
                "a" => NodeKind::Link,
                "ul" | "ol" => NodeKind::List,
                "table" => NodeKind::Table,
                _ => NodeKind::Other,
            }
        }
    }

    /// Visit the children of `parent`, each with `remaining` depth.
    fn walk_children(&self, parent: ElementRef<'_>, remaining: usize, bare_text: bool, cx: &mut Traversal) {
        for child in parent.children() {
            if cx.stopped {
                break;
            }
            match child.value() {
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.walk(el, remaining, cx);
                    }
                }
                Node::Text(text) if bare_text && remaining > 0 => {
                    if !self.restates_summary(text) {
                        cx.push(ContentItem::text(text));
                    }
                }
                _ => {}
            }
        }
    }

    fn walk(&self, el: ElementRef<'_>, remaining: usize, cx: &mut Traversal) {
        if cx.stopped {
            return;
        }
        let node = el.value();
        let class = node.attr("class").unwrap_or("");

        if self.profile.is_excluded(class) {
            trace!(tag = node.name(), class, "Skipping excluded subtree");
            return;
        }
        if self.profile.is_cut_marker(node.id().unwrap_or(""), class) {
            trace!(tag = node.name(), class, "Cut marker reached");
            cx.stopped = true;
            return;
        }
        if remaining == 0 {
            return;
        }
        let remaining = remaining - 1;

        if let Some(sentinel) = &self.profile.share_sentinel {
            if text_of(el) == *sentinel {
                return;
            }
        }

        match self.classify(node.name()) {
            NodeKind::Quote => cx.push(ContentItem::quote(&text_of(el))),
            NodeKind::Container => self.container(el, remaining, cx),
            NodeKind::TextCarrier => self.text_carrier(el, remaining, cx),
            NodeKind::Heading => cx.push(ContentItem::text(&text_of(el))),
            NodeKind::Image => self.image(el, cx),
            NodeKind::Video => {
                let id = el
                    .select(&SOURCE)
                    .next()
                    .and_then(|source| source.value().attr("src"))
                    .and_then(extract_video_id);
                cx.push(id.and_then(ContentItem::video));
            }
            NodeKind::Frame => {
                let id = node.attr("src").and_then(extract_video_id);
                cx.push(id.and_then(ContentItem::video));
            }
            NodeKind::Link => self.link(el, remaining, cx),
            NodeKind::List => self.list(el, cx),
            NodeKind::Table if self.profile.scan_table_links => self.table(el, cx),
            NodeKind::Table | NodeKind::Other => {}
        }
    }

    fn container(&self, el: ElementRef<'_>, remaining: usize, cx: &mut Traversal) {
        if let Some(media) = &self.profile.media_container_class {
            if el.value().classes().any(|c| c == media) {
                self.first_image(el, cx);
                return;
            }
        }
        self.walk_children(el, remaining, false, cx);
    }

    fn text_carrier(&self, el: ElementRef<'_>, remaining: usize, cx: &mut Traversal) {
        if let Some(media) = &self.profile.media_container_class {
            let wrapped = el
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|d| d.value().classes().any(|c| c == media));
            if let Some(wrapper) = wrapped {
                self.first_image(wrapper, cx);
                return;
            }
        }

        // Emitted ahead of the text, even when the text itself is suppressed.
        for img in el.select(&LINKED_IMG) {
            self.image(img, cx);
        }

        let text = text_of(el);
        if !self.restates_summary(&text) {
            cx.push(ContentItem::text(&text));
        }

        if self.profile.recurse_text_children {
            self.walk_children(el, remaining, false, cx);
        }
    }

    fn image(&self, img: ElementRef<'_>, cx: &mut Traversal) {
        if !cx.seen_images.insert(img.id()) {
            return;
        }
        cx.push(self.image_src(img).and_then(ContentItem::image));
    }

    fn image_src(&self, img: ElementRef<'_>) -> Option<String> {
        let p = self.profile;
        resolve_image_src(
            img,
            p.lazy_image_attr.as_deref(),
            &p.image_placeholders,
            &p.base_url,
        )
    }

    fn first_image(&self, el: ElementRef<'_>, cx: &mut Traversal) {
        if let Some(img) = el.select(&IMG).next() {
            self.image(img, cx);
        }
    }

    fn link(&self, el: ElementRef<'_>, remaining: usize, cx: &mut Traversal) {
        let p = self.profile;
        let target = el
            .value()
            .attr("href")
            .and_then(|href| absolute_url(href, &p.base_url));

        if let Some(img) = el.select(&IMG).next() {
            let as_image = cx.seen_images.contains(&img.id())
                || match p.linked_image {
                    LinkedImage::Always => true,
                    LinkedImage::SameTarget => target.is_none() || target == self.image_src(img),
                };
            if as_image {
                self.image(img, cx);
                return;
            }
        }

        let excluded = p
            .link_exclude_class
            .as_ref()
            .is_some_and(|class| el.value().classes().any(|c| c == class));
        if !excluded {
            cx.push(target.and_then(ContentItem::link));
        }

        if p.recurse_link_children {
            self.walk_children(el, remaining, false, cx);
        }
    }

    /// Flatten a list into one text item, one prefixed line per `<li>`.
    fn list(&self, el: ElementRef<'_>, cx: &mut Traversal) {
        let lines: Vec<String> = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|li| li.value().name() == "li")
            .map(text_of)
            .filter(|line| !line.is_empty())
            .map(|line| format!("{} {}", self.profile.list_prefix, line))
            .collect();
        if !lines.is_empty() {
            cx.items.push(ContentItem::Text {
                text: lines.join("\n"),
            });
        }
    }

    /// Layout tables: keep images wrapped in followable links.
    fn table(&self, el: ElementRef<'_>, cx: &mut Traversal) {
        for link in el.select(&LINK) {
            if link.value().attr("rel") == Some("nofollow") {
                continue;
            }
            self.first_image(link, cx);
        }
    }

    /// Whether `text` only repeats sentences already in the description.
    ///
    /// The text is split into sentences; each one must equal, or be a
    /// leading substring of, one of the retained summary sentences.
    fn restates_summary(&self, text: &str) -> bool {
        if self.summary.is_empty() {
            return false;
        }
        let text = normalize_text(text);
        let mut pieces = text
            .split(". ")
            .map(|s| s.trim().trim_end_matches('.').trim_end())
            .peekable();
        if pieces.peek().is_none_or(|first| first.is_empty()) {
            return false;
        }
        pieces.all(|piece| {
            !piece.is_empty()
                && self.summary.iter().any(|sentence| {
                    let sentence = sentence.trim_end_matches('.');
                    sentence == piece || sentence.starts_with(piece)
                })
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<String>())
}
