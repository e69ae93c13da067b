//! Building a [`Post`] from one candidate: fetch the page, extract, finish the description.

use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html};
use tracing::{debug, instrument, warn};

use crate::extract::{Summary, extract, summarize};
use crate::fetch::Fetch;
use crate::ingest::Candidate;
use crate::media::resolve_image_src;
use crate::models::{ContentItem, Post};
use crate::profile::{ProfileError, SiteProfile};
use crate::utils::{decode_entities, truncate_for_log};

/// Build posts for `candidates`, at most `concurrency` at a time.
///
/// Candidates that fail to produce a post are skipped; the rest keep their
/// input order.
pub async fn build_posts<F: Fetch>(
    fetcher: &F,
    profile: &SiteProfile,
    candidates: Vec<Candidate>,
    concurrency: usize,
) -> Vec<Post> {
    stream::iter(candidates)
        .map(|candidate| build_post(fetcher, profile, candidate))
        .buffered(concurrency.max(1))
        .filter_map(|post| std::future::ready(post))
        .collect()
        .await
}

/// Fetch one article and turn it into a finished post.
///
/// Returns `None` when the page cannot be fetched, the body or content
/// container is missing, or no description can be found.
#[instrument(level = "info", skip_all, fields(url = %candidate.link))]
pub async fn build_post<F: Fetch>(fetcher: &F, profile: &SiteProfile, candidate: Candidate) -> Option<Post> {
    let summary = prepare_description(profile, &candidate.description);
    let mut post = Post::new(
        profile.id.as_str(),
        candidate.title,
        summary.description,
        candidate.published,
        candidate.link,
        candidate.image,
    );

    let html = match fetcher.get(&post.url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Article fetch failed; skipping");
            return None;
        }
    };

    let page = match parse_article(profile, &html, &summary.sentences) {
        Ok(Some(page)) => page,
        Ok(None) => {
            debug!("Article has no content container; skipping");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Article could not be parsed; skipping");
            return None;
        }
    };

    post.items = page.items;
    if post.image.is_none() {
        post.image = page.lead_image;
    }

    if !finalize_description(profile, &mut post) {
        debug!(title = %truncate_for_log(&post.title, 80), "No usable description; skipping");
        return None;
    }

    debug!(items = post.items.len(), "Built post");
    Some(post)
}

/// What the engine found on an article page.
#[derive(Debug)]
struct ArticlePage {
    items: Vec<ContentItem>,
    lead_image: Option<String>,
}

/// Locate the body and content containers and run the extraction engine.
///
/// `Ok(None)` means a structural anchor is missing, which is not an error.
fn parse_article(
    profile: &SiteProfile,
    html: &str,
    sentences: &[String],
) -> Result<Option<ArticlePage>, ProfileError> {
    let document = Html::parse_document(html);

    let body_selector = profile.selector(&profile.body_selector)?;
    let Some(body) = document.select(&body_selector).next() else {
        return Ok(None);
    };

    let lead_image = match &profile.lead_image_selector {
        Some(css) => {
            let selector = profile.selector(css)?;
            body.select(&selector).next().and_then(|img| {
                resolve_image_src(
                    img,
                    profile.lazy_image_attr.as_deref(),
                    &profile.image_placeholders,
                    &profile.base_url,
                )
            })
        }
        None => None,
    };

    let content_selector = profile.selector(&profile.content_selector)?;
    let Some(content) = body.select(&content_selector).next() else {
        return Ok(None);
    };
    let root = match &profile.content_ancestor {
        Some(tag) => match closest(content, tag) {
            Some(ancestor) => ancestor,
            None => return Ok(None),
        },
        None => content,
    };

    Ok(Some(ArticlePage {
        items: extract(root, profile, sentences),
        lead_image,
    }))
}

/// `el` itself or its nearest ancestor element named `tag`.
fn closest<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| candidate.value().name() == tag)
}

/// Clean up the feed description and split it for deduplication.
pub fn prepare_description(profile: &SiteProfile, raw: &str) -> Summary {
    if profile.description_from_body {
        return summarize("");
    }
    if profile.trim_truncated_description {
        return summarize(&trim_truncated(&decode_entities(raw)));
    }
    summarize(raw)
}

/// Cut a description ending in `[…]` back to its last complete sentence.
fn trim_truncated(description: &str) -> String {
    let Some(marker) = description.find("[…]") else {
        return description.to_string();
    };
    let head = &description[..marker];
    match head.rfind('.') {
        Some(dot) => head[..=dot].trim().to_string(),
        None => head.trim().to_string(),
    }
}

/// Backfill the description from the body when needed.
///
/// Returns `false` if the post ends up without a description.
fn finalize_description(profile: &SiteProfile, post: &mut Post) -> bool {
    if profile.description_from_body || post.description.trim().is_empty() {
        if let Some(text) = post.take_first_text() {
            post.description = strip_dateline(profile, text);
        }
    }
    !post.description.trim().is_empty()
}

fn strip_dateline(profile: &SiteProfile, text: String) -> String {
    match &profile.description_dateline_marker {
        Some(marker) => match text.find(marker.as_str()) {
            Some(pos) => text[pos + marker.len()..].trim().to_string(),
            None => text,
        },
        None => text,
    }
}
