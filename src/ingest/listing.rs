//! Paginated HTML listing indexing.
//!
//! Some sources have no feed, only a topic listing split into pages
//! `?page=0..=N`. The number of the last page is read from the pager on the
//! first page. Pages are walked in order and their rows built into posts
//! until [`SiteProfile::max_items`] posts have been built across all pages.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::Fetch;
use crate::ingest::{Candidate, IngestError, article};
use crate::media::absolute_url;
use crate::models::Post;
use crate::profile::{ListingSource, ProfileError, SiteProfile};
use crate::utils::normalize_text;

static PAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]page=(\d+)").unwrap());

/// Rows and pager information of one listing page.
#[derive(Debug)]
struct ListingPage {
    rows: Vec<Candidate>,
    last_page: Option<usize>,
}

/// Walk the listing pages and build posts until `max_items` are collected.
///
/// A missing pager on the first page is a configuration error. A failing
/// later page is logged and skipped. Links already seen on an earlier page
/// are ignored.
#[instrument(level = "info", skip_all, fields(url = %listing.url))]
pub async fn ingest<F: Fetch>(
    fetcher: &F,
    profile: &SiteProfile,
    listing: &ListingSource,
    concurrency: usize,
    posts: &mut Vec<Post>,
) -> Result<(), IngestError> {
    let first = fetcher.get(listing.url.as_str()).await?;
    let page = parse_listing(profile, listing, &first)?;
    let last_page = page.last_page.ok_or_else(|| IngestError::MissingPager {
        url: listing.url.to_string(),
    })?;
    info!(last_page, "Read listing pager");

    let mut seen = HashSet::new();
    let mut added = 0usize;
    let mut rows = page.rows;

    for n in 0..=last_page {
        if n > 0 {
            let url = page_url(&listing.url, n);
            rows = match fetcher.get(&url).await {
                Ok(html) => parse_listing(profile, listing, &html)?.rows,
                Err(e) => {
                    warn!(page = n, error = %e, "Listing page fetch failed; moving on");
                    continue;
                }
            };
        }

        let fresh: Vec<Candidate> = rows
            .drain(..)
            .filter(|row| seen.insert(row.link.clone()))
            .collect();
        debug!(page = n, rows = fresh.len(), added, "Listing page indexed");

        let mut pending = fresh.into_iter();
        while added < profile.max_items {
            let batch: Vec<Candidate> = pending.by_ref().take(profile.max_items - added).collect();
            if batch.is_empty() {
                break;
            }
            let built = article::build_posts(fetcher, profile, batch, concurrency).await;
            added += built.len();
            posts.extend(built);
        }

        if added >= profile.max_items {
            break;
        }
    }

    info!(added, "Listing walk finished");
    Ok(())
}

/// Extract article rows and the last page number from a listing page.
fn parse_listing(
    profile: &SiteProfile,
    listing: &ListingSource,
    html: &str,
) -> Result<ListingPage, ProfileError> {
    let document = Html::parse_document(html);
    let row_sel = profile.selector(&listing.row_selector)?;
    let title_sel = profile.selector(&listing.title_selector)?;
    let description_sel = profile.selector(&listing.description_selector)?;
    let link_sel = profile.selector(&listing.link_selector)?;
    let pager_sel = profile.selector(&listing.pager_last_selector)?;

    let rows = document
        .select(&row_sel)
        .filter_map(|row| {
            let link = row
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| absolute_url(href, &profile.base_url))?;
            let text = |sel: &Selector| {
                row.select(sel)
                    .next()
                    .map(|el| normalize_text(&el.text().collect::<String>()))
                    .unwrap_or_default()
            };
            Some(Candidate {
                title: text(&title_sel),
                description: text(&description_sel),
                published: None,
                link,
                image: None,
            })
        })
        .collect();

    let last_page = document
        .select(&pager_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| PAGE_RE.captures(href))
        .and_then(|caps| caps[1].parse().ok());

    Ok(ListingPage { rows, last_page })
}

/// URL of listing page `n`: `base` with its `page` parameter replaced and no fragment.
fn page_url(base: &Url, n: usize) -> String {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| &**key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut url = base.clone();
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &n.to_string());
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_source;
    use crate::ingest::tests::{FakeFetcher, article, profile};

    const FEED: &str = "{ kind: listing, url: \"https://example.com/all\", row_selector: \".row\", \
        title_selector: \".title\", description_selector: \".body\", link_selector: \".title a\", \
        pager_last_selector: \".pager .pager-last > a\" }";

    fn listing_page(slugs: &[&str], last: Option<usize>) -> String {
        let rows: String = slugs
            .iter()
            .map(|s| {
                format!(
                    "<div class=\"row\"><h2 class=\"title\"><a href=\"/node/{s}\">Title {s}</a></h2>\
                     <div class=\"body\">About {s}.</div></div>"
                )
            })
            .collect();
        let pager = last
            .map(|n| {
                format!("<ul class=\"pager\"><li class=\"pager-last\"><a href=\"/all?page={n}\">»</a></li></ul>")
            })
            .unwrap_or_default();
        format!("<html><body><div class=\"rows\">{rows}</div>{pager}</body></html>")
    }

    fn with_articles(mut fetcher: FakeFetcher, slugs: &[&str]) -> FakeFetcher {
        for s in slugs {
            fetcher = fetcher.with(&format!("https://example.com/node/{s}"), &article(&["Body."]));
        }
        fetcher
    }

    #[tokio::test]
    async fn test_pagination_stops_at_max_items_and_skips_duplicates() {
        let fetcher = FakeFetcher::default()
            .with("https://example.com/all", &listing_page(&["a", "b"], Some(2)))
            .with("https://example.com/all?page=1", &listing_page(&["b", "c", "d"], Some(2)))
            .with("https://example.com/all?page=2", &listing_page(&["e"], Some(2)));
        let fetcher = with_articles(fetcher, &["a", "b", "c", "d", "e"]);
        let p = profile(FEED, "    max_items: 3\n");

        let posts = ingest_source(&fetcher, &p, 1).await;
        let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/node/a",
                "https://example.com/node/b",
                "https://example.com/node/c"
            ]
        );
        assert_eq!(posts[0].title, "Title a");
        assert_eq!(posts[0].description, "About a.");
        assert!(posts[0].published.is_none());
        assert_eq!(
            fetcher.requests(),
            vec![
                "https://example.com/all",
                "https://example.com/node/a",
                "https://example.com/node/b",
                "https://example.com/all?page=1",
                "https://example.com/node/c",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_articles_do_not_count_towards_limit() {
        let fetcher = FakeFetcher::default()
            .with("https://example.com/all", &listing_page(&["gone", "a"], Some(1)))
            .with("https://example.com/all?page=1", &listing_page(&["b", "c"], Some(1)));
        let fetcher = with_articles(fetcher, &["a", "b", "c"]);
        let p = profile(FEED, "    max_items: 2\n");

        let posts = ingest_source(&fetcher, &p, 2).await;
        let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/node/a", "https://example.com/node/b"]);
    }

    #[tokio::test]
    async fn test_missing_later_page_is_skipped() {
        let fetcher = FakeFetcher::default()
            .with("https://example.com/all", &listing_page(&["a"], Some(2)))
            .with("https://example.com/all?page=2", &listing_page(&["c"], Some(2)));
        let fetcher = with_articles(fetcher, &["a", "c"]);
        let p = profile(FEED, "");

        let posts = ingest_source(&fetcher, &p, 2).await;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].url, "https://example.com/node/c");
    }

    #[tokio::test]
    async fn test_missing_pager_aborts_source() {
        let fetcher = FakeFetcher::default().with("https://example.com/all", &listing_page(&["a"], None));
        let fetcher = with_articles(fetcher, &["a"]);
        let p = profile(FEED, "");

        assert!(ingest_source(&fetcher, &p, 2).await.is_empty());
        assert_eq!(fetcher.requests(), vec!["https://example.com/all"]);
    }

    #[test]
    fn test_parse_listing_reads_last_page() {
        let p = profile(FEED, "");
        let crate::profile::FeedSource::Listing(listing) = &p.feed else {
            panic!("expected listing feed");
        };
        let page = parse_listing(&p, listing, &listing_page(&["x"], Some(17))).unwrap();
        assert_eq!(page.last_page, Some(17));
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].link, "https://example.com/node/x");
    }

    #[test]
    fn test_page_url() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(
            page_url(&url("http://vidsboku.com/all/topics"), 3),
            "http://vidsboku.com/all/topics?page=3"
        );
        assert_eq!(
            page_url(&url("https://example.com/list?sort=new"), 1),
            "https://example.com/list?sort=new&page=1"
        );
    }

    #[test]
    fn test_page_url_replaces_page_and_drops_fragment() {
        let base = Url::parse("https://example.com/list?page=0&sort=new#top").unwrap();
        assert_eq!(page_url(&base, 2), "https://example.com/list?sort=new&page=2");
    }
}
