//! Media resolvers: image sources, absolute URLs, and embedded video IDs.
//!
//! These helpers never fail loudly. A node whose address cannot be turned
//! into something usable simply resolves to `None` and the extraction engine
//! emits no item for it.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use url::Url;

/// YouTube URL shapes: `watch?v=`, `/embed/`, `/v/`, `/shorts/`, `youtu.be/`.
static YOUTUBE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|v/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .unwrap()
});

/// Resolve `raw` against `base` and accept it only as an http(s) URL with a host.
///
/// The returned string is the serialized [`Url`], so non-ASCII path and query
/// characters come back percent-encoded and IDN hosts in punycode.
///
/// # Examples
///
/// ```ignore
/// let base = Url::parse("https://example.com").unwrap();
/// assert_eq!(absolute_url("/a/b", &base).as_deref(), Some("https://example.com/a/b"));
/// assert_eq!(absolute_url("javascript:void(0)", &base), None);
/// ```
pub fn absolute_url(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let url = base.join(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;
    Some(url.to_string())
}

/// Pick the real address of an `<img>` node.
///
/// Preference order:
/// 1. `src`, unless it is empty, a `data:` URI, or contains one of the
///    `placeholders` (tracking pixels, "no photo" stubs)
/// 2. the lazy-load attribute (`data-lazy-src`, `data-src`, ...)
///
/// The chosen address is made absolute against `base` and percent-encoded.
pub fn resolve_image_src(
    img: ElementRef<'_>,
    lazy_attr: Option<&str>,
    placeholders: &[String],
    base: &Url,
) -> Option<String> {
    let node = img.value();
    let src = node
        .attr("src")
        .map(str::trim)
        .filter(|src| is_real_src(src) && !placeholders.iter().any(|p| src.contains(p.as_str())));

    let chosen = src.or_else(|| {
        lazy_attr
            .and_then(|attr| node.attr(attr))
            .map(str::trim)
            .filter(|src| is_real_src(src))
    })?;

    absolute_url(chosen, base)
}

fn is_real_src(src: &str) -> bool {
    !src.is_empty() && !src.starts_with("data:")
}

/// Extract a YouTube video identifier from an embed, watch or short URL.
///
/// Returns `None` for any other host or shape.
pub fn extract_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID_RE
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
