//! Embedded media recognition.
//!
//! [`parse_all`] collects candidate URLs from `<iframe src=...>` markup and from bare
//! `http(s)://` tokens, then normalizes each one into a provider-specific embeddable URL. URLs
//! that do not parse, or that no provider claims, are dropped without error.
//!
//! Providers are tried in a fixed order and the first match wins: YouTube, Vimeo, Bilibili, then
//! a generic fallback for URLs that already look embeddable.
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use url::{ParseError, Url};

use crate::{
    error::PageweaveError,
    properties::{MediaCandidate, MediaOwner, MediaProvider},
    store::MediaRepository,
};

static IFRAME_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<iframe[^>]*?src\s*=\s*['"]([^'"]+)['"][^>]*?>"#)
        .expect("Pattern explicitly specified.")
});
static BARE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(https?://[^\s)"'>]+)"#).expect("Pattern explicitly specified.")
});
static BILIBILI_BVID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^BV[0-9a-zA-Z]{10}$").expect("Pattern explicitly specified."));

const URI_EXCLUDED: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];
const YOUTUBE_EMBED: &str = "https://www.youtube.com/embed/";
const VIMEO_EMBED: &str = "https://player.vimeo.com/video/";
const BILIBILI_PLAYER: &str = "https://player.bilibili.com/player.html";

/// Candidate URLs in discovery order: iframe sources first, then bare URLs, without duplicates.
pub fn candidate_urls(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::<String>::new();
    let iframe_srcs = IFRAME_SRC
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));
    let bare_urls = BARE_URL
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    iframe_srcs
        .chain(bare_urls)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}

/// Recognize and normalize every media URL in `text`.
pub fn parse_all(text: &str) -> Vec<MediaCandidate> {
    candidate_urls(text)
        .iter()
        .filter_map(|url| normalize(url))
        .collect()
}

/// Replace `owner`'s stored media references with the ones recognized in `content`.
///
/// The previous set is always removed, even when `content` yields no candidates, and the new
/// set is numbered from zero in discovery order. Returns the number of stored references.
pub async fn sync_media<R: MediaRepository>(
    repo: &mut R,
    owner: MediaOwner,
    content: &str,
) -> Result<usize, PageweaveError> {
    let candidates = parse_all(content);
    let removed = repo.delete_media(owner).await?;
    if !candidates.is_empty() {
        repo.insert_media(owner, &candidates).await?;
    }
    tracing::debug!(
        "[sync_media] {}: replaced {} media references with {}",
        owner,
        removed,
        candidates.len()
    );
    Ok(candidates.len())
}

/// Normalize a single URL, or `None` if it does not parse or no provider matches.
pub fn normalize(url: &str) -> Option<MediaCandidate> {
    let parsed = match parse_url(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::trace!("Dropping unparseable media url {:?}: {}", url, e);
            return None;
        }
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();

    let candidate = youtube(url, &host, &parsed)
        .or_else(|| vimeo(url, &host, &parsed))
        .or_else(|| bilibili(url, &host, &parsed))
        .or_else(|| generic_iframe(url));
    if candidate.is_none() {
        tracing::trace!("No media provider matched {:?}", url);
    }
    candidate
}

/// Parse a candidate as a strict RFC 3986 URI reference. Whitespace and the characters URIs
/// never carry unescaped are rejected up front, since the WHATWG parser would silently
/// percent-encode them.
///
/// Scheme-relative sources (`//player.example.com/...`) are common in embed snippets; they are
/// inspected as https but keep their original text as the source URL.
fn parse_url(url: &str) -> Result<Url, PageweaveError> {
    if let Some(bad) = url
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || URI_EXCLUDED.contains(c))
    {
        return Err(PageweaveError::Serialization(format!(
            "Invalid URL: illegal character {bad:?}"
        )));
    }
    let parsed = match Url::parse(url) {
        Err(ParseError::RelativeUrlWithoutBase) if url.starts_with("//") => {
            Url::parse(&format!("https:{url}"))
        }
        other => other,
    }?;
    Ok(parsed)
}

fn youtube(url: &str, host: &str, parsed: &Url) -> Option<MediaCandidate> {
    if host.contains("youtube.com") {
        let video_id = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
        if let Some(video_id) = video_id.filter(|v| !v.trim().is_empty()) {
            return Some(MediaCandidate::new(
                MediaProvider::YouTube,
                url,
                format!("{YOUTUBE_EMBED}{video_id}"),
            ));
        }
        if parsed.path().starts_with("/embed/") {
            return Some(MediaCandidate::new(MediaProvider::YouTube, url, url));
        }
    }
    if host.contains("youtu.be") {
        let video_id = parsed.path().strip_prefix('/').unwrap_or_default();
        if !video_id.is_empty() {
            return Some(MediaCandidate::new(
                MediaProvider::YouTube,
                url,
                format!("{YOUTUBE_EMBED}{video_id}"),
            ));
        }
    }
    None
}

fn vimeo(url: &str, host: &str, parsed: &Url) -> Option<MediaCandidate> {
    if !host.contains("vimeo.com") {
        return None;
    }
    let first_segment = parsed
        .path()
        .strip_prefix('/')
        .and_then(|path| path.split('/').next())
        .unwrap_or_default();
    if is_all_digits(first_segment) {
        return Some(MediaCandidate::new(
            MediaProvider::Vimeo,
            url,
            format!("{VIMEO_EMBED}{first_segment}"),
        ));
    }
    if host.contains("player.vimeo.com") {
        return Some(MediaCandidate::new(MediaProvider::Vimeo, url, url));
    }
    None
}

fn bilibili(url: &str, host: &str, parsed: &Url) -> Option<MediaCandidate> {
    if !host.contains("bilibili.com") {
        return None;
    }
    if host == "player.bilibili.com" {
        return Some(MediaCandidate::new(MediaProvider::Bilibili, url, url));
    }
    let video_id = parsed
        .path()
        .strip_prefix("/video/")
        .and_then(|rest| rest.split('/').next())?;
    if BILIBILI_BVID.is_match(video_id) {
        return Some(MediaCandidate::new(
            MediaProvider::Bilibili,
            url,
            format!("{BILIBILI_PLAYER}?bvid={video_id}"),
        ));
    }
    match video_id.strip_prefix("av") {
        Some(aid) if is_all_digits(aid) => Some(MediaCandidate::new(
            MediaProvider::Bilibili,
            url,
            format!("{BILIBILI_PLAYER}?aid={aid}"),
        )),
        _ => None,
    }
}

fn generic_iframe(url: &str) -> Option<MediaCandidate> {
    let lowered = url.to_lowercase();
    if lowered.contains("embed") || lowered.contains("player") {
        Some(MediaCandidate::new(MediaProvider::Iframe, url, url))
    } else {
        None
    }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
