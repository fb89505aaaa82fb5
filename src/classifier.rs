//! Manifest link classification
//!
//! Turns raw manifest text (plain lines or simple markup) into an ordered,
//! deduplicated sequence of [`WorkItem`]s. Two extraction strategies run and
//! their results are merged: an anchor-tag scan for markup manifests and a
//! per-line URL scan for plain text. Deduplication is by exact case-sensitive
//! URL string, first occurrence wins.
//!
//! This is a pure function with no side effects; a front-end can swap in its
//! own heuristics as long as it produces the same `WorkItem` shape.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::{MediaKind, WorkItem};

/// Fallback label when neither the manifest nor the URL yields one
const DEFAULT_LABEL: &str = "Media File";

/// Extensions that force the video kind
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi", ".mov", ".flv", ".webm", ".m3u8"];

/// Extensions that force the document kind
const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".txt", ".epub", ".zip",
];

/// Domain/path keywords that suggest a streaming video source
const VIDEO_KEYWORDS: &[&str] = &["video", "stream", "hls", "master", "playlist", "amazonaws"];

#[allow(clippy::expect_used)]
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("anchor regex is valid")
});

#[allow(clippy::expect_used)]
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("url regex is valid"));

#[allow(clippy::expect_used)]
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid"));

/// Classify raw manifest text into work items
///
/// Order follows the manifest; anchors are scanned before plain-text lines so
/// a markup manifest keeps its anchor labels even when the same URLs also
/// appear as bare text.
pub fn classify(text: &str) -> Vec<WorkItem> {
    let mut items = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (url, label) in scan_anchors(text) {
        push_item(&mut items, &mut seen, url, label);
    }
    for (url, label) in scan_lines(text) {
        push_item(&mut items, &mut seen, url, label);
    }

    tracing::info!(items = items.len(), "classified manifest");
    items
}

fn push_item(
    items: &mut Vec<WorkItem>,
    seen: &mut HashSet<String>,
    url: String,
    label: Option<String>,
) {
    if seen.contains(&url) || !accept_url(&url) {
        return;
    }
    let kind = infer_kind(&url);
    let label = label
        .filter(|l| !l.is_empty())
        .or_else(|| label_from_url(&url))
        .unwrap_or_else(|| DEFAULT_LABEL.to_string());
    tracing::debug!(%url, %kind, "accepted manifest link");
    seen.insert(url.clone());
    items.push(WorkItem { url, kind, label });
}

/// Markup strategy: collect `<a href>` targets with their inner text as label
fn scan_anchors(text: &str) -> Vec<(String, Option<String>)> {
    ANCHOR_RE
        .captures_iter(text)
        .map(|cap| {
            let url = cap[1].trim().to_string();
            let inner = TAG_RE.replace_all(&cap[2], " ");
            let label = inner.split_whitespace().collect::<Vec<_>>().join(" ");
            let label = (!label.is_empty()).then_some(label);
            (url, label)
        })
        .collect()
}

/// Plain-text strategy: scan each line for URLs, label = text before the URL
fn scan_lines(text: &str) -> Vec<(String, Option<String>)> {
    let mut found = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(first) = URL_RE.find(line) else {
            continue;
        };
        let label = line[..first.start()]
            .trim_end_matches([':', '-', '|', '>'])
            .trim();
        let label = (!label.is_empty()).then(|| label.to_string());
        for m in URL_RE.find_iter(line) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
            found.push((url.to_string(), label.clone()));
        }
    }
    found
}

/// A URL is fetchable only over http(s); script, mail, phone, and fragment
/// references are rejected
fn accept_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Infer the media kind from extension and keyword lists
///
/// Unmatched URLs default to [`MediaKind::Document`]: a wrongly-typed document
/// still relays as a generic file, while a wrongly-typed video would be pushed
/// through the extraction engine and fail.
fn infer_kind(url: &str) -> MediaKind {
    let lower = url.to_lowercase();
    if VIDEO_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return MediaKind::Video;
    }
    if DOCUMENT_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        return MediaKind::Document;
    }
    if VIDEO_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return MediaKind::Video;
    }
    MediaKind::Document
}

/// Infer a label from the URL's final path segment, percent-decoded
fn label_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    let stem = decoded
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&decoded);
    let label = stem.replace(['_', '-'], " ").trim().to_string();
    (!label.is_empty()).then_some(label)
}
