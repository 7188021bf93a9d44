//! Reference token extraction.
//!
//! Page content names other pages with two token grammars:
//!
//! - bracket syntax: `[[ slug ]]`
//! - path syntax: `/pages/slug`
//!
//! Each grammar is a separate pure pass returning position-tagged matches. [`extract_references`]
//! merges them into one position-ordered map and then deduplicates by identifier, keeping the
//! first occurrence.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

static WIKI_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[\s*([a-zA-Z0-9\-_./]+)\s*\]\]").expect("Pattern explicitly specified.")
});
static PAGES_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/pages/([a-zA-Z0-9\-_./]+)").expect("Pattern explicitly specified.")
});

/// A reference token found in page content. `position` is the byte offset where the whole token
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub position: usize,
    pub identifier: String,
}

fn valid_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn scan(pattern: &Regex, text: &str) -> Vec<(usize, String)> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let ident = caps.get(1)?;
            valid_identifier(ident.as_str()).map(|id| (whole.start(), id))
        })
        .collect()
}

/// Matches of the `[[ slug ]]` grammar, in text order.
pub fn wiki_link_matches(text: &str) -> Vec<(usize, String)> {
    scan(&WIKI_LINK, text)
}

/// Matches of the `/pages/slug` grammar, in text order.
pub fn page_path_matches(text: &str) -> Vec<(usize, String)> {
    scan(&PAGES_PATH, text)
}

/// Extract every referenced identifier from `text`, ordered by first occurrence and free of
/// duplicates.
pub fn extract_references(text: &str) -> Vec<Reference> {
    let mut by_position = BTreeMap::<usize, String>::new();
    for (position, identifier) in wiki_link_matches(text)
        .into_iter()
        .chain(page_path_matches(text))
    {
        by_position.insert(position, identifier);
    }

    let mut seen = BTreeSet::<String>::new();
    by_position
        .into_iter()
        .filter_map(|(position, identifier)| {
            if seen.insert(identifier.clone()) {
                Some(Reference {
                    position,
                    identifier,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Convenience form of [`extract_references`] that drops positions.
pub fn extract_identifiers(text: &str) -> Vec<String> {
    extract_references(text)
        .into_iter()
        .map(|r| r.identifier)
        .collect()
}
