//! Candidate filtering and ranking
//!
//! Search results are noisy (compilations, tribute albums, deluxe editions),
//! so candidates are filtered on artist containment and title-token overlap,
//! then ranked by release country and date. Everything here is deterministic:
//! identical input lists always produce identical output order.

use crate::types::CatalogCandidate;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Minimum |A ∩ B| / max(|A|, |B|) for two titles to match
pub const MIN_TITLE_OVERLAP: f64 = 0.5;

/// Release countries ranked ahead of all others
pub const PREFERRED_COUNTRIES: [&str; 3] = ["US", "GB", "XW"];

/// Case-insensitive substring containment in either direction
pub fn artist_matches(query: &str, candidate: &str) -> bool {
    let query = query.trim().to_lowercase();
    let candidate = candidate.trim().to_lowercase();
    if query.is_empty() || candidate.is_empty() {
        return false;
    }
    candidate.contains(&query) || query.contains(&candidate)
}

/// Lower-cased whitespace tokens longer than one character
fn title_tokens(title: &str) -> HashSet<String> {
    title
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(|token| token.to_lowercase())
        .collect()
}

/// Token overlap ratio in `0.0..=1.0`
pub fn title_overlap(a: &str, b: &str) -> f64 {
    let a = title_tokens(a);
    let b = title_tokens(b);
    let denominator = a.len().max(b.len());
    if denominator == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / denominator as f64
}

pub fn titles_match(a: &str, b: &str) -> bool {
    title_overlap(a, b) >= MIN_TITLE_OVERLAP
}

/// Keep candidates matching both artist and title
///
/// Falls back to the unfiltered list when nothing matches, so a noisy search
/// still yields something to probe.
pub fn filter_candidates(
    artist: &str,
    title: &str,
    candidates: Vec<CatalogCandidate>,
) -> Vec<CatalogCandidate> {
    let matching: Vec<CatalogCandidate> = candidates
        .iter()
        .filter(|c| artist_matches(artist, &c.artist_name) && titles_match(title, &c.title))
        .cloned()
        .collect();

    if matching.is_empty() {
        tracing::debug!(
            artist = %artist,
            title = %title,
            candidates = candidates.len(),
            "No candidate passed the match filter, using unfiltered list"
        );
        candidates
    } else {
        matching
    }
}

fn country_rank(candidate: &CatalogCandidate) -> u8 {
    match candidate.country.as_deref() {
        Some(country) if PREFERRED_COUNTRIES.contains(&country.to_ascii_uppercase().as_str()) => 0,
        _ => 1,
    }
}

/// Ascending date, dateless last
fn compare_dates(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.map(str::trim).filter(|d| !d.is_empty());
    let b = b.map(str::trim).filter(|d| !d.is_empty());
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort: preferred country first, then earliest release date
pub fn rank_candidates(mut candidates: Vec<CatalogCandidate>) -> Vec<CatalogCandidate> {
    candidates.sort_by(|a, b| {
        country_rank(a)
            .cmp(&country_rank(b))
            .then_with(|| compare_dates(a.release_date.as_deref(), b.release_date.as_deref()))
    });
    candidates
}
