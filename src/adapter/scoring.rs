//! Candidate scoring and confidence classification.

use crate::model::{ResultLink, ServiceKind};

/// Score at or above which a match is verified.
pub const HIGH_THRESHOLD: f64 = 0.6;

/// Score below which a match is flagged unavailable.
pub const LOW_THRESHOLD: f64 = 0.3;

/// Maximum number of candidates considered per search.
pub const QUERY_LIMIT: usize = 10;

/// A search hit on a target service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
}

impl Candidate {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Collapses whitespace and lowercases.
#[must_use]
pub fn normalize_search_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case-insensitive Sørensen-Dice similarity over character bigrams.
#[must_use]
pub fn similarity(query: &str, title: &str) -> f64 {
    strsim::sorensen_dice(&normalize_search_text(query), &normalize_search_text(title))
}

/// The highest-scoring candidate among the first [`QUERY_LIMIT`].
///
/// Ties keep the earliest candidate.
#[must_use]
pub fn best_match<I>(query: &str, candidates: I) -> Option<(Candidate, f64)>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut best: Option<(Candidate, f64)> = None;
    for candidate in candidates.into_iter().take(QUERY_LIMIT) {
        let score = similarity(query, &candidate.title);
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Builds the [`ResultLink`] for a scored candidate.
#[must_use]
pub fn classify(service: ServiceKind, url: impl Into<String>, score: f64) -> ResultLink {
    let is_unavailable = score < LOW_THRESHOLD;
    ResultLink {
        target_service: service,
        url: url.into(),
        is_verified: score >= HIGH_THRESHOLD,
        is_unavailable: is_unavailable.then_some(true),
    }
}

/// Scores `candidates` against `query` and classifies the winner.
#[must_use]
pub fn resolve<I>(service: ServiceKind, query: &str, candidates: I) -> Option<ResultLink>
where
    I: IntoIterator<Item = Candidate>,
{
    let (candidate, score) = best_match(query, candidates)?;
    Some(classify(service, candidate.url, score))
}
