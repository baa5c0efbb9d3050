//! Error types for resolution requests.

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::HttpError;
use crate::parser::ParseError;

/// A resolution that could not produce a [`crate::model::SearchResult`].
///
/// Only the source side can fail a resolution; target-service failures are
/// absorbed by the adapter set.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The link could not be identified or its metadata could not be read.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A search id did not decode to a link.
    #[error(
        "Invalid search id '{id}'\n  Suggestion: Use the id from a previous result, or search by link instead"
    )]
    InvalidSearchId { id: String },

    /// Neither a link nor a search id was supplied.
    #[error("No link or search id given\n  Suggestion: Pass a music link, e.g. https://open.spotify.com/track/...")]
    MissingTarget,

    /// The cache backend could not be opened.
    #[error("Cache setup failed: {0}")]
    Cache(#[from] CacheError),

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] HttpError),
}

impl SearchError {
    #[must_use]
    pub fn invalid_search_id(id: impl Into<String>) -> Self {
        Self::InvalidSearchId { id: id.into() }
    }
}

/// A failed call to the link shortening service.
#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("Link shortener request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Link shortener returned no short link for {link}")]
    MissingLink { link: String },
}
