//! Error types for link identification and metadata extraction.

use thiserror::Error;

use crate::http::HttpError;
use crate::model::ServiceKind;

/// Errors raised by the parser set.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No parser recognizes the link.
    #[error(
        "unrecognized link '{link}'\n  Suggestion: Paste a track, album, playlist or artist link from a supported service"
    )]
    UnrecognizedLink { link: String },

    /// The source page was fetched but lacks required fields.
    #[error("no {field} found in {service} page {url}")]
    MetadataNotFound {
        service: ServiceKind,
        url: String,
        field: &'static str,
    },

    /// The source page could not be fetched.
    #[error("failed to fetch {service} page: {source}")]
    Fetch {
        service: ServiceKind,
        #[source]
        source: HttpError,
    },
}

impl ParseError {
    #[must_use]
    pub fn unrecognized(link: &str) -> Self {
        Self::UnrecognizedLink {
            link: link.chars().take(200).collect(),
        }
    }

    #[must_use]
    pub fn missing(service: ServiceKind, url: &str, field: &'static str) -> Self {
        Self::MetadataNotFound {
            service,
            url: url.to_string(),
            field,
        }
    }

    #[must_use]
    pub fn fetch(service: ServiceKind, source: HttpError) -> Self {
        Self::Fetch { service, source }
    }

    /// True for errors that mean the link itself is unusable.
    #[must_use]
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::UnrecognizedLink { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_message_has_suggestion() {
        let err = ParseError::unrecognized("https://example.com/x");
        let msg = err.to_string();
        assert!(msg.contains("unrecognized link 'https://example.com/x'"));
        assert!(msg.contains("Suggestion:"));
        assert!(err.is_unrecognized());
    }

    #[test]
    fn test_unrecognized_truncates_long_links() {
        let long = "x".repeat(500);
        let ParseError::UnrecognizedLink { link } = ParseError::unrecognized(&long) else {
            panic!("wrong variant");
        };
        assert_eq!(link.len(), 200);
    }

    #[test]
    fn test_missing_names_field_and_service() {
        let err = ParseError::missing(ServiceKind::Deezer, "https://www.deezer.com/track/1", "title");
        assert_eq!(
            err.to_string(),
            "no title found in deezer page https://www.deezer.com/track/1"
        );
    }
}
