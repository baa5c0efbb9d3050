//! Error types for target-service searches.

use thiserror::Error;

use crate::http::HttpError;
use crate::model::ServiceKind;
use crate::token::TokenError;

/// A failed search on one target service.
///
/// Adapter failures never fail a resolution; the orchestrator logs them and
/// drops the service's link.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The search request failed.
    #[error("{service} search failed: {source}")]
    Http {
        service: ServiceKind,
        #[source]
        source: HttpError,
    },

    /// No access token could be obtained.
    #[error("{service} search needs an access token: {source}")]
    Token {
        service: ServiceKind,
        #[source]
        source: TokenError,
    },

    /// The response did not have the expected shape.
    #[error("{service} search returned an unexpected response: {reason}")]
    Decode { service: ServiceKind, reason: String },

    /// An API key or app id is not configured.
    #[error(
        "{service} search is not configured: missing {what}\n  Suggestion: Set it in the environment or config file"
    )]
    NotConfigured {
        service: ServiceKind,
        what: &'static str,
    },
}

impl AdapterError {
    #[must_use]
    pub fn http(service: ServiceKind, source: HttpError) -> Self {
        Self::Http { service, source }
    }

    #[must_use]
    pub fn token(service: ServiceKind, source: TokenError) -> Self {
        Self::Token { service, source }
    }

    #[must_use]
    pub fn decode(service: ServiceKind, reason: impl Into<String>) -> Self {
        Self::Decode {
            service,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> ServiceKind {
        match self {
            Self::Http { service, .. }
            | Self::Token { service, .. }
            | Self::Decode { service, .. }
            | Self::NotConfigured { service, .. } => *service,
        }
    }
}
