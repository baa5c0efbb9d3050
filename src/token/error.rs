//! Error types for OAuth token acquisition.

use thiserror::Error;

use crate::http::HttpError;
use crate::model::ServiceKind;

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint could not be reached or rejected the request.
    #[error(
        "failed to fetch {service} access token: {source}\n  Suggestion: Check the {service} client id and secret"
    )]
    Fetch {
        service: ServiceKind,
        #[source]
        source: HttpError,
    },

    /// The token endpoint answered with an unusable token.
    #[error("{service} token endpoint returned an invalid token: {reason}")]
    InvalidToken { service: ServiceKind, reason: String },

    /// No credentials were configured for the service.
    #[error(
        "no credentials configured for {service}\n  Suggestion: Set the client id and secret in the environment or config file"
    )]
    MissingCredentials { service: ServiceKind },
}

impl TokenError {
    #[must_use]
    pub fn fetch(service: ServiceKind, source: HttpError) -> Self {
        Self::Fetch { service, source }
    }

    #[must_use]
    pub fn invalid(service: ServiceKind, reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            service,
            reason: reason.into(),
        }
    }
}
