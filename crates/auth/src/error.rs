//! Authorization error taxonomy

use std::time::Duration;

use sessionkit_common::error::{ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Error type for authorization client operations
///
/// The display string is what gets published on the client's error cell,
/// so the user-facing variants keep the provider's wording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No usable token and interactive login was not allowed
    #[error("must_login")]
    UserMustLogin,

    /// Provider returned an error payload (`error_description` or `error`)
    #[error("{0}")]
    Provider(String),

    /// Authorization code arrived but no PKCE verifier is persisted
    #[error("Code verifier was not found (you probably cleared the storage?)")]
    VerifierMissing,

    /// Interactive login attempted from a non-HTTPS location
    #[error("Login requires HTTPS. Please access this site over a secure connection.")]
    HttpsRequired,

    /// Response did not have the expected shape
    #[error("{0}")]
    UnexpectedResponse(String),

    /// Popup closed (or timed out) before delivering a result
    #[error("user_canceled")]
    UserCanceled,

    /// User refused to grant access in the popup
    #[error("user_declined")]
    UserDeclined,

    /// Request headers asked for while no token is held
    #[error("No access token available")]
    NoToken,

    /// Returned `state` does not match the one sent with the authorization
    /// request
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// HTTP transport failure after the request may have reached the server
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Connection could not be established; the request was never delivered
    #[error("HTTP request failed: {0}")]
    Unreachable(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Provider message used when a refresh token is unknown to the server
    pub const REFRESH_TOKEN_NOT_FOUND: &'static str = "Refresh token not found";

    /// Check if this is the expected "interactive login required" signal
    #[must_use]
    pub const fn is_must_login(&self) -> bool {
        matches!(self, Self::UserMustLogin)
    }

    /// Check if the provider rejected the refresh token as unknown
    #[must_use]
    pub fn is_refresh_token_not_found(&self) -> bool {
        matches!(self, Self::Provider(message) if message.starts_with(Self::REFRESH_TOKEN_NOT_FOUND))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(err.to_string())
    }
}

impl ErrorClassification for AuthError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UserMustLogin | Self::UserCanceled | Self::UserDeclined | Self::NoToken => {
                ErrorSeverity::Info
            }
            Self::Transport(_) | Self::Unreachable(_) | Self::Provider(_) => {
                ErrorSeverity::Warning
            }
            Self::StateMismatch => ErrorSeverity::Critical,
            Self::VerifierMissing
            | Self::HttpsRequired
            | Self::UnexpectedResponse(_)
            | Self::Config(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::StateMismatch)
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
