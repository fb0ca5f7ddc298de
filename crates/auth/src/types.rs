//! Token, user and message types
//!
//! Field names follow the provider's wire format. The persisted token keeps
//! the camel-cased `expirationTime` key so a stored session stays readable
//! by other clients sharing the same medium.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Refresh is due this many milliseconds before `expiration_time`
pub const EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

/// Key under which the popup nests its result in a window message
pub const OAUTH_RESULT_KEY: &str = "weightxrepsOnOAuthResult";

/// Access token with absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,

    /// Missing when the provider does not issue refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub token_type: String,

    /// Milliseconds since the Unix epoch
    #[serde(rename = "expirationTime")]
    pub expiration_time: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Lifetime in seconds as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl Token {
    /// Check whether the token is inside the refresh window at `now_ms`
    ///
    /// ```
    /// use sessionkit_auth::types::Token;
    ///
    /// let token = Token {
    ///     access_token: "a".into(),
    ///     refresh_token: None,
    ///     token_type: "Bearer".into(),
    ///     expiration_time: 1_000_000,
    ///     scope: None,
    ///     expires_in: None,
    /// };
    /// assert!(!token.needs_refresh(699_999));
    /// assert!(token.needs_refresh(700_000));
    /// ```
    #[must_use]
    pub const fn needs_refresh(&self, now_ms: i64) -> bool {
        now_ms >= self.expiration_time.saturating_sub(EXPIRY_SKEW_MS)
    }

    /// Value for the `Authorization` header
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Raw token endpoint response
///
/// Either the token fields or `error`/`error_description` are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`Token`] expiring `expires_in` seconds after `now_ms`
    ///
    /// A missing `expires_in` yields a token that is already due for refresh.
    ///
    /// # Errors
    /// Returns [`AuthError::Provider`] carrying `error_description` (or
    /// `error`) when the provider reported an error, and
    /// [`AuthError::UnexpectedResponse`] when no access token is present.
    pub fn into_token(self, now_ms: i64) -> Result<Token, AuthError> {
        if let Some(error) = self.error {
            return Err(AuthError::Provider(self.error_description.unwrap_or(error)));
        }

        let access_token = self.access_token.ok_or_else(|| {
            AuthError::UnexpectedResponse("Token response is missing access_token".to_string())
        })?;
        let expires_in_ms = self.expires_in.unwrap_or(0).saturating_mul(1000);

        Ok(Token {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiration_time: now_ms.saturating_add(expires_in_ms),
            scope: self.scope,
            expires_in: self.expires_in,
        })
    }
}

/// Authenticated user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Result of an authorization request, delivered through the query string or
/// a popup message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthCodeResult {
    Code {
        code: String,
        #[serde(rename = "token-endpoint", default, skip_serializing_if = "Option::is_none")]
        token_endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
    },
}

impl AuthCodeResult {
    /// Echoed `state` parameter
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Code { state, .. } | Self::Error { state, .. } => state.as_deref(),
        }
    }

    /// Read a result from query pairs; `code` wins over `error`
    pub fn from_query<'a, I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    {
        let mut code = None;
        let mut error = None;
        let mut state = None;
        let mut token_endpoint = None;

        for (key, value) in pairs {
            match key.as_ref() {
                "code" if code.is_none() => code = Some(value.into_owned()),
                "error" if error.is_none() => error = Some(value.into_owned()),
                "state" if state.is_none() => state = Some(value.into_owned()),
                "token-endpoint" if token_endpoint.is_none() => {
                    token_endpoint = Some(value.into_owned());
                }
                _ => {}
            }
        }

        match (code, error) {
            (Some(code), _) if !code.is_empty() => Some(Self::Code { code, token_endpoint, state }),
            (_, Some(error)) if !error.is_empty() => Some(Self::Error { error, state }),
            _ => None,
        }
    }
}

/// Message posted to the host window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    /// Serialized origin of the sender (`scheme://host[:port]`)
    pub origin: String,
    pub data: serde_json::Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: serde_json::Value) -> Self {
        Self { origin: origin.into(), data }
    }

    /// Build the message a popup posts when it finishes
    pub fn oauth_result(origin: impl Into<String>, result: &AuthCodeResult) -> Self {
        let payload = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        Self::new(origin, serde_json::json!({ OAUTH_RESULT_KEY: payload }))
    }

    /// Authorization result carried by this message, if any
    #[must_use]
    pub fn auth_result(&self) -> Option<AuthCodeResult> {
        let payload = self.data.get(OAUTH_RESULT_KEY)?;
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Snapshot of where a client is in its session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No token, nothing pending
    Unauthenticated,
    /// A PKCE verifier is persisted and an authorization code is awaited
    PendingAuthorization,
    /// Interactive login or code exchange in flight
    Authorizing,
    /// Token held, no request in flight
    Authenticated,
    /// Token held and a request (refresh or profile load) in flight
    Refreshing,
    /// Last operation failed with this message
    Error(String),
}

impl SessionState {
    /// Check whether a token is held
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Refreshing)
    }
}
