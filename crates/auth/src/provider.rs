//! Identity provider wire format
//!
//! Builds the authorization URL and the token and session requests, and
//! parses their responses. Nothing here performs I/O.

use serde::Deserialize;
use url::Url;

use crate::error::AuthError;
use crate::traits::{HttpRequest, HttpResponse};
use crate::types::{Token, TokenResponse, User};

const SESSION_OPERATION: &str = "GetSession";
const SESSION_QUERY: &str = "query GetSession {
    getSession {
        user {
            id
            uname
            email
        }
    }
}";

/// Message used when a session response carries no user
pub const UNEXPECTED_SESSION_RESPONSE: &str = "Unexpected server response";

/// Grant sent to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode { code: String, code_verifier: String },
    RefreshToken { refresh_token: String },
}

impl Grant {
    /// `grant_type` form value
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    #[must_use]
    pub const fn is_refresh(&self) -> bool {
        matches!(self, Self::RefreshToken { .. })
    }
}

/// Parameters of one authorization request
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub state: &'a str,
    pub code_challenge: &'a str,
    pub code_challenge_method: &'a str,
    pub scope: &'a str,
}

/// Resolved provider endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    authorize: Url,
    token: Url,
    session: Url,
    origin: String,
}

impl ProviderEndpoints {
    /// Resolve endpoints from the base authorization endpoint
    ///
    /// The token endpoint is `{endpoint}/token`. Without an override the
    /// session endpoint is `endpoint` with its first `auth` replaced by
    /// `graphql`.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if a derived endpoint is not a valid URL
    pub fn resolve(endpoint: &Url, session_override: Option<&Url>) -> Result<Self, AuthError> {
        let base = endpoint.as_str().trim_end_matches('/');
        let token = Url::parse(&format!("{base}/token"))?;
        let session = match session_override {
            Some(url) => url.clone(),
            None => Url::parse(&endpoint.as_str().replacen("auth", "graphql", 1))?,
        };

        Ok(Self {
            authorize: endpoint.clone(),
            token,
            session,
            origin: endpoint.origin().ascii_serialization(),
        })
    }

    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token
    }

    #[must_use]
    pub const fn session_url(&self) -> &Url {
        &self.session
    }

    /// Serialized origin (`scheme://host[:port]`) popup messages must come
    /// from
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Build the authorization URL
    #[must_use]
    pub fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Url {
        let params = [
            ("grant_type", "authorization_code"),
            ("response_type", "code"),
            ("client_id", request.client_id),
            ("redirect_uri", request.redirect_uri),
            ("state", request.state),
            ("code_challenge", request.code_challenge),
            ("code_challenge_method", request.code_challenge_method),
            ("scope", request.scope),
        ];
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = self.authorize.clone();
        url.set_query(Some(&query));
        url
    }

    /// Form request for the token endpoint
    #[must_use]
    pub fn token_request(&self, client_id: &str, grant: &Grant) -> HttpRequest {
        let mut fields = vec![("client_id".to_string(), client_id.to_string())];
        match grant {
            Grant::AuthorizationCode { code, code_verifier } => {
                fields.push(("code".to_string(), code.clone()));
                fields.push(("code_verifier".to_string(), code_verifier.clone()));
            }
            Grant::RefreshToken { refresh_token } => {
                fields.push(("refresh_token".to_string(), refresh_token.clone()));
            }
        }
        fields.push(("grant_type".to_string(), grant.grant_type().to_string()));

        HttpRequest::form(self.token.clone(), fields)
    }

    /// GraphQL session request authenticated with `authorization`
    #[must_use]
    pub fn session_request(&self, authorization: &str) -> HttpRequest {
        let body = serde_json::json!({
            "operationName": SESSION_OPERATION,
            "query": SESSION_QUERY,
        });
        HttpRequest::json(self.session.clone(), body).header("Authorization", authorization)
    }
}

/// Parse a token endpoint response into a [`Token`] received at `now_ms`
///
/// # Errors
/// Returns [`AuthError::Provider`] for provider error payloads and
/// [`AuthError::UnexpectedResponse`] for bodies that are not token JSON
pub fn parse_token_response(response: &HttpResponse, now_ms: i64) -> Result<Token, AuthError> {
    response.json::<TokenResponse>()?.into_token(now_ms)
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    #[serde(default)]
    data: Option<SessionData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(rename = "getSession", default)]
    get_session: Option<SessionPayload>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    #[serde(default)]
    user: Option<User>,
}

/// Parse a session endpoint response
///
/// # Errors
/// Returns [`AuthError::Provider`] with the GraphQL error messages joined by
/// newlines (or the single `error` field), and
/// [`AuthError::UnexpectedResponse`] when no user is present
pub fn parse_session_response(response: &HttpResponse) -> Result<User, AuthError> {
    let envelope: SessionEnvelope = response.json()?;

    if let Some(errors) = envelope.errors {
        let message = errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("\n");
        return Err(AuthError::Provider(message));
    }
    if let Some(error) = envelope.error {
        return Err(AuthError::Provider(error));
    }

    envelope
        .data
        .and_then(|data| data.get_session)
        .and_then(|session| session.user)
        .ok_or_else(|| AuthError::UnexpectedResponse(UNEXPECTED_SESSION_RESPONSE.to_string()))
}

#[cfg(test)]
mod tests {
    //! Unit tests for provider.
    use super::*;
    use crate::traits::HttpBody;

    fn endpoints() -> ProviderEndpoints {
        let endpoint = Url::parse("https://weightxreps.net/api/auth").unwrap();
        ProviderEndpoints::resolve(&endpoint, None).unwrap()
    }

    /// Validates `ProviderEndpoints::resolve` behavior for the derived
    /// endpoints scenario.
    ///
    /// Assertions:
    /// - Confirms the token endpoint appends `/token`.
    /// - Confirms the session endpoint swaps the first `auth` for `graphql`.
    /// - Confirms the origin omits the path.
    #[test]
    fn test_resolve_derives_endpoints() {
        let endpoints = endpoints();

        assert_eq!(endpoints.token_url().as_str(), "https://weightxreps.net/api/auth/token");
        assert_eq!(endpoints.session_url().as_str(), "https://weightxreps.net/api/graphql");
        assert_eq!(endpoints.origin(), "https://weightxreps.net");
    }

    /// Validates `ProviderEndpoints::resolve` behavior for the session
    /// override scenario.
    ///
    /// Assertions:
    /// - Confirms an explicit session endpoint wins over derivation.
    #[test]
    fn test_resolve_session_override() {
        let endpoint = Url::parse("http://127.0.0.1:9000/api/auth").unwrap();
        let session = Url::parse("http://127.0.0.1:9000/gql").unwrap();
        let endpoints = ProviderEndpoints::resolve(&endpoint, Some(&session)).unwrap();

        assert_eq!(endpoints.session_url(), &session);
        assert_eq!(endpoints.origin(), "http://127.0.0.1:9000");
    }

    /// Validates `ProviderEndpoints::authorization_url` behavior for the
    /// query layout scenario.
    ///
    /// Assertions:
    /// - Confirms the parameters appear in order and are percent-encoded.
    #[test]
    fn test_authorization_url_layout() {
        let url = endpoints().authorization_url(&AuthorizationRequest {
            client_id: "my app",
            redirect_uri: "https://app.test/cb",
            state: "inst1",
            code_challenge: "chal",
            code_challenge_method: "S256",
            scope: "not-set",
        });

        assert_eq!(
            url.as_str(),
            "https://weightxreps.net/api/auth?grant_type=authorization_code&response_type=code\
             &client_id=my%20app&redirect_uri=https%3A%2F%2Fapp.test%2Fcb&state=inst1\
             &code_challenge=chal&code_challenge_method=S256&scope=not-set"
        );
    }

    /// Validates `ProviderEndpoints::token_request` behavior for the grant
    /// form scenario.
    ///
    /// Assertions:
    /// - Confirms the code grant carries `code` and `code_verifier`.
    /// - Confirms the refresh grant carries `refresh_token`.
    #[test]
    fn test_token_request_forms() {
        let endpoints = endpoints();

        let code = endpoints.token_request(
            "cid",
            &Grant::AuthorizationCode { code: "XYZ".into(), code_verifier: "ver".into() },
        );
        assert_eq!(code.form_field("client_id"), Some("cid"));
        assert_eq!(code.form_field("grant_type"), Some("authorization_code"));
        assert_eq!(code.form_field("code"), Some("XYZ"));
        assert_eq!(code.form_field("code_verifier"), Some("ver"));

        let refresh =
            endpoints.token_request("cid", &Grant::RefreshToken { refresh_token: "r1".into() });
        assert_eq!(refresh.form_field("grant_type"), Some("refresh_token"));
        assert_eq!(refresh.form_field("refresh_token"), Some("r1"));
        assert_eq!(refresh.form_field("code_verifier"), None);
    }

    /// Validates `ProviderEndpoints::session_request` behavior for the
    /// GraphQL body scenario.
    ///
    /// Assertions:
    /// - Confirms the operation name and bearer header are set.
    #[test]
    fn test_session_request_body() {
        let request = endpoints().session_request("Bearer abc");

        assert_eq!(request.headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
        match request.body {
            HttpBody::Json(body) => {
                assert_eq!(body["operationName"], "GetSession");
                assert!(body["query"].as_str().unwrap().contains("uname"));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    /// Validates `parse_session_response` behavior for the error shapes
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms an errors array is joined with newlines.
    /// - Confirms a single `error` field is used verbatim.
    /// - Confirms a missing user is an unexpected response.
    #[test]
    fn test_parse_session_errors() {
        let errors = HttpResponse::new(200, r#"{"errors":[{"message":"a"},{"message":"b"}]}"#);
        assert_eq!(parse_session_response(&errors), Err(AuthError::Provider("a\nb".into())));

        let single = HttpResponse::new(200, r#"{"error":"expired"}"#);
        assert_eq!(parse_session_response(&single), Err(AuthError::Provider("expired".into())));

        let empty = HttpResponse::new(200, r#"{"data":{"getSession":null}}"#);
        assert_eq!(
            parse_session_response(&empty),
            Err(AuthError::UnexpectedResponse(UNEXPECTED_SESSION_RESPONSE.into()))
        );
    }

    /// Validates `parse_session_response` behavior for the user payload
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the user is decoded with an optional email.
    #[test]
    fn test_parse_session_user() {
        let response = HttpResponse::new(
            200,
            r#"{"data":{"getSession":{"user":{"id":7,"uname":"lifter","email":null}}}}"#,
        );
        let user = parse_session_response(&response).unwrap();

        assert_eq!(user, User { id: 7, uname: "lifter".into(), email: None });
    }
}
