//! Traits for HTTP and host-environment access
//!
//! These traits decouple the authorization client from the network stack and
//! from the environment that owns the current location, popups and window
//! messages, so both can be replaced in tests.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use url::Url;

use crate::error::AuthError;
use crate::types::WindowMessage;

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `application/json`
    Json(serde_json::Value),
}

/// Outgoing HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl HttpRequest {
    /// POST a form-encoded body
    #[must_use]
    pub fn form(url: Url, fields: Vec<(String, String)>) -> Self {
        Self { method: Method::POST, url, headers: Vec::new(), body: HttpBody::Form(fields) }
    }

    /// POST a JSON body
    #[must_use]
    pub fn json(url: Url, body: serde_json::Value) -> Self {
        Self { method: Method::POST, url, headers: Vec::new(), body: HttpBody::Json(body) }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of a form field, if this is a form request
    #[must_use]
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            HttpBody::Form(fields) => {
                fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
            }
            _ => None,
        }
    }
}

/// Buffered HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    /// Returns [`AuthError::UnexpectedResponse`] if the body is not valid
    /// JSON of the expected shape
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_str(&self.body).map_err(|err| {
            AuthError::UnexpectedResponse(format!(
                "Invalid JSON response (status {}): {err}",
                self.status
            ))
        })
    }
}

/// HTTP transport used for the token and session endpoints
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the response
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    /// Returns [`AuthError::Transport`] when no response was received
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError>;
}

/// Handle to an opened popup window
pub trait PopupWindow: Send + Sync {
    /// Whether the user (or the popup itself) closed the window
    fn is_closed(&self) -> bool;

    /// Close the window if still open
    fn close(&self) {}
}

/// Environment hosting the client: current location, navigation, popups and
/// the window message channel
pub trait BrowserHost: Send + Sync {
    /// Current location, including any query string
    fn location(&self) -> Url;

    /// Replace the current location in history without navigating
    fn replace_location(&self, url: &Url);

    /// Navigate the current page away
    fn navigate(&self, url: &Url);

    /// Screen size in pixels, used to center popups
    fn screen_size(&self) -> (u32, u32);

    /// Open a popup window
    fn open_popup(&self, url: &Url, name: &str, features: &str) -> Box<dyn PopupWindow>;

    /// Subscribe to messages posted to the current window
    ///
    /// Only messages posted after the call are delivered.
    fn subscribe_messages(&self) -> broadcast::Receiver<WindowMessage>;
}
