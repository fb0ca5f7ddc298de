use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use sessionkit_common::error::ErrorClassification;
use tracing::debug;

use crate::error::AuthError;
use crate::traits::{HttpBody, HttpRequest, HttpResponse, HttpTransport};

/// [`HttpTransport`] backed by `reqwest`, retrying requests that never
/// reached the server.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, AuthError> {
        Self::builder().build()
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    fn to_reqwest(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match &request.body {
            HttpBody::Empty => builder,
            HttpBody::Form(fields) => builder.form(fields),
            HttpBody::Json(value) => builder.json(value),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let attempts = self.max_attempts.max(1);
        let method = request.method.clone();
        let url = request.url.clone();

        for attempt in 0..attempts {
            debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

            match self.to_reqwest(&request).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    debug!(attempt = attempt + 1, %method, %url, status, "received HTTP response");
                    let body = response.text().await?;
                    return Ok(HttpResponse { status, body });
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %url, error = %err, "HTTP request failed");
                    let failure = AuthError::from(err);

                    if attempt + 1 < attempts && failure.is_retryable() {
                        let delay = self.backoff_delay(attempt + 1);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }

                    return Err(failure);
                }
            }
        }

        Err(AuthError::Transport("transport exhausted retries without producing a result".into()))
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 2,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    ///
    /// Only connection failures are retried; a request that reached the
    /// provider is never replayed since authorization codes are single-use.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, AuthError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build()?;

        Ok(ReqwestTransport {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use url::Url;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::builder()
            .base_backoff(Duration::from_millis(10))
            .user_agent("sessionkit-tests")
            .build()
            .expect("transport")
    }

    #[tokio::test]
    async fn sends_form_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/api/auth/token", server.uri())).unwrap();
        let request = HttpRequest::form(url, vec![("grant_type".into(), "refresh_token".into())]);
        let response = transport().send(request).await.expect("response");

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn returns_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/api/graphql", server.uri())).unwrap();
        let request = HttpRequest::json(url, serde_json::json!({})).header("Authorization", "Bearer abc");
        let response = transport().send(request).await.expect("response");

        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn connection_failure_is_retryable_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/token")).unwrap();
        let result = transport().send(HttpRequest::form(url, Vec::new())).await;

        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::Unreachable(_)));
        assert!(err.is_retryable());
    }
}
