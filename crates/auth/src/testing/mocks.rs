//! Mock HTTP transport
//!
//! Responses are matched by URL path first (sequences, then fixed routes)
//! and otherwise served from a FIFO queue. Every request is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::AuthError;
use crate::traits::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<HttpResponse>,
    routes: HashMap<String, HttpResponse>,
    sequences: HashMap<String, VecDeque<HttpResponse>>,
    failures: VecDeque<String>,
}

/// Scripted transport that records every request
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unrouted request
    pub fn push_response(&self, status: u16, body: &str) {
        self.script.lock().queue.push_back(HttpResponse::new(status, body));
    }

    /// Answer every request to `path` with the same response
    pub fn add_response(&self, path: &str, status: u16, body: &str) {
        self.script.lock().routes.insert(path.to_string(), HttpResponse::new(status, body));
    }

    /// Answer successive requests to `path` with `responses` in order
    ///
    /// Once the sequence is exhausted, fixed routes and the queue apply.
    pub fn add_response_sequence(&self, path: &str, responses: Vec<(u16, &str)>) {
        let sequence =
            responses.into_iter().map(|(status, body)| HttpResponse::new(status, body)).collect();
        self.script.lock().sequences.insert(path.to_string(), sequence);
    }

    /// Fail the next request with a transport error
    pub fn push_failure(&self, message: &str) {
        self.script.lock().failures.push_back(message.to_string());
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests sent to `path`
    #[must_use]
    pub fn request_count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|request| request.url.path() == path).count()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    fn respond(&self, path: &str) -> Result<HttpResponse, AuthError> {
        let mut script = self.script.lock();
        if let Some(message) = script.failures.pop_front() {
            return Err(AuthError::Transport(message));
        }
        if let Some(response) = script.sequences.get_mut(path).and_then(VecDeque::pop_front) {
            return Ok(response);
        }
        if let Some(response) = script.routes.get(path) {
            return Ok(response.clone());
        }
        script
            .queue
            .pop_front()
            .ok_or_else(|| AuthError::Transport(format!("No response configured for {path}")))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let path = request.url.path().to_string();
        self.requests.lock().push(request);
        self.respond(&path)
    }
}
