//! Mock forwarder for tests: scripted replies per endpoint, no network.

use publer_types::{ForwardError, Forwarder, Headers, QueryParams};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Json(Value),
    Error(ForwardError),
    /// Panics inside the call, simulating an unexpected local failure.
    Panic(String),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<MockReply>,
    calls: usize,
    bodies: Vec<Value>,
}

/// Forwarder that replays scripted replies.
///
/// Replies for an endpoint are consumed in order; the last one repeats forever. Calls to an
/// endpoint with no script return a 404 `Api` error.
#[derive(Default)]
pub struct MockForwarder {
    gets: Mutex<HashMap<String, Script>>,
    posts: Mutex<HashMap<String, Script>>,
    headers_seen: Mutex<Vec<Headers>>,
}

impl MockForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(self, endpoint: &str, replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self::script(&self.gets, endpoint, replies);
        self
    }

    pub fn on_post(self, endpoint: &str, replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self::script(&self.posts, endpoint, replies);
        self
    }

    /// Number of GET calls made to `endpoint`.
    pub fn get_calls(&self, endpoint: &str) -> usize {
        Self::calls(&self.gets, endpoint)
    }

    /// Number of POST calls made to `endpoint`.
    pub fn post_calls(&self, endpoint: &str) -> usize {
        Self::calls(&self.posts, endpoint)
    }

    /// Bodies posted to `endpoint`, oldest first.
    pub fn posted_bodies(&self, endpoint: &str) -> Vec<Value> {
        let guard = self.posts.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .get(endpoint)
            .map(|s| s.bodies.clone())
            .unwrap_or_default()
    }

    /// Headers of the most recent call, GET or POST.
    pub fn last_headers(&self) -> Option<Headers> {
        let guard = self.headers_seen.lock().unwrap_or_else(|p| p.into_inner());
        guard.last().cloned()
    }

    fn record_headers(&self, headers: &Headers) {
        let mut guard = self.headers_seen.lock().unwrap_or_else(|p| p.into_inner());
        guard.push(headers.clone());
    }

    fn script(
        table: &Mutex<HashMap<String, Script>>,
        endpoint: &str,
        replies: impl IntoIterator<Item = MockReply>,
    ) {
        let mut guard = table.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .entry(endpoint.to_string())
            .or_default()
            .replies
            .extend(replies);
    }

    fn calls(table: &Mutex<HashMap<String, Script>>, endpoint: &str) -> usize {
        let guard = table.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(endpoint).map(|s| s.calls).unwrap_or(0)
    }

    fn next(
        table: &Mutex<HashMap<String, Script>>,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError> {
        let reply = {
            let mut guard = table.lock().unwrap_or_else(|p| p.into_inner());
            let script = guard.entry(endpoint.to_string()).or_default();
            script.calls += 1;
            if let Some(body) = body {
                script.bodies.push(body.clone());
            }
            if script.replies.len() > 1 {
                script.replies.pop_front()
            } else {
                script.replies.front().cloned()
            }
        };
        match reply {
            Some(MockReply::Json(v)) => Ok(v),
            Some(MockReply::Error(e)) => Err(e),
            Some(MockReply::Panic(msg)) => panic!("{}", msg),
            None => Err(ForwardError::Api {
                status: 404,
                message: format!("no mock reply for {}", endpoint),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Forwarder for MockForwarder {
    async fn get(
        &self,
        endpoint: &str,
        headers: &Headers,
        _params: Option<&QueryParams>,
    ) -> Result<Value, ForwardError> {
        self.record_headers(headers);
        Self::next(&self.gets, endpoint, None)
    }

    async fn post(
        &self,
        endpoint: &str,
        headers: &Headers,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError> {
        self.record_headers(headers);
        Self::next(&self.posts, endpoint, body)
    }
}
