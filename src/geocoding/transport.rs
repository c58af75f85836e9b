//! Outbound HTTP seam. The client builds a [`Request`], a [`Transport`]
//! performs the GET and hands back status plus body.

use std::time::Duration;
use thiserror::Error;

/// One GET request against the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Endpoint URL without query string.
    pub url: String,
    /// Unencoded query parameters, in send order.
    pub params: Vec<(&'static str, String)>,
    pub user_agent: String,
}

impl Request {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// URL with encoded parameters and the API key masked, for logs.
    pub fn redacted_url(&self) -> String {
        let query = self
            .params
            .iter()
            .map(|(k, v)| {
                if *k == "key" {
                    format!("{}=***", k)
                } else {
                    format!("{}={}", k, urlencode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }
}

/// Provider response: any HTTP status, body as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below HTTP: DNS, connect, TLS, timeout, unreadable body.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Performs a single GET. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn get(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Blocking transport on a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &Request) -> Result<Response, TransportError> {
        let mut req = self
            .agent
            .get(&request.url)
            .set("User-Agent", &request.user_agent)
            .set("Accept", "application/json");
        for (k, v) in &request.params {
            req = req.query(k, v);
        }

        let response = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(ureq::Error::Transport(t)) => return Err(TransportError(t.to_string())),
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| TransportError(format!("failed to read response body: {}", e)))?;
        Ok(Response { status, body })
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
