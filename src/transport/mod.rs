//! Transport abstractions.
//!
//! Two host primitives are modelled here: an XMLHttpRequest-style request
//! object ([`XmlHttpRequest`]) that reports progress through events, and a
//! fetch-style one-shot function ([`FetchTransport`]) that resolves to a
//! [`FetchResponse`]. The interceptors wrap these traits and implement them
//! again, so application code cannot tell a wrapped transport from a bare one.

mod http;
pub mod mock;

pub use http::ReqwestFetch;

use crate::context::Headers;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Transport-level failures. These are passed to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request aborted")]
    Aborted,

    #[error("request timed out")]
    Timeout,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("body has already been consumed")]
    BodyUsed,

    #[error("failed to decode body: {0}")]
    Decode(String),
}

// =============================================================================
// XMLHttpRequest-style objects
// =============================================================================

/// Request object lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// Events a request object dispatches to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ReadyStateChange,
    LoadStart,
    Progress,
    Load,
    Error,
    Abort,
    Timeout,
    LoadEnd,
}

/// A dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XhrEvent {
    pub kind: EventKind,
    pub ready_state: ReadyState,
}

/// Structured response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(JsonValue),
    Bytes(Vec<u8>),
}

/// Listener callback. The second argument is the event target.
pub type EventListener = Box<dyn FnMut(&XhrEvent, &dyn XhrTarget) + Send>;

/// Readable members of a request object.
pub trait XhrTarget {
    fn ready_state(&self) -> ReadyState;

    /// HTTP status, 0 before headers arrive or after a network error.
    fn status(&self) -> u16;

    fn status_text(&self) -> String;

    fn response_header(&self, name: &str) -> Option<String>;

    fn all_response_headers(&self) -> String;

    fn response_text(&self) -> String;

    fn response(&self) -> ResponseBody;
}

/// An XMLHttpRequest-style request object.
pub trait XmlHttpRequest: XhrTarget + Send {
    fn open(&mut self, method: &str, url: &str) -> Result<(), TransportError>;

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError>;

    fn send(&mut self, body: Option<String>) -> Result<(), TransportError>;

    fn abort(&mut self);

    /// Register a listener. Listeners run in registration order.
    fn add_event_listener(&mut self, kind: EventKind, listener: EventListener);
}

/// Creates request objects; the host's `new XMLHttpRequest()`.
pub trait XhrFactory: Send + Sync {
    fn create(&self) -> Box<dyn XmlHttpRequest>;
}

// =============================================================================
// fetch-style transport
// =============================================================================

/// A request descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.to_string(),
            ..Default::default()
        }
    }
}

/// First argument of a fetch call: a plain address or a request descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInput {
    Url(String),
    Request(Request),
}

impl RequestInput {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Request(request) => &request.url,
        }
    }
}

impl From<&str> for RequestInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<Request> for RequestInput {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

/// Optional second argument of a fetch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Option<Headers>,
    pub body: Option<String>,
}

impl RequestInit {
    pub fn method(method: &str) -> Self {
        Self {
            method: Some(method.to_string()),
            ..Default::default()
        }
    }
}

/// A fetch reply.
///
/// Body readers consume the body; a second read fails with
/// [`TransportError::BodyUsed`].
#[async_trait]
pub trait FetchResponse: Send {
    fn status(&self) -> u16;

    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    fn status_text(&self) -> &str;

    fn headers(&self) -> &Headers;

    fn url(&self) -> &str;

    fn body_used(&self) -> bool;

    async fn bytes(&mut self) -> Result<Vec<u8>, TransportError>;

    async fn text(&mut self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn json(&mut self) -> Result<JsonValue, TransportError> {
        let text = self.text().await?;
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// The host's fetch function.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<Box<dyn FetchResponse>, TransportError>;
}

/// A fully buffered reply, the equivalent of `new Response(body, init)`.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: u16,
    status_text: String,
    headers: Headers,
    url: String,
    body: Option<String>,
}

impl BufferedResponse {
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Headers,
        url: impl Into<String>,
        body: String,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            url: url.into(),
            body: Some(body),
        }
    }

    fn take_body(&mut self) -> Result<String, TransportError> {
        self.body.take().ok_or(TransportError::BodyUsed)
    }
}

#[async_trait]
impl FetchResponse for BufferedResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn body_used(&self) -> bool {
        self.body.is_none()
    }

    async fn bytes(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.take_body()?.into_bytes())
    }

    async fn text(&mut self) -> Result<String, TransportError> {
        self.take_body()
    }
}
