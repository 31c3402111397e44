//! In-memory transports for tests and demos.
//!
//! [`MockXhr`] completes synchronously inside `send`, dispatching the same
//! event sequence a browser would (`readystatechange` up to `Done`, then
//! `load` or `error`, then `loadend`). [`MockFetch`] resolves immediately.
//! Both record every request they are asked to send.

use super::{
    BufferedResponse, EventKind, EventListener, FetchResponse, FetchTransport, ReadyState,
    Request, RequestInit, RequestInput, ResponseBody, TransportError, XhrEvent, XhrFactory,
    XhrTarget, XmlHttpRequest,
};
use crate::context::{status_text, Headers};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Requests seen by a mock transport, in send order.
pub type RequestLog = Arc<Mutex<Vec<Request>>>;

/// A canned server reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: String,
}

impl MockReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A reply with `Content-Type: application/json`.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).with_header("Content-Type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// What a mock transport does when a request is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Reply(MockReply),
    Fail(TransportError),
}

impl From<MockReply> for MockOutcome {
    fn from(reply: MockReply) -> Self {
        Self::Reply(reply)
    }
}

// =============================================================================
// XMLHttpRequest mock
// =============================================================================

/// Scripted request object.
pub struct MockXhr {
    outcome: MockOutcome,
    log: RequestLog,
    ready_state: ReadyState,
    request: Request,
    status: u16,
    status_text: String,
    headers: Headers,
    body: Option<String>,
    listeners: Vec<(EventKind, EventListener)>,
}

impl MockXhr {
    pub fn new(outcome: impl Into<MockOutcome>) -> Self {
        Self::with_log(outcome, RequestLog::default())
    }

    pub fn with_log(outcome: impl Into<MockOutcome>, log: RequestLog) -> Self {
        Self {
            outcome: outcome.into(),
            log,
            ready_state: ReadyState::Unsent,
            request: Request::default(),
            status: 0,
            status_text: String::new(),
            headers: Headers::new(),
            body: None,
            listeners: Vec::new(),
        }
    }

    /// Requests this object has sent.
    pub fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }

    fn dispatch(&mut self, kind: EventKind) {
        let event = XhrEvent {
            kind,
            ready_state: self.ready_state,
        };
        let mut listeners = std::mem::take(&mut self.listeners);
        for (listen_kind, listener) in listeners.iter_mut() {
            if *listen_kind == kind {
                listener(&event, &*self);
            }
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    fn set_state(&mut self, state: ReadyState) {
        self.ready_state = state;
        self.dispatch(EventKind::ReadyStateChange);
    }

    fn finish_with(&mut self, kind: EventKind) {
        self.status = 0;
        self.status_text.clear();
        self.set_state(ReadyState::Done);
        self.dispatch(kind);
        self.dispatch(EventKind::LoadEnd);
    }
}

impl XhrTarget for MockXhr {
    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> String {
        self.status_text.clone()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.headers.get(name)
    }

    fn all_response_headers(&self) -> String {
        self.headers.to_raw()
    }

    fn response_text(&self) -> String {
        self.body.clone().unwrap_or_default()
    }

    fn response(&self) -> ResponseBody {
        match &self.body {
            Some(body) => ResponseBody::Text(body.clone()),
            None => ResponseBody::Empty,
        }
    }
}

impl XmlHttpRequest for MockXhr {
    fn open(&mut self, method: &str, url: &str) -> Result<(), TransportError> {
        self.request = Request::new(method, url);
        self.status = 0;
        self.headers = Headers::new();
        self.body = None;
        self.set_state(ReadyState::Opened);
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        if self.ready_state != ReadyState::Opened {
            return Err(TransportError::InvalidState(
                "setRequestHeader before open".to_string(),
            ));
        }
        self.request.headers.append(name, value);
        Ok(())
    }

    fn send(&mut self, body: Option<String>) -> Result<(), TransportError> {
        if self.ready_state != ReadyState::Opened {
            return Err(TransportError::InvalidState("send before open".to_string()));
        }
        self.request.body = body;
        self.log.lock().push(self.request.clone());
        self.dispatch(EventKind::LoadStart);

        match self.outcome.clone() {
            MockOutcome::Reply(reply) => {
                self.status = reply.status;
                self.status_text = reply.status_text;
                self.headers = reply.headers;
                self.set_state(ReadyState::HeadersReceived);
                self.set_state(ReadyState::Loading);
                self.body = Some(reply.body);
                self.dispatch(EventKind::Progress);
                self.set_state(ReadyState::Done);
                self.dispatch(EventKind::Load);
                self.dispatch(EventKind::LoadEnd);
            }
            MockOutcome::Fail(TransportError::Aborted) => self.finish_with(EventKind::Abort),
            MockOutcome::Fail(TransportError::Timeout) => self.finish_with(EventKind::Timeout),
            MockOutcome::Fail(_) => self.finish_with(EventKind::Error),
        }
        Ok(())
    }

    fn abort(&mut self) {
        if self.ready_state == ReadyState::Opened {
            self.finish_with(EventKind::Abort);
        }
        self.ready_state = ReadyState::Unsent;
    }

    fn add_event_listener(&mut self, kind: EventKind, listener: EventListener) {
        self.listeners.push((kind, listener));
    }
}

/// Factory handing out [`MockXhr`] objects that share one outcome and log.
#[derive(Debug, Clone)]
pub struct MockXhrFactory {
    outcome: MockOutcome,
    log: RequestLog,
}

impl MockXhrFactory {
    pub fn new(outcome: impl Into<MockOutcome>) -> Self {
        Self {
            outcome: outcome.into(),
            log: RequestLog::default(),
        }
    }

    pub fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }
}

impl XhrFactory for MockXhrFactory {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        Box::new(MockXhr::with_log(self.outcome.clone(), Arc::clone(&self.log)))
    }
}

// =============================================================================
// fetch mock
// =============================================================================

/// Scripted fetch function.
#[derive(Debug, Clone)]
pub struct MockFetch {
    outcome: MockOutcome,
    log: RequestLog,
}

impl MockFetch {
    pub fn new(outcome: impl Into<MockOutcome>) -> Self {
        Self {
            outcome: outcome.into(),
            log: RequestLog::default(),
        }
    }

    pub fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl FetchTransport for MockFetch {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        let mut request = match input {
            RequestInput::Url(url) => Request::new("GET", url),
            RequestInput::Request(request) => request,
        };
        if let Some(init) = init {
            if let Some(method) = init.method {
                request.method = method;
            }
            if let Some(headers) = init.headers {
                request.headers = headers;
            }
            if init.body.is_some() {
                request.body = init.body;
            }
        }
        let url = request.url.clone();
        self.log.lock().push(request);

        match &self.outcome {
            MockOutcome::Reply(reply) => Ok(Box::new(BufferedResponse::new(
                reply.status,
                reply.status_text.clone(),
                reply.headers.clone(),
                url,
                reply.body.clone(),
            ))),
            MockOutcome::Fail(e) => Err(e.clone()),
        }
    }
}
