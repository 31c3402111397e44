//! Decorator over fetch-style transports.

use super::Shared;
use crate::context::{CallInfo, Headers, ResponseSnapshot};
use crate::transport::{
    BufferedResponse, FetchResponse, FetchTransport, RequestInit, RequestInput, TransportError,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// A fetch function whose replies report the forced status.
///
/// When JSON rewriting is enabled the real body is read to the end before the
/// reply is handed back, so the caller never sees incremental delivery. With
/// rewriting disabled the real reply is wrapped as is and streams normally.
pub struct InterceptedFetch {
    inner: Arc<dyn FetchTransport>,
    shared: Arc<Shared>,
}

/// Attribute a fetch call: the URL comes from the input, the method from the
/// request descriptor unless `init` names one.
fn call_info(input: &RequestInput, init: Option<&RequestInit>) -> CallInfo {
    let (url, method) = match input {
        RequestInput::Url(url) => (url.as_str(), "GET"),
        RequestInput::Request(request) => (request.url.as_str(), request.method.as_str()),
    };
    match init.and_then(|init| init.method.as_deref()) {
        Some(method) => CallInfo::new(&method.to_uppercase(), url),
        None => CallInfo::new(method, url),
    }
}

impl InterceptedFetch {
    pub(crate) fn new(inner: Arc<dyn FetchTransport>, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    /// Issue the call and return the concrete overridden reply.
    pub async fn fetch_overridden(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<OverriddenResponse, TransportError> {
        let call = call_info(&input, init.as_ref());
        self.shared
            .stats
            .calls_intercepted
            .fetch_add(1, Ordering::Relaxed);

        let mut response = self.inner.fetch(input, init).await?;
        let original_status = response.status();

        if !self.shared.config.settings.rewrite_json {
            return Ok(OverriddenResponse {
                inner: response,
                call,
                original_status,
                snapshot: None,
                shared: Arc::clone(&self.shared),
            });
        }

        let original_body = response.text().await?;
        let content_type = response.headers().content_type().map(str::to_string);
        let body = self
            .shared
            .rewrite_body("Fetch", &call, content_type.as_deref(), &original_body)
            .unwrap_or_else(|| original_body.clone());

        let settings = &self.shared.config.settings;
        let (status, status_text) = if settings.force_status {
            (settings.forced_status, settings.forced_status_text.clone())
        } else {
            (original_status, response.status_text().to_string())
        };
        let rebuilt = BufferedResponse::new(
            status,
            status_text,
            response.headers().clone(),
            response.url(),
            body,
        );

        Ok(OverriddenResponse {
            inner: Box::new(rebuilt),
            call,
            original_status,
            snapshot: Some(ResponseSnapshot::new(
                original_status,
                original_body,
                content_type,
            )),
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl FetchTransport for InterceptedFetch {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        Ok(Box::new(self.fetch_overridden(input, init).await?))
    }
}

/// Reply handed to the application: `status` and `ok` are forced, the rest
/// delegates to the reply underneath.
pub struct OverriddenResponse {
    inner: Box<dyn FetchResponse>,
    call: CallInfo,
    original_status: u16,
    snapshot: Option<ResponseSnapshot>,
    shared: Arc<Shared>,
}

impl OverriddenResponse {
    /// Status the server actually sent. Diagnostics only.
    pub fn original_status(&self) -> u16 {
        self.original_status
    }

    /// Real reply facts; `None` when the body was not buffered.
    pub fn snapshot(&self) -> Option<&ResponseSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn call_info(&self) -> &CallInfo {
        &self.call
    }
}

#[async_trait]
impl FetchResponse for OverriddenResponse {
    fn status(&self) -> u16 {
        let Some(forced) = self.shared.forced_status() else {
            return self.inner.status();
        };
        self.shared
            .stats
            .status_overrides
            .fetch_add(1, Ordering::Relaxed);
        debug!(
            method = %self.call.method,
            url = %self.call.url,
            original_status = self.original_status,
            forced_status = forced,
            "Fetch status forced"
        );
        forced
    }

    fn ok(&self) -> bool {
        if self.shared.config.settings.force_status {
            true
        } else {
            self.inner.ok()
        }
    }

    fn status_text(&self) -> &str {
        self.inner.status_text()
    }

    fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    fn url(&self) -> &str {
        self.inner.url()
    }

    fn body_used(&self) -> bool {
        self.inner.body_used()
    }

    async fn bytes(&mut self) -> Result<Vec<u8>, TransportError> {
        self.inner.bytes().await
    }

    async fn text(&mut self) -> Result<String, TransportError> {
        self.inner.text().await
    }

    async fn json(&mut self) -> Result<JsonValue, TransportError> {
        self.inner.json().await
    }
}
