//! fetch-style transport backed by reqwest.

use super::{FetchResponse, FetchTransport, RequestInit, RequestInput, TransportError};
use crate::context::Headers;
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;

/// A [`FetchTransport`] that performs real HTTP calls.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    /// Create a transport with a request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidState(format!("failed to build client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchTransport for ReqwestFetch {
    async fn fetch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        let (url, mut method, mut headers, mut body) = match input {
            RequestInput::Url(url) => (url, "GET".to_string(), Headers::new(), None),
            RequestInput::Request(request) => {
                (request.url, request.method, request.headers, request.body)
            }
        };

        if let Some(init) = init {
            if let Some(m) = init.method {
                method = m;
            }
            if let Some(h) = init.headers {
                headers = h;
            }
            if init.body.is_some() {
                body = init.body;
            }
        }

        if method.is_empty() {
            method = "GET".to_string();
        }
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidState(format!("invalid method: {}", e)))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        Ok(Box::new(ReqwestResponse::new(response)))
    }
}

/// Reply returned by [`ReqwestFetch`]. The body streams from the connection.
pub struct ReqwestResponse {
    status: u16,
    status_text: String,
    headers: Headers,
    url: String,
    inner: Option<reqwest::Response>,
}

impl ReqwestResponse {
    fn new(response: reqwest::Response) -> Self {
        let headers = collect_headers(response.headers());

        Self {
            status: response.status().as_u16(),
            status_text: response
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string(),
            headers,
            url: response.url().to_string(),
            inner: Some(response),
        }
    }
}

#[async_trait]
impl FetchResponse for ReqwestResponse {
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
        self.inner.is_none()
    }

    async fn bytes(&mut self) -> Result<Vec<u8>, TransportError> {
        let response = self.inner.take().ok_or(TransportError::BodyUsed)?;
        let bytes = response.bytes().await.map_err(map_error)?;
        Ok(bytes.to_vec())
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Copy every header, including values that are not visible ASCII.
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        headers.append(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    headers
}
