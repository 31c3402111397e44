//! Per-call context: call attribution, reply snapshots and header maps.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Method and URL of an intercepted call, kept for log attribution only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallInfo {
    /// HTTP method
    pub method: String,
    /// Request URL as given by the caller
    pub url: String,
}

impl CallInfo {
    /// Create call info. An empty method is recorded as `GET`.
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        let method = if method.is_empty() { "GET" } else { method };
        Self {
            method: method.to_string(),
            url: url.into(),
        }
    }
}

/// Facts about one real reply, captured once when the call completes.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    /// Status the server actually sent
    pub real_status: u16,
    /// Body text as received
    pub real_body_text: String,
    /// Content-Type header, if any
    pub content_type: Option<String>,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

impl ResponseSnapshot {
    pub fn new(real_status: u16, real_body_text: String, content_type: Option<String>) -> Self {
        Self {
            real_status,
            real_body_text,
            content_type,
            captured_at: Utc::now(),
        }
    }
}

/// Response or request headers, keyed by lower-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Builder form of [`Headers::append`].
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Get all values of a header joined with `", "`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .get(&name.to_lowercase())
            .filter(|values| !values.is_empty())
            .map(|values| values.join(", "))
    }

    /// Get the first value of a header.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// The Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.first("content-type")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a CRLF-separated header block, names sorted.
    pub fn to_raw(&self) -> String {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.get(name).map(|value| format!("{}: {}\r\n", name, value)))
            .collect()
    }
}

/// Get status text for a status code.
pub fn status_text(code: u16) -> String {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
    .to_string()
}
