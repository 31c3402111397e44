//! Client-side response override layer.
//!
//! Wraps XMLHttpRequest-style request objects and fetch-style functions so
//! the application observes a rewritten result while the wire request and the
//! server's real reply stay untouched:
//!
//! - Status accessors report a forced value (200 by default) and `ok` is true
//! - JSON bodies have configured fields replaced at any depth
//! - A `"data": null` field always becomes `"data": {}`
//! - Everything else delegates to the real transport
//!
//! ## Configuration Example
//!
//! ```yaml
//! settings:
//!   forced_status: 200
//!   json_content_types: ["application/json"]
//! rules:
//!   - name: success
//!     replacement: "1"
//!   - name: errorCode
//!     replacement: ""
//! ```

pub mod config;
pub mod context;
pub mod interceptor;
pub mod transformer;
pub mod transport;

pub use config::{ConfigError, FieldRule, TransformConfig};
pub use context::{CallInfo, ResponseSnapshot};
pub use interceptor::{
    InstallHandle, InterceptError, InterceptedFetch, InterceptedXhr, NetworkEntryPoints,
    OverriddenResponse, ResponseInterceptor, StatsSnapshot,
};
pub use transformer::{transform, JsonTransformer, TransformError};
pub use transport::{FetchResponse, FetchTransport, TransportError, XhrTarget, XmlHttpRequest};
