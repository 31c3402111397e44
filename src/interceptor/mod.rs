//! Response interceptor: shared core, statistics and installation.

mod fetch;
mod xhr;

pub use fetch::{InterceptedFetch, OverriddenResponse};
pub use xhr::InterceptedXhr;

use crate::config::{ConfigError, TransformConfig};
use crate::context::CallInfo;
use crate::transformer::{BodyRewrite, JsonTransformer};
use crate::transport::{
    FetchResponse, FetchTransport, RequestInit, RequestInput, TransportError, XhrFactory,
    XmlHttpRequest,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Builds decorators over real transports.
///
/// One interceptor is created at startup and shared by every call; the
/// configuration and rule table it holds are read-only.
#[derive(Clone)]
pub struct ResponseInterceptor {
    shared: Arc<Shared>,
}

/// State shared by every decorator of one interceptor.
pub(crate) struct Shared {
    pub(crate) config: TransformConfig,
    pub(crate) transformer: JsonTransformer,
    pub(crate) stats: InterceptorStats,
}

impl Shared {
    /// Forced status, or `None` when status forcing is off.
    pub(crate) fn forced_status(&self) -> Option<u16> {
        self.config
            .settings
            .force_status
            .then_some(self.config.settings.forced_status)
    }

    /// Run a reply body through the rewriter, logging and counting the outcome.
    ///
    /// Returns the rewritten text, or `None` when the real body must be kept.
    pub(crate) fn rewrite_body(
        &self,
        kind: &'static str,
        call: &CallInfo,
        content_type: Option<&str>,
        body: &str,
    ) -> Option<String> {
        match BodyRewrite::apply(&self.config, &self.transformer, content_type, body) {
            BodyRewrite::Transformed(text) => {
                self.stats.bodies_transformed.fetch_add(1, Ordering::Relaxed);
                info!(
                    kind,
                    method = %call.method,
                    url = %call.url,
                    before = %body,
                    after = %text,
                    "Modified JSON response"
                );
                Some(text)
            }
            BodyRewrite::Skipped => {
                self.stats.bodies_skipped.fetch_add(1, Ordering::Relaxed);
                trace!(
                    kind,
                    method = %call.method,
                    url = %call.url,
                    content_type = ?content_type,
                    "Response is not JSON, body left untouched"
                );
                None
            }
            BodyRewrite::Failed(e) => {
                self.stats.transform_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind,
                    method = %call.method,
                    url = %call.url,
                    error = %e,
                    "Failed to modify JSON response"
                );
                None
            }
        }
    }
}

impl ResponseInterceptor {
    /// Create an interceptor from a validated configuration.
    pub fn new(config: TransformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transformer = JsonTransformer::new(&config);

        info!(
            rules = transformer.rule_count(),
            force_status = config.settings.force_status,
            forced_status = config.settings.forced_status,
            rewrite_json = config.settings.rewrite_json,
            "Response interceptor initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transformer,
                stats: InterceptorStats::default(),
            }),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::new(TransformConfig::from_yaml(yaml)?)
    }

    /// Create from a JSON configuration string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::new(TransformConfig::from_json(json)?)
    }

    pub fn config(&self) -> &TransformConfig {
        &self.shared.config
    }

    pub fn transformer(&self) -> &JsonTransformer {
        &self.shared.transformer
    }

    /// Wrap one request object.
    pub fn wrap_xhr(&self, inner: Box<dyn XmlHttpRequest>) -> InterceptedXhr {
        InterceptedXhr::new(inner, Arc::clone(&self.shared))
    }

    /// Wrap a fetch function.
    pub fn wrap_fetch(&self, inner: Arc<dyn FetchTransport>) -> InterceptedFetch {
        InterceptedFetch::new(inner, Arc::clone(&self.shared))
    }

    /// Replace both entry points with intercepting versions.
    ///
    /// Installing twice on the same entry points is refused rather than
    /// wrapping the decorators a second time.
    pub fn install(
        &self,
        entry_points: &mut NetworkEntryPoints,
    ) -> Result<InstallHandle, InterceptError> {
        if entry_points.installed {
            warn!("Response interceptor already installed");
            return Err(InterceptError::AlreadyInstalled);
        }

        let handle = InstallHandle {
            xhr: Arc::clone(&entry_points.xhr),
            fetch: Arc::clone(&entry_points.fetch),
        };

        entry_points.xhr = Arc::new(InterceptingXhrFactory {
            inner: Arc::clone(&handle.xhr),
            shared: Arc::clone(&self.shared),
        });
        entry_points.fetch = Arc::new(self.wrap_fetch(Arc::clone(&handle.fetch)));
        entry_points.installed = true;

        info!("Response interceptor installed");
        Ok(handle)
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

/// Factory that wraps every request object it creates.
struct InterceptingXhrFactory {
    inner: Arc<dyn XhrFactory>,
    shared: Arc<Shared>,
}

impl XhrFactory for InterceptingXhrFactory {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        Box::new(InterceptedXhr::new(
            self.inner.create(),
            Arc::clone(&self.shared),
        ))
    }
}

/// The two host entry points for issuing network calls.
pub struct NetworkEntryPoints {
    xhr: Arc<dyn XhrFactory>,
    fetch: Arc<dyn FetchTransport>,
    installed: bool,
}

impl NetworkEntryPoints {
    pub fn new(xhr: Arc<dyn XhrFactory>, fetch: Arc<dyn FetchTransport>) -> Self {
        Self {
            xhr,
            fetch,
            installed: false,
        }
    }

    /// Create a request object through the current entry point.
    pub fn new_xhr(&self) -> Box<dyn XmlHttpRequest> {
        self.xhr.create()
    }

    /// Issue a fetch through the current entry point.
    pub async fn fetch(
        &self,
        input: impl Into<RequestInput>,
        init: Option<RequestInit>,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        self.fetch.fetch(input.into(), init).await
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Restore the entry points saved by [`ResponseInterceptor::install`].
    pub fn uninstall(&mut self, handle: InstallHandle) {
        self.xhr = handle.xhr;
        self.fetch = handle.fetch;
        self.installed = false;
        info!("Response interceptor uninstalled");
    }
}

/// Proof of installation; holds the original entry points.
pub struct InstallHandle {
    xhr: Arc<dyn XhrFactory>,
    fetch: Arc<dyn FetchTransport>,
}

/// Interceptor counters.
#[derive(Debug, Default)]
pub(crate) struct InterceptorStats {
    pub(crate) calls_intercepted: AtomicU64,
    pub(crate) status_overrides: AtomicU64,
    pub(crate) bodies_transformed: AtomicU64,
    pub(crate) bodies_skipped: AtomicU64,
    pub(crate) transform_failures: AtomicU64,
}

impl InterceptorStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls_intercepted: self.calls_intercepted.load(Ordering::Relaxed),
            status_overrides: self.status_overrides.load(Ordering::Relaxed),
            bodies_transformed: self.bodies_transformed.load(Ordering::Relaxed),
            bodies_skipped: self.bodies_skipped.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the interceptor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls that went through a decorator
    pub calls_intercepted: u64,
    /// Status reads answered with the forced value
    pub status_overrides: u64,
    /// JSON bodies rewritten
    pub bodies_transformed: u64,
    /// Bodies left alone (not JSON, or rewriting disabled)
    pub bodies_skipped: u64,
    /// JSON bodies that failed to parse
    pub transform_failures: u64,
}

/// Interceptor errors.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("response interceptor is already installed on these entry points")]
    AlreadyInstalled,
}
