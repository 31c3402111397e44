//! Decorator over XMLHttpRequest-style request objects.

use super::Shared;
use crate::context::{CallInfo, ResponseSnapshot};
use crate::transport::{
    EventKind, EventListener, ReadyState, ResponseBody, TransportError, XhrEvent, XhrTarget,
    XmlHttpRequest,
};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Per-call state, shared with the listeners registered on the real object.
#[derive(Debug, Default)]
struct CallState {
    call: CallInfo,
    /// Real status, captured once the request reaches `Done`
    real_status: u16,
    snapshot: Option<ResponseSnapshot>,
    /// Rewritten body served in place of the real one
    body_override: Option<String>,
}

/// A request object whose status and body accessors are overridden.
///
/// Status reads return the forced value from the moment the wrapper exists,
/// including before `send` and before completion. This mirrors the behavior
/// callers were built against and is deliberately not gated on `Done`.
///
/// Body accessors are overridden only after a JSON reply has been rewritten
/// in the `load` handler; every other member delegates to the real object.
pub struct InterceptedXhr {
    inner: Box<dyn XmlHttpRequest>,
    state: Arc<Mutex<CallState>>,
    shared: Arc<Shared>,
}

impl InterceptedXhr {
    pub(crate) fn new(mut inner: Box<dyn XmlHttpRequest>, shared: Arc<Shared>) -> Self {
        let state = Arc::new(Mutex::new(CallState::default()));

        // Registered before anything the application adds, so these run first.
        let capture_state = Arc::clone(&state);
        inner.add_event_listener(
            EventKind::ReadyStateChange,
            Box::new(move |event, target| {
                if event.ready_state == ReadyState::Done {
                    let mut state = capture_state.lock();
                    if state.real_status == 0 {
                        state.real_status = target.status();
                    }
                }
            }),
        );

        let load_state = Arc::clone(&state);
        let load_shared = Arc::clone(&shared);
        inner.add_event_listener(
            EventKind::Load,
            Box::new(move |_, target| on_load(&load_state, &load_shared, target)),
        );

        Self {
            inner,
            state,
            shared,
        }
    }

    /// Method and URL recorded by `open`.
    pub fn call_info(&self) -> CallInfo {
        self.state.lock().call.clone()
    }

    /// Real reply facts, available once `load` has fired. Diagnostics only.
    pub fn snapshot(&self) -> Option<ResponseSnapshot> {
        self.state.lock().snapshot.clone()
    }

    fn view(&self) -> OverriddenTarget<'_, dyn XmlHttpRequest> {
        OverriddenTarget {
            inner: &*self.inner,
            state: &self.state,
            shared: &self.shared,
        }
    }
}

fn on_load(state: &Mutex<CallState>, shared: &Shared, target: &dyn XhrTarget) {
    let call = state.lock().call.clone();
    let content_type = target.response_header("content-type");
    let body = target.response_text();
    let rewritten = shared.rewrite_body("XHR", &call, content_type.as_deref(), &body);

    let mut state = state.lock();
    let real_status = if state.real_status == 0 {
        target.status()
    } else {
        state.real_status
    };
    state.real_status = real_status;
    state.snapshot = Some(ResponseSnapshot::new(real_status, body, content_type));
    if rewritten.is_some() {
        state.body_override = rewritten;
    }
}

/// Read-side view applying the overrides on top of a real target.
struct OverriddenTarget<'a, T: XhrTarget + ?Sized> {
    inner: &'a T,
    state: &'a Mutex<CallState>,
    shared: &'a Shared,
}

impl<T: XhrTarget + ?Sized> XhrTarget for OverriddenTarget<'_, T> {
    fn ready_state(&self) -> ReadyState {
        self.inner.ready_state()
    }

    fn status(&self) -> u16 {
        let Some(forced) = self.shared.forced_status() else {
            return self.inner.status();
        };
        self.shared
            .stats
            .status_overrides
            .fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock();
        debug!(
            method = %state.call.method,
            url = %state.call.url,
            original_status = state.real_status,
            forced_status = forced,
            "XHR status forced"
        );
        forced
    }

    fn status_text(&self) -> String {
        self.inner.status_text()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.inner.response_header(name)
    }

    fn all_response_headers(&self) -> String {
        self.inner.all_response_headers()
    }

    fn response_text(&self) -> String {
        match &self.state.lock().body_override {
            Some(body) => body.clone(),
            None => self.inner.response_text(),
        }
    }

    fn response(&self) -> ResponseBody {
        match &self.state.lock().body_override {
            Some(body) => ResponseBody::Text(body.clone()),
            None => self.inner.response(),
        }
    }
}

impl XhrTarget for InterceptedXhr {
    fn ready_state(&self) -> ReadyState {
        self.view().ready_state()
    }

    fn status(&self) -> u16 {
        self.view().status()
    }

    fn status_text(&self) -> String {
        self.view().status_text()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.view().response_header(name)
    }

    fn all_response_headers(&self) -> String {
        self.view().all_response_headers()
    }

    fn response_text(&self) -> String {
        self.view().response_text()
    }

    fn response(&self) -> ResponseBody {
        self.view().response()
    }
}

impl XmlHttpRequest for InterceptedXhr {
    fn open(&mut self, method: &str, url: &str) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            state.call = CallInfo::new(method, url);
            state.real_status = 0;
            state.snapshot = None;
            state.body_override = None;
        }
        self.inner.open(method, url)
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        self.inner.set_request_header(name, value)
    }

    fn send(&mut self, body: Option<String>) -> Result<(), TransportError> {
        self.inner.send(body)?;
        self.shared
            .stats
            .calls_intercepted
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn abort(&mut self) {
        self.inner.abort()
    }

    /// Listeners see this decorator's overrides on their event target.
    fn add_event_listener(&mut self, kind: EventKind, mut listener: EventListener) {
        let state = Arc::clone(&self.state);
        let shared = Arc::clone(&self.shared);
        self.inner.add_event_listener(
            kind,
            Box::new(move |event: &XhrEvent, target: &dyn XhrTarget| {
                let view = OverriddenTarget {
                    inner: target,
                    state: &state,
                    shared: &shared,
                };
                listener(event, &view);
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;
    use crate::interceptor::ResponseInterceptor;
    use crate::transport::mock::{MockOutcome, MockReply, MockXhr};

    fn make_xhr(config: TransformConfig, outcome: impl Into<MockOutcome>) -> InterceptedXhr {
        let interceptor = ResponseInterceptor::new(config).unwrap();
        interceptor.wrap_xhr(Box::new(MockXhr::new(outcome)))
    }

    #[test]
    fn test_status_forced_before_open() {
        let xhr = make_xhr(TransformConfig::builtin(), MockReply::new(500, ""));
        assert_eq!(xhr.status(), 200);
        assert_eq!(xhr.ready_state(), ReadyState::Unsent);
    }

    #[test]
    fn test_status_forced_for_any_real_status() {
        for real in [200, 404, 500] {
            let mut xhr = make_xhr(TransformConfig::builtin(), MockReply::new(real, "x"));
            xhr.open("GET", "/api").unwrap();
            xhr.send(None).unwrap();
            assert_eq!(xhr.status(), 200);
            assert_eq!(xhr.snapshot().unwrap().real_status, real);
        }
    }

    #[test]
    fn test_status_forced_on_network_error() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockOutcome::Fail(TransportError::Network("refused".to_string())),
        );
        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.status(), 200);
        assert!(xhr.snapshot().is_none());
        assert_eq!(xhr.response_text(), "");
    }

    #[test]
    fn test_custom_forced_status() {
        let mut config = TransformConfig::builtin();
        config.settings.forced_status = 204;
        let xhr = make_xhr(config, MockReply::new(500, ""));
        assert_eq!(xhr.status(), 204);
    }

    #[test]
    fn test_status_passthrough_when_disabled() {
        let mut config = TransformConfig::builtin();
        config.settings.force_status = false;
        let mut xhr = make_xhr(config, MockReply::json(500, r#"{"success":false}"#));
        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.status(), 500);
        assert_eq!(xhr.response_text(), r#"{"success":"1"}"#);
    }

    #[test]
    fn test_json_body_rewritten() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::json(200, r#"{"success":false,"errorCode":"E1","data":null}"#),
        );
        xhr.open("POST", "/login").unwrap();
        xhr.send(Some("user=a".to_string())).unwrap();

        let expected = r#"{"success":"1","errorCode":"","data":{}}"#;
        assert_eq!(xhr.response_text(), expected);
        assert_eq!(xhr.response(), ResponseBody::Text(expected.to_string()));

        let snapshot = xhr.snapshot().unwrap();
        assert_eq!(
            snapshot.real_body_text,
            r#"{"success":false,"errorCode":"E1","data":null}"#
        );
        assert_eq!(snapshot.content_type.as_deref(), Some("application/json"));
        assert_eq!(xhr.call_info(), CallInfo::new("POST", "/login"));
    }

    #[test]
    fn test_non_json_body_untouched() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::new(200, "hello").with_header("Content-Type", "text/plain"),
        );
        xhr.open("GET", "/text").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.response_text(), "hello");
        assert_eq!(xhr.response(), ResponseBody::Text("hello".to_string()));
        assert_eq!(xhr.status(), 200);
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::json(502, "<html>Bad Gateway</html>"),
        );
        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.response_text(), "<html>Bad Gateway</html>");
        assert_eq!(xhr.status(), 200);
    }

    #[test]
    fn test_headers_delegate() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::json(200, "{}").with_header("X-Trace", "t1"),
        );
        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.response_header("x-trace"), Some("t1".to_string()));
        assert!(xhr.all_response_headers().contains("x-trace: t1"));
        assert_eq!(xhr.status_text(), "OK");
    }

    #[test]
    fn test_listener_target_sees_overrides() {
        let seen = Arc::new(Mutex::new(None));
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::json(403, r#"{"success":false}"#),
        );
        let sink = Arc::clone(&seen);
        xhr.add_event_listener(
            EventKind::Load,
            Box::new(move |_, target| {
                *sink.lock() = Some((target.status(), target.response_text()));
            }),
        );
        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();

        assert_eq!(
            seen.lock().clone(),
            Some((200, r#"{"success":"1"}"#.to_string()))
        );
    }

    #[test]
    fn test_reopen_resets_overrides() {
        let mut xhr = make_xhr(
            TransformConfig::builtin(),
            MockReply::json(200, r#"{"success":false}"#),
        );
        xhr.open("GET", "/first").unwrap();
        xhr.send(None).unwrap();
        assert!(xhr.snapshot().is_some());

        xhr.open("GET", "/second").unwrap();
        assert!(xhr.snapshot().is_none());
        assert_eq!(xhr.call_info().url, "/second");
    }

    #[test]
    fn test_rejected_send_not_counted() {
        let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
        let mut xhr = interceptor.wrap_xhr(Box::new(MockXhr::new(MockReply::new(200, ""))));

        assert!(matches!(
            xhr.send(None),
            Err(TransportError::InvalidState(_))
        ));
        assert_eq!(interceptor.stats().calls_intercepted, 0);

        xhr.open("GET", "/api").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(interceptor.stats().calls_intercepted, 1);
    }
}
