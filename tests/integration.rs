//! Integration tests for the response override layer.

use serde_json::json;
use std::sync::Arc;
use zentinel_response_override::transport::mock::{
    MockFetch, MockOutcome, MockReply, MockXhr, MockXhrFactory,
};
use zentinel_response_override::transport::{
    EventKind, Request, RequestInit, RequestInput, ResponseBody,
};
use zentinel_response_override::{
    transform, FieldRule, FetchResponse, FetchTransport, InterceptError, NetworkEntryPoints,
    ResponseInterceptor, TransformConfig, TransportError, XhrTarget, XmlHttpRequest,
};

// =============================================================================
// Configuration Parsing Tests
// =============================================================================

#[test]
fn test_parse_minimal_config() {
    let config = TransformConfig::from_yaml("version: \"1\"\nrules: []\n").unwrap();
    assert_eq!(config.version, "1");
    assert!(config.rules.is_empty());
    assert!(config.settings.force_status);
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
version: "1"
settings:
  force_status: true
  forced_status: 200
  forced_status_text: "OK"
  rewrite_json: true
  json_content_types: ["application/json", "application/vnd.api+json"]
rules:
  - name: success
    replacement: "1"
  - name: errorCode
    replacement: ""
  - name: flags
    replacement: [1, 2]
"#;
    let config = TransformConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.rules.len(), 3);
    assert_eq!(config.rules[2].replacement, json!([1, 2]));
    assert!(config.is_json_content_type(Some("application/vnd.api+json")));
}

#[test]
fn test_parse_json_config() {
    let json_str = r#"{
        "settings": {"force_status": false},
        "rules": [{"name": "success", "replacement": true}]
    }"#;
    let config = TransformConfig::from_json(json_str).unwrap();
    assert!(!config.settings.force_status);
    assert_eq!(config.rules[0], FieldRule::new("success", json!(true)));
}

// =============================================================================
// Transform Scenarios
// =============================================================================

#[test]
fn test_scenario_envelope() {
    let output = transform(
        &json!({"success": false, "errorCode": "E1", "data": null}),
        &TransformConfig::builtin(),
    );
    assert_eq!(output, json!({"success": "1", "errorCode": "", "data": {}}));
}

#[test]
fn test_scenario_list() {
    let output = transform(
        &json!({"list": [{"success": false}, {"success": true}]}),
        &TransformConfig::builtin(),
    );
    assert_eq!(output, json!({"list": [{"success": "1"}, {"success": "1"}]}));
}

#[test]
fn test_scenario_nested_data() {
    let output = transform(&json!({"data": {"data": null}}), &TransformConfig::builtin());
    assert_eq!(output, json!({"data": {"data": {}}}));
}

// =============================================================================
// XHR Interception Tests
// =============================================================================

#[test]
fn test_xhr_plain_text_reply() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let mut xhr = interceptor.wrap_xhr(Box::new(MockXhr::new(
        MockReply::new(404, "hello").with_header("Content-Type", "text/plain"),
    )));

    xhr.open("GET", "/greeting").unwrap();
    xhr.send(None).unwrap();

    assert_eq!(xhr.status(), 200);
    assert_eq!(xhr.response_text(), "hello");
    assert_eq!(xhr.response(), ResponseBody::Text("hello".to_string()));
}

#[test]
fn test_xhr_wire_request_untouched() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let inner = MockXhr::new(MockReply::json(200, r#"{"success":false}"#));
    let log = inner.log();
    let mut xhr = interceptor.wrap_xhr(Box::new(inner));

    xhr.open("POST", "/api/save").unwrap();
    xhr.set_request_header("Content-Type", "application/json")
        .unwrap();
    xhr.send(Some(r#"{"success":false,"data":null}"#.to_string()))
        .unwrap();

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, "POST");
    assert_eq!(log[0].url, "/api/save");
    assert_eq!(
        log[0].body.as_deref(),
        Some(r#"{"success":false,"data":null}"#)
    );
}

#[test]
fn test_xhr_abort_delegates() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let mut xhr = interceptor.wrap_xhr(Box::new(MockXhr::new(MockReply::json(200, "{}"))));

    let aborted = Arc::new(parking_lot::Mutex::new(false));
    let flag = Arc::clone(&aborted);
    xhr.add_event_listener(
        EventKind::Abort,
        Box::new(move |_, target| {
            // Forced status holds on the abort path too.
            assert_eq!(target.status(), 200);
            *flag.lock() = true;
        }),
    );

    xhr.open("GET", "/slow").unwrap();
    xhr.abort();

    assert!(*aborted.lock());
    assert!(xhr.snapshot().is_none());
    assert_eq!(xhr.response_text(), "");
}

// =============================================================================
// Fetch Interception Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_plain_text_reply() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let fetch = interceptor.wrap_fetch(Arc::new(MockFetch::new(
        MockReply::new(500, "hello").with_header("Content-Type", "text/plain"),
    )));

    let mut response = fetch.fetch(RequestInput::from("/greeting"), None).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.ok());
    assert_eq!(response.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_fetch_rejection_unchanged() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let fetch = interceptor.wrap_fetch(Arc::new(MockFetch::new(MockOutcome::Fail(
        TransportError::Network("dns failure".to_string()),
    ))));

    let result = fetch.fetch(RequestInput::from("/api"), None).await;
    match result {
        Err(e) => assert_eq!(e, TransportError::Network("dns failure".to_string())),
        Ok(_) => panic!("a failed call must not produce a reply"),
    }
    assert_eq!(interceptor.stats().status_overrides, 0);
}

#[tokio::test]
async fn test_fetch_headers_preserved() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let fetch = interceptor.wrap_fetch(Arc::new(MockFetch::new(
        MockReply::json(401, r#"{"success":false}"#).with_header("WWW-Authenticate", "Bearer"),
    )));

    let request = Request::new("GET", "/me");
    let response = fetch
        .fetch(RequestInput::from(request), Some(RequestInit::method("post")))
        .await
        .unwrap();

    assert_eq!(response.headers().first("www-authenticate"), Some("Bearer"));
    assert_eq!(response.headers().content_type(), Some("application/json"));
    assert_eq!(response.url(), "/me");
}

#[tokio::test]
async fn test_fetch_parse_failure_counted() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let fetch = interceptor.wrap_fetch(Arc::new(MockFetch::new(MockReply::json(
        200,
        "not json at all",
    ))));

    let mut response = fetch.fetch(RequestInput::from("/api"), None).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "not json at all");
    assert_eq!(response.status(), 200);

    let stats = interceptor.stats();
    assert_eq!(stats.transform_failures, 1);
    assert_eq!(stats.bodies_transformed, 0);
}

#[tokio::test]
async fn test_concurrent_fetches_share_config() {
    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let fetch = Arc::new(interceptor.wrap_fetch(Arc::new(MockFetch::new(MockReply::json(
        500,
        r#"{"success":false,"data":null}"#,
    )))));

    let mut handles = Vec::new();
    for i in 0..32 {
        let fetch = Arc::clone(&fetch);
        handles.push(tokio::spawn(async move {
            let mut response = fetch
                .fetch(RequestInput::from(format!("/api/{}", i)), None)
                .await
                .unwrap();
            (response.status(), response.json().await.unwrap())
        }));
    }

    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, json!({"success": "1", "data": {}}));
    }
    assert_eq!(interceptor.stats().calls_intercepted, 32);
    assert_eq!(interceptor.stats().bodies_transformed, 32);
}

// =============================================================================
// Installation Tests
// =============================================================================

#[tokio::test]
async fn test_install_end_to_end() {
    let xhr_factory = MockXhrFactory::new(MockReply::json(
        500,
        r#"{"success":false,"errorCode":"E500"}"#,
    ));
    let xhr_log = xhr_factory.log();
    let mut entry_points = NetworkEntryPoints::new(
        Arc::new(xhr_factory),
        Arc::new(MockFetch::new(MockReply::json(403, r#"{"data":null}"#))),
    );

    let interceptor = ResponseInterceptor::new(TransformConfig::builtin()).unwrap();
    let handle = interceptor.install(&mut entry_points).unwrap();

    let mut xhr = entry_points.new_xhr();
    xhr.open("GET", "/a").unwrap();
    xhr.send(None).unwrap();
    assert_eq!(xhr.status(), 200);
    assert_eq!(xhr.response_text(), r#"{"success":"1","errorCode":""}"#);
    assert_eq!(xhr_log.lock().len(), 1);

    let mut response = entry_points.fetch("/b", None).await.unwrap();
    assert!(response.ok());
    assert_eq!(response.text().await.unwrap(), r#"{"data":{}}"#);

    assert!(matches!(
        interceptor.install(&mut entry_points),
        Err(InterceptError::AlreadyInstalled)
    ));

    entry_points.uninstall(handle);
    let response = entry_points.fetch("/b", None).await.unwrap();
    assert_eq!(response.status(), 403);
}
