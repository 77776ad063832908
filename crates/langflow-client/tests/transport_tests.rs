//! Transport core behaviour against a scripted transport: headers, error
//! mapping and cancellation.

use langflow_client::header::{HeaderValue, USER_AGENT};
use langflow_client::{
    CancellationToken, ErrorKind, HttpBody, RequestDescriptor, StatusCode, TransportError,
};
use langflow_client_mock::{init_tracing, MockResponse, MockTransport};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_api_key_header_is_injected() {
    init_tracing();
    let transport = MockTransport::with_responses([MockResponse::ok_json(json!([]))]);
    let client = transport.client(Some("secret-key"));

    client.request(RequestDescriptor::get("/v2/files")).await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.headers.get("x-api-key").unwrap(), "secret-key");
    assert_eq!(request.url.as_str(), "http://langflow.test/api/v2/files");
}

#[tokio::test]
async fn test_caller_api_key_header_is_used_verbatim() {
    let transport = MockTransport::with_responses([MockResponse::ok_json(json!({}))]);
    let client = transport.client(Some("configured"));

    let descriptor = RequestDescriptor::get("/v2/files").with_header(
        "x-api-key".parse().unwrap(),
        HeaderValue::from_static("Override-Value"),
    );
    client.request(descriptor).await.unwrap();

    let request = transport.last_request().unwrap();
    let values: Vec<_> = request.headers.get_all("x-api-key").iter().collect();
    assert_eq!(values, vec!["Override-Value"]);
}

#[tokio::test]
async fn test_user_agent_defaults_and_overrides() {
    let transport = MockTransport::with_responses([
        MockResponse::ok_json(json!({})),
        MockResponse::ok_json(json!({})),
    ]);
    let client = transport.client(None);

    client.request(RequestDescriptor::get("/a")).await.unwrap();
    client
        .request(RequestDescriptor::get("/b").with_header(USER_AGENT, HeaderValue::from_static("mine/2")))
        .await
        .unwrap();

    let requests = transport.requests();
    let default_agent = requests[0].headers.get(USER_AGENT).unwrap().to_str().unwrap();
    assert!(default_agent.starts_with("langflow-client-rust/0.1.0 ("));
    assert!(default_agent.contains(" rust/"));
    assert_eq!(requests[1].headers.get(USER_AGENT).unwrap(), "mine/2");
    assert!(requests[0].headers.get("x-api-key").is_none());
}

#[tokio::test]
async fn test_json_body_and_query_are_sent() {
    let transport = MockTransport::with_responses([MockResponse::ok_json(json!({"ok": true}))]);
    let client = transport.client(None);

    let descriptor = RequestDescriptor::post("/v1/run/abc")
        .with_query("stream", "false")
        .with_json(&json!({"input_value": "hi"}))
        .unwrap();
    let response = client.request(descriptor).await.unwrap();
    assert_eq!(response, json!({"ok": true}));

    let request = transport.last_request().unwrap();
    assert_eq!(request.url.query(), Some("stream=false"));
    match request.body {
        Some(HttpBody::Json(bytes)) => {
            let sent: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(sent, json!({"input_value": "hi"}));
        }
        other => panic!("expected JSON body, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let transport = MockTransport::with_responses([MockResponse::json(
        StatusCode::NOT_FOUND,
        json!({"detail": "Flow not found"}),
    )]);
    let client = transport.client(None);

    let err = client
        .request(RequestDescriptor::post("/v1/run/missing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    let http = err.as_http().unwrap();
    assert_eq!(http.reason(), "Not Found");
    assert_eq!(http.detail().unwrap().message(), Some("Flow not found"));
    assert!(http.text().contains("Flow not found"));
    assert_eq!(err.to_string(), "HTTP 404 Not Found: Flow not found");
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let transport = MockTransport::with_responses([MockResponse::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        "boom",
    )]);
    let err = transport
        .client(None)
        .request(RequestDescriptor::get("/health"))
        .await
        .unwrap_err();

    let http = err.as_http().unwrap();
    assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(http.text(), "boom");
    assert!(http.detail().is_none());
}

#[tokio::test]
async fn test_network_failure_is_transport_error() {
    let transport = MockTransport::with_responses([MockResponse::network_error("refused")]);
    let err = transport
        .client(None)
        .request(RequestDescriptor::get("/v2/files"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    match err.as_transport().unwrap() {
        TransportError::Other(source) => {
            let io = source.downcast_ref::<std::io::Error>().unwrap();
            assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
        }
        other => panic!("unexpected transport error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_success_body_is_transport_error() {
    let transport = MockTransport::with_responses([MockResponse::text(StatusCode::OK, "<html>")]);
    let err = transport
        .client(None)
        .request(RequestDescriptor::get("/v2/files"))
        .await
        .unwrap_err();
    assert!(matches!(err.as_transport(), Some(TransportError::Json(_))));
}

#[tokio::test]
async fn test_empty_body_is_null() {
    let transport = MockTransport::with_responses([MockResponse::no_content()]);
    let value = transport
        .client(None)
        .request(RequestDescriptor::delete("/v2/files/f-1"))
        .await
        .unwrap();
    assert!(value.is_null());
}

#[tokio::test]
async fn test_cancel_while_waiting_for_response() {
    let transport = MockTransport::with_responses([MockResponse::Pending]);
    let client = transport.client(None);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.request(RequestDescriptor::get("/slow").with_cancellation(token)),
    )
    .await
    .expect("cancellation should abort the call")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_cancel_while_reading_buffered_body() {
    let transport = MockTransport::with_responses([MockResponse::ndjson_chunks(["{\"partial\":"]).hanging()]);
    let client = transport.client(None);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.request(RequestDescriptor::get("/slow").with_cancellation(token)),
    )
    .await
    .expect("cancellation should abort the body read")
    .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancelling_one_call_leaves_others_alone() {
    let transport = MockTransport::with_responses([
        MockResponse::Pending,
        MockResponse::ok_json(json!({"n": 2})),
    ]);
    let client = transport.client(None);
    let token = CancellationToken::new();

    let cancelled = {
        let client = client.clone();
        let token = token.clone();
        tokio::spawn(async move {
            client
                .request(RequestDescriptor::get("/first").with_cancellation(token))
                .await
        })
    };
    // let the first call take the pending response before the second one runs
    tokio::time::sleep(Duration::from_millis(20)).await;

    let other_token = CancellationToken::new();
    token.cancel();
    let second = client
        .request(RequestDescriptor::get("/second").with_cancellation(other_token.clone()))
        .await
        .unwrap();

    assert_eq!(second, json!({"n": 2}));
    assert!(cancelled.await.unwrap().unwrap_err().is_cancelled());
    assert!(!other_token.is_cancelled());
}

#[tokio::test]
async fn test_descriptor_can_be_reissued() {
    let transport = MockTransport::with_responses([
        MockResponse::network_error("flaky"),
        MockResponse::ok_json(json!({"attempt": 2})),
    ]);
    let client = transport.client(None);
    let descriptor = RequestDescriptor::get("/v2/files");

    assert!(client.request(descriptor.clone()).await.is_err());
    assert_eq!(client.request(descriptor).await.unwrap(), json!({"attempt": 2}));
    assert_eq!(transport.requests().len(), 2);
}
