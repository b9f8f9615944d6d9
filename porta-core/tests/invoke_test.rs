use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use porta_core::invoke::{CallError, Invoker, NdjsonRelay, deadline_for};
use porta_core::registry::SchemaRegistry;
use prost_reflect::MethodDescriptor;
use tokio_stream::StreamExt;

mod echo_service_impl;

fn loaded_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry
        .replace_schema(FILE_DESCRIPTOR_SET)
        .expect("fixture descriptor set loads");
    registry
}

fn method(registry: &SchemaRegistry, name: &str) -> MethodDescriptor {
    registry.resolve("echo.EchoService", name).unwrap()
}

fn invoker() -> Invoker<EchoServiceServer<EchoServiceImpl>> {
    Invoker::from_service(EchoServiceServer::new(EchoServiceImpl))
}

async fn collect_lines(relay: NdjsonRelay) -> Vec<serde_json::Value> {
    relay
        .map(|chunk| {
            let line = std::str::from_utf8(&chunk).unwrap();
            assert!(line.ends_with('\n'), "chunk is newline-terminated");
            serde_json::from_str(line.trim_end()).unwrap()
        })
        .collect()
        .await
}

#[tokio::test]
async fn unary_call_round_trips_json() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let response = invoker()
        .unary(
            &method(&registry, "UnaryEcho"),
            serde_json::json!({ "message": "hola" }),
            deadline,
            timeout,
        )
        .await
        .unwrap();

    assert_eq!(response, serde_json::json!({ "message": "hola" }));
}

#[tokio::test]
async fn unary_rejects_streaming_methods() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let err = invoker()
        .unary(
            &method(&registry, "ServerStreamingEcho"),
            serde_json::json!({ "message": "x" }),
            deadline,
            timeout,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::NotUnary(_)));
}

#[tokio::test]
async fn unary_rejects_nonconformant_payload_before_sending() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let err = invoker()
        .unary(
            &method(&registry, "UnaryEcho"),
            serde_json::json!({ "message": 42 }),
            deadline,
            timeout,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::BadPayload(_)));
}

#[tokio::test]
async fn unary_deadline_fires_when_the_server_never_replies() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(1).unwrap();

    let started = std::time::Instant::now();
    let err = invoker()
        .unary(
            &method(&registry, "DelayedEcho"),
            serde_json::json!({ "message": "slow" }),
            deadline,
            timeout,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::DeadlineExceeded));
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}

#[tokio::test]
async fn server_stream_relays_messages_in_order_then_ends_cleanly() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let relay = invoker()
        .server_stream(
            &method(&registry, "ServerStreamingEcho"),
            serde_json::json!({ "message": "tick", "count": 5 }),
            deadline,
            timeout,
        )
        .await
        .unwrap();

    let lines = collect_lines(relay).await;
    assert_eq!(lines.len(), 6);
    for (i, line) in lines[..5].iter().enumerate() {
        assert_eq!(line["message"], format!("tick - seq {i}"));
    }
    assert_eq!(lines[5], serde_json::json!({ "end": true, "error": "" }));
}

#[tokio::test]
async fn server_stream_reports_mid_stream_errors_in_band() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let relay = invoker()
        .server_stream(
            &method(&registry, "ServerStreamingEcho"),
            serde_json::json!({ "message": "die" }),
            deadline,
            timeout,
        )
        .await
        .unwrap();

    let lines = collect_lines(relay).await;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["message"], "die - seq 0");
    assert_eq!(lines[1]["end"], true);
    assert_eq!(lines[1]["error"], "boom");
}

#[tokio::test]
async fn server_stream_deadline_ends_a_stalled_stream_in_band() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(1).unwrap();

    let relay = invoker()
        .server_stream(
            &method(&registry, "ServerStreamingEcho"),
            serde_json::json!({ "message": "stall" }),
            deadline,
            timeout,
        )
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let lines = collect_lines(relay).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(3));

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["message"], "stall - seq 0");
    assert_eq!(
        lines[1],
        serde_json::json!({ "end": true, "error": "Deadline exceeded" })
    );
}

#[tokio::test]
async fn server_stream_rejects_unary_methods() {
    let registry = loaded_registry();
    let (deadline, timeout) = deadline_for(5).unwrap();

    let err = invoker()
        .server_stream(
            &method(&registry, "UnaryEcho"),
            serde_json::json!({ "message": "x" }),
            deadline,
            timeout,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::NotServerStreaming(_)));
}
