//! # Invokers
//!
//! Per-request execution of dynamic gRPC calls. A channel is opened for
//! each invocation and dropped on return; there is no pooling. Every
//! suspension point (dial, send, each receive) is bounded by the caller's
//! deadline.
//!
//! Unary calls return one JSON value. Server-streaming calls return an
//! [`NdjsonRelay`], a stream of newline-delimited JSON chunks that the HTTP
//! layer forwards as the response body; each chunk is flushed to the client
//! as its own HTTP chunk, preserving backpressure through TCP.

use crate::BoxError;
use crate::grpc::client::{GrpcClient, GrpcRequestError};
use crate::grpc::codec;
use bytes::Bytes;
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, timeout_at};
use tonic::{
    Code, Status, Streaming,
    client::GrpcService,
    transport::{Channel, Endpoint},
};

/// The request body shared by the `/grpc-call` and `/grpc-stream`
/// endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    /// Endpoint to dial, `host:port` or a full URL.
    pub target: String,
    /// Fully qualified service name, e.g. `helloworld.Greeter`.
    pub service: String,
    /// Method short name, e.g. `SayHello`.
    pub method: String,
    /// Request payload, validated against the input descriptor.
    #[serde(default)]
    pub message: serde_json::Value,
    /// Per-call deadline in seconds. Must be positive.
    pub timeout_sec: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("timeout_sec must be a positive number of seconds")]
    InvalidTimeout,
    #[error("Invalid target '{0}': {1}")]
    InvalidTarget(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to gRPC server '{0}': {1}")]
    ConnectFailed(String, #[source] tonic::transport::Error),
    #[error("Method '{0}' is not unary")]
    NotUnary(String),
    #[error("Method '{0}' is not server-streaming")]
    NotServerStreaming(String),
    #[error("Invalid request payload: {0}")]
    BadPayload(String),
    #[error(transparent)]
    Request(#[from] GrpcRequestError),
    #[error("RPC failed: {0}")]
    Rpc(Status),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl From<Status> for CallError {
    fn from(status: Status) -> Self {
        // A compliant server honors `grpc-timeout` and reports the same
        // condition we would detect locally.
        if status.code() == Code::DeadlineExceeded {
            CallError::DeadlineExceeded
        } else {
            CallError::Rpc(status)
        }
    }
}

/// Converts `timeout_sec` into a deadline and the matching duration.
///
/// Non-positive values are rejected outright instead of being treated as a
/// zero-length deadline that would fail every call. Values too large to
/// represent as a deadline are rejected the same way; `timeout_sec` comes
/// straight from the request body and may not panic the handler.
pub fn deadline_for(timeout_sec: i64) -> Result<(Instant, Duration), CallError> {
    if timeout_sec <= 0 {
        return Err(CallError::InvalidTimeout);
    }
    let timeout = Duration::from_secs(timeout_sec as u64);
    let deadline = Instant::now()
        .checked_add(timeout)
        .ok_or(CallError::InvalidTimeout)?;
    Ok((deadline, timeout))
}

/// One gRPC exchange against one endpoint.
pub struct Invoker<S = Channel> {
    client: GrpcClient<S>,
}

impl Invoker<Channel> {
    /// Opens a plaintext channel to `target`, bounded by `deadline`.
    ///
    /// Targets without a scheme (`host:port`) are dialed as `http://`.
    pub async fn connect(target: &str, deadline: Instant) -> Result<Self, CallError> {
        let url = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{target}")
        };
        let endpoint =
            Endpoint::new(url).map_err(|e| CallError::InvalidTarget(target.to_string(), e))?;
        let channel = timeout_at(deadline, endpoint.connect())
            .await
            .map_err(|_| CallError::DeadlineExceeded)?
            .map_err(|e| CallError::ConnectFailed(target.to_string(), e))?;
        Ok(Self::from_service(channel))
    }
}

impl<S> Invoker<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Wraps an already-built service. Lets tests drive an in-process tonic
    /// server with no network in between.
    pub fn from_service(service: S) -> Self {
        Self {
            client: GrpcClient::new(service),
        }
    }

    /// Performs a unary exchange and returns the response as JSON.
    ///
    /// Streaming methods of either kind are rejected before anything is
    /// sent, as is a payload that does not conform to the input descriptor.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        message: serde_json::Value,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<serde_json::Value, CallError> {
        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(CallError::NotUnary(method.name().to_string()));
        }
        codec::decode_json(&method.input(), message.clone())
            .map_err(|e| CallError::BadPayload(e.to_string()))?;

        let result = timeout_at(deadline, self.client.unary(method, message, timeout))
            .await
            .map_err(|_| CallError::DeadlineExceeded)??;
        result.map_err(CallError::from)
    }

    /// Opens a server-streaming call, sends the single request message, and
    /// returns the relay that yields each response as one NDJSON line.
    ///
    /// Errors raised before the first response (bad payload, dial or send
    /// failure, immediate status) come back as `Err`; everything after that
    /// is reported in-band through the relay's terminal frame.
    pub async fn server_stream(
        &mut self,
        method: &MethodDescriptor,
        message: serde_json::Value,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<NdjsonRelay, CallError> {
        if method.is_client_streaming() || !method.is_server_streaming() {
            return Err(CallError::NotServerStreaming(method.name().to_string()));
        }
        codec::decode_json(&method.input(), message.clone())
            .map_err(|e| CallError::BadPayload(e.to_string()))?;

        let result = timeout_at(
            deadline,
            self.client.server_streaming(method, message, timeout),
        )
        .await
        .map_err(|_| CallError::DeadlineExceeded)??;
        let inbound = result.map_err(CallError::from)?;
        Ok(NdjsonRelay::new(inbound, deadline))
    }
}

/// Relays a server-streaming response as newline-delimited JSON.
///
/// Each server message becomes one `<json>\n` chunk, yielded in arrival
/// order. The relay always terminates with exactly one
/// `{"end":true,"error":"<message>"}` line, where the error is empty on a
/// clean half-close. Dropping the relay mid-stream (the HTTP client went
/// away) drops the underlying call and channel, cancelling the RPC.
#[derive(Debug)]
pub struct NdjsonRelay {
    inbound: Streaming<serde_json::Value>,
    deadline: Pin<Box<Sleep>>,
    finished: bool,
}

impl NdjsonRelay {
    fn new(inbound: Streaming<serde_json::Value>, deadline: Instant) -> Self {
        Self {
            inbound,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            finished: false,
        }
    }

    fn data_frame(value: &serde_json::Value) -> Bytes {
        let mut line = value.to_string();
        line.push('\n');
        Bytes::from(line)
    }

    /// The terminal frame. Built through serde so the error message is
    /// always correctly escaped.
    fn end_frame(error: &str) -> Bytes {
        let mut line = serde_json::json!({ "end": true, "error": error }).to_string();
        line.push('\n');
        Bytes::from(line)
    }
}

impl Stream for NdjsonRelay {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if self.deadline.as_mut().poll(cx).is_ready() {
            self.finished = true;
            return Poll::Ready(Some(Self::end_frame("Deadline exceeded")));
        }
        match Pin::new(&mut self.inbound).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Self::data_frame(&value))),
            Poll::Ready(Some(Err(status))) => {
                self.finished = true;
                Poll::Ready(Some(Self::end_frame(status.message())))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(Self::end_frame("")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_timeouts_are_rejected() {
        assert!(matches!(deadline_for(0), Err(CallError::InvalidTimeout)));
        assert!(matches!(deadline_for(-3), Err(CallError::InvalidTimeout)));
        assert!(deadline_for(5).is_ok());
    }

    #[test]
    fn absurdly_large_timeouts_error_instead_of_overflowing() {
        assert!(matches!(
            deadline_for(i64::MAX),
            Err(CallError::InvalidTimeout)
        ));
    }

    #[test]
    fn end_frame_escapes_the_error_message() {
        let frame = NdjsonRelay::end_frame("bad \"quote\"\nnewline");
        let line = std::str::from_utf8(&frame).unwrap();
        let (json, rest) = line.split_at(line.len() - 1);
        assert_eq!(rest, "\n");
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["end"], true);
        assert_eq!(parsed["error"], "bad \"quote\"\nnewline");
    }
}
