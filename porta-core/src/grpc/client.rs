//! # Generic gRPC Client
//!
//! A thin, schema-agnostic wrapper over `tonic::client::Grpc`. It never
//! inspects the data it carries; it builds the HTTP/2 path from the method
//! descriptor, attaches the per-call timeout, and lets [`JsonCodec`] do the
//! (de)serialization.
//!
//! The client is generic over the underlying service so that integration
//! tests can drive an in-process tonic server without opening sockets;
//! production code instantiates it with a [`Channel`].

use super::codec::JsonCodec;
use crate::BoxError;
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use std::str::FromStr;
use std::time::Duration;
use tonic::{Status, Streaming, client::GrpcService, transport::Channel};

#[derive(Debug, thiserror::Error)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
}

/// A generic gRPC client whose calls are shaped by method descriptors
/// resolved at runtime.
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: tonic::client::Grpc::new(service),
        }
    }

    /// Performs a unary call (single request -> single response).
    ///
    /// # Returns
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to issue the request at all.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<Result<serde_json::Value, Status>, GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = JsonCodec::new(method.input(), method.output());
        let request = build_request(payload, timeout);

        match self.client.unary(request, wire_path(method), codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a server-streaming call (single request -> stream of
    /// responses). The send side is half-closed as soon as the one request
    /// message is on the wire; messages arrive in server order.
    ///
    /// # Returns
    /// * `Ok(Ok(Streaming))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to issue the request at all.
    pub async fn server_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<Result<Streaming<serde_json::Value>, Status>, GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = JsonCodec::new(method.input(), method.output());
        let request = build_request(payload, timeout);

        match self
            .client
            .server_streaming(request, wire_path(method), codec)
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }
}

/// `/{service_fqn}/{method_name}`, built from the descriptor at call time.
fn wire_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).expect("valid gRPC path")
}

fn build_request(
    payload: serde_json::Value,
    timeout: Duration,
) -> tonic::Request<serde_json::Value> {
    let mut request = tonic::Request::new(payload);
    // Propagated to the server as `grpc-timeout`; the invoker enforces the
    // same deadline client-side.
    request.set_timeout(timeout);
    request
}
