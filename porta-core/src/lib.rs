//! # Porta Core
//!
//! `porta-core` is the library powering the Porta gateway: a dynamic
//! descriptor-and-invocation pipeline that can talk to any gRPC server
//! without compile-time knowledge of the Protobuf schema.
//!
//! ## Key Components
//!
//! * **[`registry::SchemaRegistry`]:** The single source of truth for the
//!   active compiled schema and the ordered list of import roots. Uploads
//!   replace the schema atomically; in-flight calls keep the descriptors
//!   they already resolved.
//! * **[`compiler::SchemaCompiler`]:** The driver around the external
//!   `protoc` binary that turns uploaded `.proto` sources into a serialized
//!   `FileDescriptorSet`. A trait, so tests can substitute a fake compiler.
//! * **[`invoke::Invoker`]:** Per-call gRPC execution. Unary exchanges
//!   return a single JSON value; server-streaming exchanges return an
//!   [`invoke::NdjsonRelay`] that yields one newline-delimited JSON chunk
//!   per server message.
//!
//! ## JsonCodec
//!
//! An implementation of `tonic::codec::Codec` that transcodes JSON to
//! Protobuf bytes (and vice versa) on the fly, driven entirely by message
//! descriptors. See [`grpc::codec`].
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure
//! that consumers use compatible versions of these underlying dependencies.
pub mod compiler;
pub mod grpc;
pub mod invoke;
pub mod registry;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
