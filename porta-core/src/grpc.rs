//! Generic gRPC transport: a descriptor-driven JSON codec and a thin
//! wrapper over `tonic`'s generic client. Nothing in here knows the shape
//! of the messages being exchanged.
pub mod client;
pub mod codec;
