//! # Dynamic Message Codec
//!
//! Bridges JSON and typed Protobuf messages without any compile-time
//! knowledge of the schema: every field access routes through the message
//! descriptor, no generated types exist anywhere in the pipeline.
//!
//! Two layers live here:
//!
//! * [`decode_json`] / [`encode_json`]: the plain JSON <-> [`DynamicMessage`]
//!   conversions, used by the invokers to validate request payloads up front.
//! * [`JsonCodec`]: a `tonic::codec::Codec` whose encode and decode types
//!   are both `serde_json::Value`, letting `tonic` carry JSON callers all
//!   the way to the Protobuf wire format and back.
//!
//! The JSON mapping is the canonical Protobuf one as implemented by
//! `prost-reflect`: `snake_case` and `camelCase` field keys are both
//! accepted, enums match by name or number, and unknown fields are
//! rejected. That rejection policy applies uniformly to unary and
//! streaming requests.

use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// Builds a message typed by `desc` out of untyped JSON.
pub fn decode_json(
    desc: &MessageDescriptor,
    value: serde_json::Value,
) -> Result<DynamicMessage, serde_json::Error> {
    // serde_json::Value is itself a Deserializer, so it can be handed to
    // DynamicMessage::deserialize directly.
    DynamicMessage::deserialize(desc.clone(), value)
}

/// Renders a dynamic message as canonical Protobuf JSON.
pub fn encode_json(msg: &DynamicMessage) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(msg)
}

/// A `tonic` codec parameterized by the request and response descriptors of
/// a single method, resolved at call time.
pub struct JsonCodec {
    input: MessageDescriptor,
    output: MessageDescriptor,
}

impl JsonCodec {
    pub fn new(input: MessageDescriptor, output: MessageDescriptor) -> Self {
        Self { input, output }
    }
}

impl Codec for JsonCodec {
    type Encode = serde_json::Value;
    type Decode = serde_json::Value;

    type Encoder = JsonEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(self.input.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(self.output.clone())
    }
}

/// Validates outgoing JSON against the input descriptor and writes the
/// resulting message in Protobuf wire format.
pub struct JsonEncoder(MessageDescriptor);

impl Encoder for JsonEncoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        let msg = decode_json(&self.0, item)
            .map_err(|e| Status::invalid_argument(format!("Invalid request payload: {e}")))?;
        msg.encode_raw(dst);
        Ok(())
    }
}

/// Merges incoming wire bytes into an empty output-typed message and
/// serializes it back to JSON.
pub struct JsonDecoder(MessageDescriptor);

impl Decoder for JsonDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode response bytes: {e}")))?;

        let value = encode_json(&msg)
            .map_err(|e| Status::internal(format!("Failed to map response to JSON: {e}")))?;
        Ok(Some(value))
    }
}
