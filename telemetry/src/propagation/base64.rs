//! # Base64 Format
//!
//! Text-safe wrapper around a [`BinaryFormat`], e.g. for headers or log lines.
//! There is a blanket implementation for every `BinaryFormat`.
use crate::propagation::binary::BinaryFormat;
use crate::trace::SpanContext;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Used to serialize and deserialize `SpanContext`s to and from a base64
/// representation.
pub trait Base64Format {
    /// Serializes span context into a base64 encoded string
    fn serialize_into_base64(&self, context: &SpanContext) -> String;

    /// Deserialize a span context from a base64 encoded string, falling back
    /// to [`SpanContext::empty_context`] on malformed input.
    fn deserialize_from_base64(&self, base64: &str) -> SpanContext;
}

impl<Format> Base64Format for Format
where
    Format: BinaryFormat,
{
    fn serialize_into_base64(&self, context: &SpanContext) -> String {
        STANDARD.encode(self.serialize_into_bytes(context))
    }

    fn deserialize_from_base64(&self, base64: &str) -> SpanContext {
        match STANDARD.decode(base64.as_bytes()) {
            Ok(bytes) => self.deserialize_from_bytes(&bytes),
            Err(_) => SpanContext::empty_context(),
        }
    }
}
