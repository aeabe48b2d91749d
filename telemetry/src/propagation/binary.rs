//! # Binary Propagator
//!
//! Layout of an encoded span context:
//!
//! | offset | size | content |
//! |---|---|---|
//! | 0 | 1 | format version (`0`) |
//! | 1 | 1 | field tag `0` |
//! | 2 | 16 | trace id, big endian |
//! | 18 | 1 | field tag `1` |
//! | 19 | 8 | span id, big endian |
//! | 27 | 1 | field tag `2` |
//! | 28 | 1 | trace flags |
//!
//! Decoders accept any version byte so that newer writers stay readable. The
//! trace id and span id fields are mandatory. The flags field may be omitted
//! entirely, in which case the flags are zero, but a flags tag without its
//! value byte is a length mismatch. Bytes after the flags field are ignored.
use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId};

/// Size of an encoded span context.
pub const ENCODED_LEN: usize = 29;

const VERSION: u8 = 0;
const TRACE_ID_FIELD: u8 = 0;
const SPAN_ID_FIELD: u8 = 1;
const TRACE_FLAGS_FIELD: u8 = 2;

/// Used to serialize and deserialize `SpanContext`s to and from a binary
/// representation.
pub trait BinaryFormat {
    /// Serializes span context into a byte array and returns the array.
    ///
    /// Invalid contexts serialize to all zeroes.
    fn serialize_into_bytes(&self, context: &SpanContext) -> [u8; ENCODED_LEN];

    /// Deserializes a span context from a byte slice, falling back to
    /// [`SpanContext::empty_context`] on any malformed input.
    fn deserialize_from_bytes(&self, bytes: &[u8]) -> SpanContext;
}

/// Extracts and injects `SpanContext`s from byte arrays.
#[derive(Debug, Default)]
pub struct BinaryPropagator {
    _private: (),
}

impl BinaryPropagator {
    /// Create a new binary propagator.
    pub fn new() -> Self {
        BinaryPropagator::default()
    }
}

impl BinaryFormat for BinaryPropagator {
    fn serialize_into_bytes(&self, context: &SpanContext) -> [u8; ENCODED_LEN] {
        let mut res = [0u8; ENCODED_LEN];
        if !context.is_valid() {
            return res;
        }
        res[0] = VERSION;
        res[1] = TRACE_ID_FIELD;
        res[2..18].copy_from_slice(&context.trace_id().to_bytes());
        res[18] = SPAN_ID_FIELD;
        res[19..27].copy_from_slice(&context.span_id().to_bytes());
        res[27] = TRACE_FLAGS_FIELD;
        res[28] = context.trace_flags().to_u8();

        res
    }

    fn deserialize_from_bytes(&self, bytes: &[u8]) -> SpanContext {
        decode(bytes).unwrap_or_else(SpanContext::empty_context)
    }
}

fn decode(bytes: &[u8]) -> Option<SpanContext> {
    // skip the version byte
    let rest = bytes.get(1..)?;

    let (trace_id, rest) = read_field::<16>(rest, TRACE_ID_FIELD)?;
    let (span_id, rest) = read_field::<8>(rest, SPAN_ID_FIELD)?;
    let trace_flags = if rest.is_empty() {
        TraceFlags::default()
    } else {
        let ([flags], _) = read_field::<1>(rest, TRACE_FLAGS_FIELD)?;
        TraceFlags::new(flags)
    };

    let span_context = SpanContext::new(
        TraceId::from_bytes(trace_id),
        SpanId::from_bytes(span_id),
        trace_flags,
        true,
    );

    span_context.is_valid().then_some(span_context)
}

/// Reads `tag` followed by exactly `N` value bytes.
fn read_field<const N: usize>(bytes: &[u8], tag: u8) -> Option<([u8; N], &[u8])> {
    let (&found, rest) = bytes.split_first()?;
    if found != tag || rest.len() < N {
        return None;
    }
    let (value, rest) = rest.split_at(N);
    let value: [u8; N] = value.try_into().ok()?;
    Some((value, rest))
}
