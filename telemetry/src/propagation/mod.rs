//! Wire formats for carrying a [`SpanContext`](crate::trace::SpanContext)
//! across process boundaries.
//!
//! [`binary`] defines the fixed 29 byte layout; [`base64`] wraps any binary
//! format in a text-safe encoding. Decoding never fails: malformed input
//! yields [`SpanContext::empty_context`](crate::trace::SpanContext::empty_context).
pub mod base64;
pub mod binary;

pub use self::base64::Base64Format;
pub use binary::{BinaryFormat, BinaryPropagator};
