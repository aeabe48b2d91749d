//! Trace identity types.
//!
//! The metrics pipeline does not record spans. It only needs stable identity
//! types so that span contexts can cross process boundaries through the
//! [`propagation`](crate::propagation) wire formats.
mod span_context;

pub use span_context::{SpanContext, SpanId, TraceFlags, TraceId};
