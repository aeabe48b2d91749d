//! Identity, attribute and error types shared by the telemetry metrics
//! pipeline.
//!
//! This crate holds the small, stable vocabulary that instrumented code and
//! the `telemetry_sdk` pipeline agree on:
//!
//! * [`KeyValue`] attributes and the canonical [`labels::LabelSet`] used as
//!   series identity.
//! * [`trace`] identity types ([`trace::TraceId`], [`trace::SpanId`],
//!   [`trace::SpanContext`]) and the [`propagation`] binary wire format.
//! * [`Context`], carrying cancellation for collection sweeps.
//! * [`metrics::MetricsError`] and the [`global`] error handler.
//!
//! ## Crate Feature Flags
//!
//! * `metrics`: Includes the metrics error types.
//! * `internal-logs`: Forwards the internal logging macros to `tracing`.
//!
//! The default feature flags are ["metrics", "internal-logs"].
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

pub mod global;

mod common;
pub use common::{Array, Key, KeyValue, StringValue, Value};

mod context;
pub use context::{CancellationHandle, Context};

pub mod labels;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

pub mod propagation;

pub mod trace;

#[doc(hidden)]
#[cfg(feature = "internal-logs")]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}
