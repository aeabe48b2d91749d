//! # Telemetry SDK
//!
//! The in-process metrics pipeline. Instruments record measurements into an
//! [`metrics::Accumulator`], which keeps one aggregator per series. On every
//! collection a processor turns the updated series into a
//! [`export::metrics::CheckpointSet`] of immutable records, which a
//! controller hands to an exporter.
//!
//! ```
//! use telemetry::{Context, KeyValue};
//! use telemetry_sdk::export::metrics::aggregation::cumulative_temporality_selector;
//! use telemetry_sdk::metrics::{controllers, processors, selectors, MeterProvider};
//!
//! let controller = controllers::basic(processors::factory(
//!     selectors::simple::Selector::Inexpensive,
//!     cumulative_temporality_selector(),
//! ))
//! .build();
//!
//! let requests = controller.meter("my-app").u64_counter("requests").init();
//! requests.add(5, &[KeyValue::new("route", "/a")]);
//!
//! let checkpoint_set = controller.collect(&Context::new()).unwrap();
//! assert_eq!(checkpoint_set.len(), 1);
//! ```
//!
//! ## Crate Feature Flags
//!
//! * `metrics`: Includes the metrics pipeline.
//! * `internal-logs`: Emits the pipeline's internal logs through `tracing`.
//!
//! Both are enabled by default.
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

pub mod export;
#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;
pub mod resource;

pub use resource::Resource;
