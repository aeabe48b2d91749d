//! SDK Metrics Controllers
//!
//! A controller owns the accumulator and checkpointer of a pipeline and
//! decides when collections happen: on demand, or periodically on a
//! background thread that pushes to an exporter.
mod basic;

pub use basic::{basic, BasicController, BasicControllerBuilder};
