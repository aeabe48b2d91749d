//! Metric Processors
//!
//! Processors turn the accumulations of one collection into the records of a
//! [`CheckpointSet`](crate::export::metrics::CheckpointSet), keeping whatever
//! state the exported temporality needs across collections.
mod basic;
mod reducer;

pub use basic::{factory, BasicProcessor, BasicProcessorBuilder};
pub use reducer::{
    reducer, LabelFilter, LabelFilterSelector, ReducerProcessor, ReducerProcessorBuilder,
};
