//! Metric Selectors
pub mod simple;
