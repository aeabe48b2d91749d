//! Metrics aggregation
//!
//! Read-only views over aggregator state. Exporters query a record's
//! aggregator through these capabilities rather than through its concrete
//! type. Test for the strongest capability first: a histogram is also a sum
//! and a count.
use std::fmt;
use std::time::SystemTime;

use crate::metrics::sdk_api::Number;
use telemetry::metrics::Result;

mod temporality;

pub use temporality::*;

/// An interface returned by an [`Aggregator`] containing an interval of metric
/// data.
///
/// [`Aggregator`]: crate::metrics::aggregators::Aggregator
pub trait Aggregation {
    /// Identifies the algorithm that produced the aggregation (e.g.,
    /// [`AggregationKind::Sum`]).
    fn kind(&self) -> &AggregationKind;
}

/// Sum returns an aggregated sum.
pub trait Sum: Aggregation {
    /// The sum of the currently aggregated metrics
    fn sum(&self) -> Result<Number>;
}

/// Count returns the number of values that were aggregated.
pub trait Count: Aggregation {
    /// The count of the currently aggregated metrics
    fn count(&self) -> Result<u64>;
}

/// Min returns the minimum value over the set of values that were aggregated.
pub trait Min: Aggregation {
    /// The min of the currently aggregated metrics
    fn min(&self) -> Result<Number>;
}

/// Max returns the maximum value over the set of values that were aggregated.
pub trait Max: Aggregation {
    /// The max of the currently aggregated metrics
    fn max(&self) -> Result<Number>;
}

/// MinMaxSumCount supports the Min, Max, Sum, and Count interfaces.
pub trait MinMaxSumCount: Min + Max + Sum + Count {}

/// LastValue returns the latest value that was aggregated.
pub trait LastValue: Aggregation {
    /// The last value of the currently aggregated metrics
    fn last_value(&self) -> Result<(Number, SystemTime)>;
}

/// Buckets represent histogram buckets boundaries and counts.
///
/// For a Histogram with N defined boundaries, e.g, [x, y, z]. There are N+1
/// counts: [-inf, x), [x, y), [y, z), [z, +inf]
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets {
    /// Boundaries are floating point numbers, even when
    /// aggregating integers.
    boundaries: Vec<f64>,
    counts: Vec<u64>,
}

impl Buckets {
    /// Create new buckets
    pub fn new(boundaries: Vec<f64>, counts: Vec<u64>) -> Self {
        Buckets { boundaries, counts }
    }

    /// Boundaries of the histogram buckets
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Counts of the histogram buckets
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }
}

/// Histogram returns the count of events in pre-determined buckets.
pub trait Histogram: Sum + Count + Aggregation {
    /// Buckets for this histogram.
    fn histogram(&self) -> Result<Buckets>;
}

/// The closed set of aggregation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationKind {
    /// Aggregations that return an aggregated sum.
    Sum,
    /// Aggregations that return only the latest value.
    LastValue,
    /// Aggregations that return min, max, sum and count.
    MinMaxSumCount,
    /// Aggregations that return a distribution
    Histogram,
}

impl AggregationKind {
    /// The static name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "SUM",
            AggregationKind::LastValue => "LAST_VALUE",
            AggregationKind::MinMaxSumCount => "MIN_MAX_SUM_COUNT",
            AggregationKind::Histogram => "HISTOGRAM",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
