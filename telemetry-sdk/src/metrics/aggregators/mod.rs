//! Metric Aggregators
//!
//! An [`Aggregator`] tracks the sequence of updates made to one series of an
//! instrument. Counters and up-down counters commonly use a [`SumAggregator`];
//! the distribution instruments choose between aggregators with different cost
//! and accuracy trade-offs.
//!
//! The set of aggregators is closed. Every operation dispatches with an
//! exhaustive match, and combining two aggregators of different variants is
//! reported as [`MetricsError::InconsistentAggregator`].
use crate::export::metrics::aggregation::{
    Aggregation, AggregationKind, Count, Histogram, LastValue, MinMaxSumCount, Sum,
};
use crate::metrics::sdk_api::{Descriptor, Number, NumberKind};
use telemetry::metrics::{MetricsError, Result};

mod histogram;
mod last_value;
mod min_max_sum_count;
mod sum;

pub use histogram::{histogram, HistogramAggregator};
pub use last_value::{last_value, LastValueAggregator};
pub use min_max_sum_count::{min_max_sum_count, MinMaxSumCountAggregator};
pub use sum::{sum, SumAggregator};

/// RangeTest is a common routine for testing for valid input values. This
/// rejects NaN values. This rejects negative values when the metric instrument
/// does not support negative values, i.e. monotonic counters and counter
/// observers.
pub fn range_test(number: &Number, descriptor: &Descriptor) -> Result<()> {
    let kind = descriptor.number_kind();
    if kind == &NumberKind::F64 && number.is_nan() {
        return Err(MetricsError::NaNInput);
    }

    if descriptor.instrument_kind().monotonic() && number.is_negative(kind) {
        return Err(MetricsError::NegativeInput);
    }

    Ok(())
}

/// The aggregation state of one series.
///
/// All operations take `&self` and are safe to call from many threads at
/// once. `update` is the hot path; `synchronized_move`, `merge` and
/// `subtract` run on the collecting thread.
#[derive(Debug)]
pub enum Aggregator {
    /// Running sum, see [`SumAggregator`].
    Sum(SumAggregator),
    /// Most recent value, see [`LastValueAggregator`].
    LastValue(LastValueAggregator),
    /// Distribution summary, see [`MinMaxSumCountAggregator`].
    MinMaxSumCount(MinMaxSumCountAggregator),
    /// Bucketed distribution, see [`HistogramAggregator`].
    Histogram(HistogramAggregator),
}

impl Aggregator {
    /// Update receives a new measured value and incorporates it into the
    /// aggregation. Callers are expected to have range tested the value with
    /// [`range_test`] already.
    pub fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        match self {
            Aggregator::Sum(agg) => agg.update(number, descriptor),
            Aggregator::LastValue(agg) => agg.update(number, descriptor),
            Aggregator::MinMaxSumCount(agg) => agg.update(number, descriptor),
            Aggregator::Histogram(agg) => agg.update(number, descriptor),
        }
    }

    /// This method is called during collection to finish one period of
    /// aggregation by atomically saving the currently-updating state into
    /// `destination` and resetting the current state to the zero state.
    ///
    /// `destination` must be of the same variant as `self`.
    pub fn synchronized_move(&self, destination: &Aggregator, descriptor: &Descriptor) -> Result<()> {
        match (self, destination) {
            (Aggregator::Sum(agg), Aggregator::Sum(other)) => {
                agg.synchronized_move(other, descriptor)
            }
            (Aggregator::LastValue(agg), Aggregator::LastValue(other)) => {
                agg.synchronized_move(other, descriptor)
            }
            (Aggregator::MinMaxSumCount(agg), Aggregator::MinMaxSumCount(other)) => {
                agg.synchronized_move(other, descriptor)
            }
            (Aggregator::Histogram(agg), Aggregator::Histogram(other)) => {
                agg.synchronized_move(other, descriptor)
            }
            _ => Err(inconsistent(self, destination)),
        }
    }

    /// Combines the checkpointed state of `other` into this aggregator's
    /// state. Merging is commutative: `a.merge(b)` and `b.merge(a)` describe
    /// the same data, except that last-value ties favour the later write.
    pub fn merge(&self, other: &Aggregator, descriptor: &Descriptor) -> Result<()> {
        match (self, other) {
            (Aggregator::Sum(agg), Aggregator::Sum(other)) => agg.merge(other, descriptor),
            (Aggregator::LastValue(agg), Aggregator::LastValue(other)) => {
                agg.merge(other, descriptor)
            }
            (Aggregator::MinMaxSumCount(agg), Aggregator::MinMaxSumCount(other)) => {
                agg.merge(other, descriptor)
            }
            (Aggregator::Histogram(agg), Aggregator::Histogram(other)) => {
                agg.merge(other, descriptor)
            }
            _ => Err(inconsistent(self, other)),
        }
    }

    /// Subtracts `operand` from this aggregator's state, turning a cumulative
    /// value into the change since `operand` was taken. Only sums support
    /// subtraction.
    pub fn subtract(&self, operand: &Aggregator, descriptor: &Descriptor) -> Result<()> {
        match (self, operand) {
            (Aggregator::Sum(agg), Aggregator::Sum(other)) => agg.subtract(other, descriptor),
            _ => Err(inconsistent(self, operand)),
        }
    }

    /// An independent copy of the current state.
    pub fn snapshot(&self) -> Result<Aggregator> {
        Ok(match self {
            Aggregator::Sum(agg) => Aggregator::Sum(agg.snapshot()),
            Aggregator::LastValue(agg) => Aggregator::LastValue(agg.snapshot()?),
            Aggregator::MinMaxSumCount(agg) => Aggregator::MinMaxSumCount(agg.snapshot()?),
            Aggregator::Histogram(agg) => Aggregator::Histogram(agg.snapshot()?),
        })
    }

    /// The aggregation algorithm of this aggregator.
    pub fn kind(&self) -> &AggregationKind {
        self.aggregation().kind()
    }

    /// The aggregator as a generic [`Aggregation`].
    pub fn aggregation(&self) -> &dyn Aggregation {
        match self {
            Aggregator::Sum(agg) => agg,
            Aggregator::LastValue(agg) => agg,
            Aggregator::MinMaxSumCount(agg) => agg,
            Aggregator::Histogram(agg) => agg,
        }
    }

    /// The running sum, if this aggregator keeps one.
    pub fn as_sum(&self) -> Option<&dyn Sum> {
        match self {
            Aggregator::Sum(agg) => Some(agg),
            Aggregator::MinMaxSumCount(agg) => Some(agg),
            Aggregator::Histogram(agg) => Some(agg),
            Aggregator::LastValue(_) => None,
        }
    }

    /// The number of aggregated measurements, if this aggregator counts them.
    pub fn as_count(&self) -> Option<&dyn Count> {
        match self {
            Aggregator::MinMaxSumCount(agg) => Some(agg),
            Aggregator::Histogram(agg) => Some(agg),
            Aggregator::Sum(_) | Aggregator::LastValue(_) => None,
        }
    }

    /// Min, max, sum and count, if this aggregator keeps all four.
    pub fn as_min_max(&self) -> Option<&dyn MinMaxSumCount> {
        match self {
            Aggregator::MinMaxSumCount(agg) => Some(agg),
            _ => None,
        }
    }

    /// The last value, if this is a last-value aggregator.
    pub fn as_last_value(&self) -> Option<&dyn LastValue> {
        match self {
            Aggregator::LastValue(agg) => Some(agg),
            _ => None,
        }
    }

    /// The bucket counts, if this is a histogram aggregator.
    pub fn as_histogram(&self) -> Option<&dyn Histogram> {
        match self {
            Aggregator::Histogram(agg) => Some(agg),
            _ => None,
        }
    }
}

fn inconsistent(expected: &Aggregator, actual: &Aggregator) -> MetricsError {
    MetricsError::InconsistentAggregator(format!(
        "expected {}, got {}",
        expected.kind(),
        actual.kind()
    ))
}

impl From<SumAggregator> for Aggregator {
    fn from(agg: SumAggregator) -> Self {
        Aggregator::Sum(agg)
    }
}

impl From<LastValueAggregator> for Aggregator {
    fn from(agg: LastValueAggregator) -> Self {
        Aggregator::LastValue(agg)
    }
}

impl From<MinMaxSumCountAggregator> for Aggregator {
    fn from(agg: MinMaxSumCountAggregator) -> Self {
        Aggregator::MinMaxSumCount(agg)
    }
}

impl From<HistogramAggregator> for Aggregator {
    fn from(agg: HistogramAggregator) -> Self {
        Aggregator::Histogram(agg)
    }
}
