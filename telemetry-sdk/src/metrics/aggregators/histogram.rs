use crate::export::metrics::aggregation::{
    Aggregation, AggregationKind, Buckets, Count, Histogram, Sum,
};
use crate::metrics::sdk_api::{Descriptor, Number, NumberKind};
use std::sync::Mutex;
use telemetry::metrics::{MetricsError, Result};

/// Create a new histogram for the given descriptor with the given boundaries.
///
/// Boundaries are sorted and de-duplicated; NaN boundaries are ignored.
pub fn histogram(descriptor: &Descriptor, boundaries: &[f64]) -> HistogramAggregator {
    let mut sorted_boundaries: Vec<f64> = boundaries
        .iter()
        .copied()
        .filter(|b| !b.is_nan())
        .collect();
    sorted_boundaries.sort_by(|a, b| a.total_cmp(b));
    sorted_boundaries.dedup();
    let kind = *descriptor.number_kind();
    let state = State::empty(&kind, sorted_boundaries.len());

    HistogramAggregator {
        inner: Mutex::new(state),
        boundaries: sorted_boundaries,
        kind,
    }
}

/// This aggregator observes events and counts them in pre-determined buckets. It
/// also calculates the sum and count of all events.
#[derive(Debug)]
pub struct HistogramAggregator {
    inner: Mutex<State>,
    boundaries: Vec<f64>,
    kind: NumberKind,
}

#[derive(Clone, Debug)]
struct State {
    bucket_counts: Vec<u64>,
    count: u64,
    sum: Number,
}

impl State {
    fn empty(kind: &NumberKind, boundaries: usize) -> Self {
        State {
            bucket_counts: vec![0; boundaries + 1],
            count: 0,
            sum: kind.zero(),
        }
    }
}

impl HistogramAggregator {
    pub(crate) fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        let kind = descriptor.number_kind();
        let as_float = number.to_f64(kind);
        let bucket = self.boundaries.partition_point(|b| *b <= as_float);

        let mut state = self.inner.lock()?;
        state.count = state.count.saturating_add(1);
        state.sum = state.sum.add(kind, number);
        state.bucket_counts[bucket] = state.bucket_counts[bucket].saturating_add(1);
        Ok(())
    }

    pub(crate) fn synchronized_move(
        &self,
        destination: &HistogramAggregator,
        _descriptor: &Descriptor,
    ) -> Result<()> {
        self.check_boundaries(destination)?;
        let mut state = self.inner.lock()?;
        let mut other = destination.inner.lock()?;
        let empty = State::empty(&self.kind, self.boundaries.len());
        *other = std::mem::replace(&mut *state, empty);
        Ok(())
    }

    pub(crate) fn merge(&self, other: &HistogramAggregator, descriptor: &Descriptor) -> Result<()> {
        self.check_boundaries(other)?;
        let theirs = other.inner.lock()?.clone();
        let mut ours = self.inner.lock()?;
        ours.count = ours.count.saturating_add(theirs.count);
        ours.sum = ours.sum.add(descriptor.number_kind(), &theirs.sum);
        for (count, other_count) in ours.bucket_counts.iter_mut().zip(theirs.bucket_counts) {
            *count = count.saturating_add(other_count);
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Result<HistogramAggregator> {
        let state = self.inner.lock()?.clone();
        Ok(HistogramAggregator {
            inner: Mutex::new(state),
            boundaries: self.boundaries.clone(),
            kind: self.kind,
        })
    }

    fn check_boundaries(&self, other: &HistogramAggregator) -> Result<()> {
        if self.boundaries == other.boundaries {
            Ok(())
        } else {
            Err(MetricsError::InconsistentAggregator(format!(
                "histogram boundaries differ: {:?} and {:?}",
                self.boundaries, other.boundaries
            )))
        }
    }
}

impl Sum for HistogramAggregator {
    fn sum(&self) -> Result<Number> {
        Ok(self.inner.lock()?.sum)
    }
}

impl Count for HistogramAggregator {
    fn count(&self) -> Result<u64> {
        Ok(self.inner.lock()?.count)
    }
}

impl Histogram for HistogramAggregator {
    fn histogram(&self) -> Result<Buckets> {
        let state = self.inner.lock()?;
        Ok(Buckets::new(
            self.boundaries.clone(),
            state.bucket_counts.clone(),
        ))
    }
}

impl Aggregation for HistogramAggregator {
    fn kind(&self) -> &AggregationKind {
        &AggregationKind::Histogram
    }
}
