use crate::export::metrics::aggregation::{
    Aggregation, AggregationKind, Count, Max, Min, MinMaxSumCount, Sum,
};
use crate::metrics::sdk_api::{Descriptor, Number, NumberKind};
use std::cmp::Ordering;
use std::sync::Mutex;
use telemetry::metrics::{MetricsError, Result};

/// Create a new `MinMaxSumCountAggregator`
pub fn min_max_sum_count(descriptor: &Descriptor) -> MinMaxSumCountAggregator {
    MinMaxSumCountAggregator {
        inner: Mutex::new(None),
        kind: *descriptor.number_kind(),
    }
}

/// An aggregator that aggregates events that form a distribution, keeping
/// only the min, max, sum, and count.
#[derive(Debug)]
pub struct MinMaxSumCountAggregator {
    inner: Mutex<Option<State>>,
    kind: NumberKind,
}

#[derive(Clone, Copy, Debug)]
struct State {
    count: u64,
    sum: Number,
    min: Number,
    max: Number,
}

impl State {
    fn single(number: Number) -> Self {
        State {
            count: 1,
            sum: number,
            min: number,
            max: number,
        }
    }

    fn combine(&mut self, kind: &NumberKind, other: &State) {
        self.count = self.count.saturating_add(other.count);
        self.sum = self.sum.add(kind, &other.sum);
        if other.min.partial_cmp(kind, &self.min) == Some(Ordering::Less) {
            self.min = other.min;
        }
        if other.max.partial_cmp(kind, &self.max) == Some(Ordering::Greater) {
            self.max = other.max;
        }
    }
}

impl MinMaxSumCountAggregator {
    pub(crate) fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        let mut inner = self.inner.lock()?;
        match inner.as_mut() {
            Some(state) => state.combine(descriptor.number_kind(), &State::single(*number)),
            None => *inner = Some(State::single(*number)),
        }
        Ok(())
    }

    pub(crate) fn synchronized_move(
        &self,
        destination: &MinMaxSumCountAggregator,
        _descriptor: &Descriptor,
    ) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let mut other = destination.inner.lock()?;
        *other = inner.take();
        Ok(())
    }

    pub(crate) fn merge(
        &self,
        other: &MinMaxSumCountAggregator,
        descriptor: &Descriptor,
    ) -> Result<()> {
        let theirs = *other.inner.lock()?;
        let mut ours = self.inner.lock()?;
        match (ours.as_mut(), theirs) {
            (_, None) => {}
            (None, Some(state)) => *ours = Some(state),
            (Some(current), Some(state)) => current.combine(descriptor.number_kind(), &state),
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Result<MinMaxSumCountAggregator> {
        let state = *self.inner.lock()?;
        Ok(MinMaxSumCountAggregator {
            inner: Mutex::new(state),
            kind: self.kind,
        })
    }
}

impl Min for MinMaxSumCountAggregator {
    fn min(&self) -> Result<Number> {
        self.inner
            .lock()?
            .map(|state| state.min)
            .ok_or(MetricsError::NoDataCollected)
    }
}

impl Max for MinMaxSumCountAggregator {
    fn max(&self) -> Result<Number> {
        self.inner
            .lock()?
            .map(|state| state.max)
            .ok_or(MetricsError::NoDataCollected)
    }
}

impl Sum for MinMaxSumCountAggregator {
    fn sum(&self) -> Result<Number> {
        Ok(self
            .inner
            .lock()?
            .map_or(self.kind.zero(), |state| state.sum))
    }
}

impl Count for MinMaxSumCountAggregator {
    fn count(&self) -> Result<u64> {
        Ok(self.inner.lock()?.map_or(0, |state| state.count))
    }
}

impl MinMaxSumCount for MinMaxSumCountAggregator {}

impl Aggregation for MinMaxSumCountAggregator {
    fn kind(&self) -> &AggregationKind {
        &AggregationKind::MinMaxSumCount
    }
}
