use crate::export::metrics::aggregation::{Aggregation, AggregationKind, LastValue};
use crate::metrics::sdk_api::{Descriptor, Number};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;
use telemetry::metrics::{MetricsError, Result};

/// Orders updates across every last-value aggregator in the process, so that
/// merging two aggregators keeps the value written last.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Create a new `LastValueAggregator`
pub fn last_value() -> LastValueAggregator {
    LastValueAggregator {
        inner: Mutex::new(None),
    }
}

/// Aggregates last value events.
#[derive(Debug)]
pub struct LastValueAggregator {
    inner: Mutex<Option<LastValueData>>,
}

#[derive(Clone, Copy, Debug)]
struct LastValueData {
    value: Number,
    timestamp: SystemTime,
    sequence: u64,
}

impl LastValueAggregator {
    pub(crate) fn update(&self, number: &Number, _descriptor: &Descriptor) -> Result<()> {
        let mut inner = self.inner.lock()?;
        *inner = Some(LastValueData {
            value: *number,
            timestamp: SystemTime::now(),
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        });
        Ok(())
    }

    pub(crate) fn synchronized_move(
        &self,
        destination: &LastValueAggregator,
        _descriptor: &Descriptor,
    ) -> Result<()> {
        let mut inner = self.inner.lock()?;
        let mut other = destination.inner.lock()?;
        *other = inner.take();
        Ok(())
    }

    pub(crate) fn merge(&self, other: &LastValueAggregator, _descriptor: &Descriptor) -> Result<()> {
        let theirs = *other.inner.lock()?;
        let mut ours = self.inner.lock()?;
        match (ours.as_ref(), theirs) {
            (_, None) => {}
            (None, Some(data)) => *ours = Some(data),
            (Some(current), Some(data)) => {
                if data.sequence > current.sequence {
                    *ours = Some(data);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Result<LastValueAggregator> {
        let data = *self.inner.lock()?;
        Ok(LastValueAggregator {
            inner: Mutex::new(data),
        })
    }
}

impl Aggregation for LastValueAggregator {
    fn kind(&self) -> &AggregationKind {
        &AggregationKind::LastValue
    }
}

impl LastValue for LastValueAggregator {
    fn last_value(&self) -> Result<(Number, SystemTime)> {
        self.inner
            .lock()?
            .map(|data| (data.value, data.timestamp))
            .ok_or(MetricsError::NoDataCollected)
    }
}
