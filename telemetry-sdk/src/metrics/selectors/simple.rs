//! Simple Metric Selectors
use crate::export::metrics::AggregatorSelector;
use crate::metrics::aggregators::{self, Aggregator};
use crate::metrics::sdk_api::{Descriptor, InstrumentKind};

/// Aggregator selectors that choose by instrument kind only.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Sums for adding instruments, last values for gauges and
    /// min/max/sum/count for histograms. Faster and smaller than the other
    /// choices.
    Inexpensive,
    /// Like [`Selector::Inexpensive`], but histogram instruments keep bucket
    /// counts for the given boundaries.
    Histogram(Vec<f64>),
    /// Every instrument keeps only its most recent value.
    LastValue,
}

impl AggregatorSelector for Selector {
    fn aggregator_for(&self, descriptor: &Descriptor) -> Option<Aggregator> {
        let aggregator = match (self, descriptor.instrument_kind()) {
            (Selector::LastValue, _) | (_, InstrumentKind::GaugeObserver) => {
                aggregators::last_value().into()
            }
            (Selector::Inexpensive, InstrumentKind::Histogram) => {
                aggregators::min_max_sum_count(descriptor).into()
            }
            (Selector::Histogram(boundaries), InstrumentKind::Histogram) => {
                aggregators::histogram(descriptor, boundaries).into()
            }
            _ => aggregators::sum().into(),
        };

        Some(aggregator)
    }
}
