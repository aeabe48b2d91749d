use crate::export::metrics::aggregation::AggregationKind;
use crate::metrics::sdk_api::{Descriptor, InstrumentKind};

#[derive(Clone, Debug)]
struct ConstantTemporalitySelector(Temporality);

impl TemporalitySelector for ConstantTemporalitySelector {
    fn temporality_for(&self, _descriptor: &Descriptor, _kind: &AggregationKind) -> Temporality {
        self.0
    }
}

/// Returns an [`TemporalitySelector`] that returns a constant [`Temporality`].
pub fn constant_temporality_selector(
    temporality: Temporality,
) -> impl TemporalitySelector + Clone + Send + Sync {
    ConstantTemporalitySelector(temporality)
}

/// Returns an [`TemporalitySelector`] that always returns [`Temporality::Cumulative`].
pub fn cumulative_temporality_selector() -> impl TemporalitySelector + Clone + Send + Sync {
    constant_temporality_selector(Temporality::Cumulative)
}

/// Returns an [`TemporalitySelector`] that always returns [`Temporality::Delta`].
pub fn delta_temporality_selector() -> impl TemporalitySelector + Clone + Send + Sync {
    constant_temporality_selector(Temporality::Delta)
}

/// Returns a [`TemporalitySelector`] that picks whichever [`Temporality`]
/// needs no memory across collections: cumulative for precomputed sums, delta
/// for everything else.
pub fn stateless_temporality_selector() -> impl TemporalitySelector + Clone + Send + Sync {
    StatelessTemporalitySelector
}

#[derive(Clone, Debug)]
struct StatelessTemporalitySelector;

impl TemporalitySelector for StatelessTemporalitySelector {
    fn temporality_for(&self, descriptor: &Descriptor, kind: &AggregationKind) -> Temporality {
        if kind == &AggregationKind::Sum && descriptor.instrument_kind().precomputed_sum() {
            Temporality::Cumulative
        } else {
            Temporality::Delta
        }
    }
}

/// Temporality indicates the temporal aggregation exported by an exporter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Temporality {
    /// Running totals since the series started.
    Cumulative,
    /// Changes since the previous collection.
    Delta,
}

impl Temporality {
    /// Returns whether a temporality of this kind requires memory to export correctly.
    pub fn memory_required(&self, kind: &InstrumentKind) -> bool {
        match kind {
            InstrumentKind::Histogram
            | InstrumentKind::GaugeObserver
            | InstrumentKind::Counter
            | InstrumentKind::UpDownCounter => {
                // Cumulative-oriented instruments:
                *self == Temporality::Cumulative
            }
            InstrumentKind::CounterObserver | InstrumentKind::UpDownCounterObserver => {
                // Delta-oriented instruments:
                *self == Temporality::Delta
            }
        }
    }
}

/// TemporalitySelector is a sub-interface of Exporter used to indicate
/// whether the Processor should compute Delta or Cumulative
/// Aggregations.
pub trait TemporalitySelector {
    /// TemporalityFor should return the correct Temporality that
    /// should be used when exporting data for the given metric
    /// instrument and Aggregator kind.
    fn temporality_for(&self, descriptor: &Descriptor, kind: &AggregationKind) -> Temporality;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::sdk_api::NumberKind;
    use rstest::rstest;

    #[rstest]
    #[case(InstrumentKind::Counter, Temporality::Cumulative, true)]
    #[case(InstrumentKind::Counter, Temporality::Delta, false)]
    #[case(InstrumentKind::GaugeObserver, Temporality::Cumulative, true)]
    #[case(InstrumentKind::CounterObserver, Temporality::Cumulative, false)]
    #[case(InstrumentKind::CounterObserver, Temporality::Delta, true)]
    fn memory_requirements(
        #[case] kind: InstrumentKind,
        #[case] temporality: Temporality,
        #[case] required: bool,
    ) {
        assert_eq!(temporality.memory_required(&kind), required);
    }

    #[test]
    fn stateless_selector_avoids_memory() {
        let selector = stateless_temporality_selector();
        for kind in [
            InstrumentKind::Counter,
            InstrumentKind::Histogram,
            InstrumentKind::CounterObserver,
            InstrumentKind::UpDownCounterObserver,
        ] {
            let descriptor = Descriptor::new("m".into(), kind, NumberKind::I64, None, None);
            let temporality = selector.temporality_for(&descriptor, &AggregationKind::Sum);
            assert!(!temporality.memory_required(&kind), "{:?}", kind);
        }
    }
}
