use crate::export::metrics::aggregation::{Aggregation, AggregationKind, Sum};
use crate::metrics::sdk_api::{AtomicNumber, Descriptor, Number};
use telemetry::metrics::Result;

/// Create a new sum aggregator.
pub fn sum() -> SumAggregator {
    SumAggregator::default()
}

/// An aggregator for counter events.
///
/// Updates are lock free. Floating point sums carry the usual rounding error
/// of `f64` addition, so concurrent float updates may differ in the last bits
/// depending on their interleaving.
#[derive(Debug, Default)]
pub struct SumAggregator {
    value: AtomicNumber,
}

impl SumAggregator {
    pub(crate) fn update(&self, number: &Number, descriptor: &Descriptor) -> Result<()> {
        self.value.fetch_add(descriptor.number_kind(), number);
        Ok(())
    }

    pub(crate) fn synchronized_move(
        &self,
        destination: &SumAggregator,
        descriptor: &Descriptor,
    ) -> Result<()> {
        let kind = descriptor.number_kind();
        destination.value.store(&self.value.swap(&kind.zero()));
        Ok(())
    }

    pub(crate) fn merge(&self, other: &SumAggregator, descriptor: &Descriptor) -> Result<()> {
        self.value
            .fetch_add(descriptor.number_kind(), &other.value.load());
        Ok(())
    }

    /// `self = self - operand`
    pub(crate) fn subtract(&self, operand: &SumAggregator, descriptor: &Descriptor) -> Result<()> {
        let kind = descriptor.number_kind();
        let difference = self.value.load().sub(kind, &operand.value.load());
        self.value.store(&difference);
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> SumAggregator {
        SumAggregator {
            value: self.value.load().to_atomic(),
        }
    }
}

impl Sum for SumAggregator {
    fn sum(&self) -> Result<Number> {
        Ok(self.value.load())
    }
}

impl Aggregation for SumAggregator {
    fn kind(&self) -> &AggregationKind {
        &AggregationKind::Sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::sdk_api::{InstrumentKind, NumberKind};

    fn counter(kind: NumberKind) -> Descriptor {
        Descriptor::new("sum".into(), InstrumentKind::Counter, kind, None, None)
    }

    #[test]
    fn move_resets_source() {
        let descriptor = counter(NumberKind::U64);
        let current = sum();
        let checkpoint = sum();

        current.update(&5u64.into(), &descriptor).unwrap();
        current.update(&7u64.into(), &descriptor).unwrap();
        current.synchronized_move(&checkpoint, &descriptor).unwrap();

        assert_eq!(checkpoint.sum().unwrap(), Number::from(12u64));
        assert_eq!(current.sum().unwrap(), Number::from(0u64));
    }

    #[test]
    fn subtract_yields_difference() {
        let descriptor = counter(NumberKind::I64);
        let current = sum();
        let previous = sum();
        current.update(&10i64.into(), &descriptor).unwrap();
        previous.update(&4i64.into(), &descriptor).unwrap();

        current.subtract(&previous, &descriptor).unwrap();
        assert_eq!(current.sum().unwrap(), Number::from(6i64));
    }

    #[test]
    fn merge_at_every_split_point_matches_single_stream() {
        let descriptor = counter(NumberKind::I64);
        let values = [4i64, -1, 9, 0, 3, -7];
        let combined = sum();
        for value in values {
            combined.update(&value.into(), &descriptor).unwrap();
        }

        for k in 0..=values.len() {
            let (left, right) = (sum(), sum());
            for value in &values[..k] {
                left.update(&(*value).into(), &descriptor).unwrap();
            }
            for value in &values[k..] {
                right.update(&(*value).into(), &descriptor).unwrap();
            }
            left.merge(&right, &descriptor).unwrap();
            assert_eq!(left.sum().unwrap(), combined.sum().unwrap(), "split at {}", k);
        }
    }

    #[test]
    fn integer_sums_saturate() {
        let descriptor = counter(NumberKind::U64);
        let agg = sum();
        agg.update(&(u64::MAX - 1).into(), &descriptor).unwrap();
        agg.update(&5u64.into(), &descriptor).unwrap();
        assert_eq!(agg.sum().unwrap(), Number::from(u64::MAX));

        let other = sum();
        other.update(&1u64.into(), &descriptor).unwrap();
        agg.merge(&other, &descriptor).unwrap();
        assert_eq!(agg.sum().unwrap(), Number::from(u64::MAX));
    }
}
