use crate::metrics::sdk_api::{InstrumentKind, NumberKind};
use fnv::FnvHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use telemetry::metrics::Unit;

/// Descriptor contains all the settings that describe an instrument, including
/// its name, metric kind, number kind, and the configurable options.
///
/// A descriptor is immutable. Clones share the same allocation, so every
/// series of an instrument refers to one descriptor.
#[derive(Clone, Debug)]
pub struct Descriptor(Arc<DescriptorInner>);

#[derive(Debug, PartialEq)]
struct DescriptorInner {
    name: String,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    description: Option<String>,
    unit: Option<Unit>,
    attribute_hash: u64,
}

impl Descriptor {
    /// Create a new descriptor
    pub fn new(
        name: String,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
        description: Option<String>,
        unit: Option<Unit>,
    ) -> Self {
        let mut hasher = FnvHasher::default();
        name.hash(&mut hasher);
        instrument_kind.hash(&mut hasher);
        number_kind.hash(&mut hasher);
        if let Some(description) = &description {
            description.hash(&mut hasher);
        }
        if let Some(unit) = &unit {
            unit.hash(&mut hasher);
        }

        Descriptor(Arc::new(DescriptorInner {
            name,
            instrument_kind,
            number_kind,
            description,
            unit,
            attribute_hash: hasher.finish(),
        }))
    }

    /// The metric instrument's name.
    pub fn name(&self) -> &str {
        self.0.name.as_str()
    }

    /// The specific kind of instrument.
    pub fn instrument_kind(&self) -> &InstrumentKind {
        &self.0.instrument_kind
    }

    /// NumberKind returns whether this instrument is declared over int64, float64, or uint64
    /// values.
    pub fn number_kind(&self) -> &NumberKind {
        &self.0.number_kind
    }

    /// A human-readable description of the metric instrument.
    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    /// Unit describes the units of the metric instrument.
    pub fn unit(&self) -> Option<&str> {
        self.0.unit.as_ref().map(|unit| unit.as_ref())
    }

    /// The pre-computed hash of the descriptor data
    pub fn attribute_hash(&self) -> u64 {
        self.0.attribute_hash
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.attribute_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, kind: InstrumentKind) -> Descriptor {
        Descriptor::new(
            name.to_string(),
            kind,
            NumberKind::U64,
            Some("request count".to_string()),
            Some(Unit::new("1")),
        )
    }

    #[test]
    fn equal_settings_are_equal_descriptors() {
        let a = descriptor("requests", InstrumentKind::Counter);
        let b = descriptor("requests", InstrumentKind::Counter);

        assert_eq!(a, b);
        assert_eq!(a.attribute_hash(), b.attribute_hash());
        assert_eq!(a.unit(), Some("1"));
        assert_eq!(a.description(), Some("request count"));
    }

    #[test]
    fn kind_is_part_of_identity() {
        let counter = descriptor("requests", InstrumentKind::Counter);
        let up_down = descriptor("requests", InstrumentKind::UpDownCounter);

        assert_ne!(counter, up_down);
        assert_ne!(counter.attribute_hash(), up_down.attribute_hash());
    }
}
