//! Instrument descriptors and the numbers they record.
mod descriptor;
mod instrument_kind;
mod number;

pub use descriptor::Descriptor;
pub use instrument_kind::InstrumentKind;
pub use number::{AtomicNumber, Number, NumberKind};
