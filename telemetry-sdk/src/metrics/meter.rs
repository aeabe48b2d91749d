use crate::metrics::sdk_api::{Descriptor, InstrumentKind, Number, NumberKind};
use crate::metrics::{Accumulator, ObserverResult};
use core::fmt;
use std::borrow::Cow;
use std::marker;
use telemetry::global::handle_error;
use telemetry::labels::LabelSet;
use telemetry::metrics::{MetricsError, Result, Unit};
use telemetry::KeyValue;

// instrument validation error strings
const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 64 characters";
const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', and '-'";
const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";
const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

/// Provides access to named [Meter] instances, for instrumenting an application
/// or crate.
pub trait MeterProvider {
    /// Returns a new [Meter] with the provided name and default configuration.
    fn meter(&self, name: &'static str) -> Meter {
        self.versioned_meter(name, None)
    }

    /// Returns a new [Meter] for the named and versioned instrumentation
    /// library.
    fn versioned_meter(&self, name: &'static str, version: Option<&'static str>) -> Meter;
}

/// A value type instruments can record: `u64`, `i64` or `f64`.
pub trait MeasurementValue: Copy + Into<Number> + Send + Sync + 'static {
    /// The number kind measurements of this type are recorded with.
    const NUMBER_KIND: NumberKind;
}

impl MeasurementValue for u64 {
    const NUMBER_KIND: NumberKind = NumberKind::U64;
}

impl MeasurementValue for i64 {
    const NUMBER_KIND: NumberKind = NumberKind::I64;
}

impl MeasurementValue for f64 {
    const NUMBER_KIND: NumberKind = NumberKind::F64;
}

/// Creates instruments that record into one accumulator.
///
/// A meter obtained from [`Meter::noop`], or from the global provider before
/// one was installed, creates instruments that discard everything.
#[derive(Clone)]
pub struct Meter {
    name: &'static str,
    version: Option<&'static str>,
    accumulator: Option<Accumulator>,
}

impl Meter {
    pub(crate) fn new(
        name: &'static str,
        version: Option<&'static str>,
        accumulator: Accumulator,
    ) -> Self {
        Meter {
            name,
            version,
            accumulator: Some(accumulator),
        }
    }

    /// A meter whose instruments discard every measurement.
    pub fn noop() -> Self {
        Meter {
            name: "noop",
            version: None,
            accumulator: None,
        }
    }

    /// The instrumentation library name this meter was created for.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The instrumentation library version this meter was created for.
    pub fn version(&self) -> Option<&str> {
        self.version
    }

    /// creates an instrument builder for recording increasing values.
    pub fn u64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<u64>> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Counter, NumberKind::U64)
    }

    /// creates an instrument builder for recording increasing values.
    pub fn f64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<f64>> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Counter, NumberKind::F64)
    }

    /// creates an instrument builder for recording changes of a value.
    pub fn i64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i64>> {
        InstrumentBuilder::new(
            self,
            name.into(),
            InstrumentKind::UpDownCounter,
            NumberKind::I64,
        )
    }

    /// creates an instrument builder for recording changes of a value.
    pub fn f64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<f64>> {
        InstrumentBuilder::new(
            self,
            name.into(),
            InstrumentKind::UpDownCounter,
            NumberKind::F64,
        )
    }

    /// creates an instrument builder for recording a distribution of values.
    pub fn u64_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Histogram<u64>> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Histogram, NumberKind::U64)
    }

    /// creates an instrument builder for recording a distribution of values.
    pub fn i64_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Histogram<i64>> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Histogram, NumberKind::I64)
    }

    /// creates an instrument builder for recording a distribution of values.
    pub fn f64_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Histogram<f64>> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Histogram, NumberKind::F64)
    }

    /// creates an instrument builder for recording increasing values via callback.
    pub fn u64_observable_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableCounter<u64>, u64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::CounterObserver)
    }

    /// creates an instrument builder for recording increasing values via callback.
    pub fn f64_observable_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableCounter<f64>, f64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::CounterObserver)
    }

    /// creates an instrument builder for recording changing values via callback.
    pub fn i64_observable_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableUpDownCounter<i64>, i64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::UpDownCounterObserver)
    }

    /// creates an instrument builder for recording changing values via callback.
    pub fn f64_observable_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableUpDownCounter<f64>, f64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::UpDownCounterObserver)
    }

    /// creates an instrument builder for recording the current value via callback.
    pub fn u64_observable_gauge(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableGauge<u64>, u64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::GaugeObserver)
    }

    /// creates an instrument builder for recording the current value via callback.
    pub fn i64_observable_gauge(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableGauge<i64>, i64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::GaugeObserver)
    }

    /// creates an instrument builder for recording the current value via callback.
    pub fn f64_observable_gauge(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> ObservableInstrumentBuilder<'_, ObservableGauge<f64>, f64> {
        ObservableInstrumentBuilder::new(self, name.into(), InstrumentKind::GaugeObserver)
    }

    /// Registers one callback observing several asynchronous instruments.
    ///
    /// Use the instruments' [`ObservableCounter::descriptor`] (and friends)
    /// to report through the [`ObserverResult`]. On a no-op meter the
    /// callback is dropped.
    pub fn register_callback<F>(&self, descriptors: Vec<Descriptor>, callback: F) -> Result<()>
    where
        F: Fn(&ObserverResult<'_>) -> Result<()> + Send + Sync + 'static,
    {
        match &self.accumulator {
            Some(accumulator) => accumulator.register_observer(descriptors, callback),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("noop", &self.accumulator.is_none())
            .finish()
    }
}

fn validate_instrument_config(name: &str, unit: Option<&Unit>) -> Result<()> {
    let invalid = |msg: &str| Err(MetricsError::Config(format!("{}: {}", msg, name)));

    if name.is_empty() {
        return invalid(INSTRUMENT_NAME_EMPTY);
    }
    if name.len() > 63 {
        return invalid(INSTRUMENT_NAME_LENGTH);
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return invalid(INSTRUMENT_NAME_FIRST_ALPHABETIC);
    }
    if name.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '.' && c != '-') {
        return invalid(INSTRUMENT_NAME_INVALID_CHAR);
    }

    if let Some(unit) = unit {
        if unit.as_str().len() > 63 {
            return invalid(INSTRUMENT_UNIT_LENGTH);
        }
        if unit.as_str().contains(|c: char| !c.is_ascii()) {
            return invalid(INSTRUMENT_UNIT_INVALID_CHAR);
        }
    }
    Ok(())
}

/// The parts shared by every synchronous instrument.
#[derive(Clone)]
struct SyncInstrument {
    descriptor: Descriptor,
    accumulator: Option<Accumulator>,
}

impl SyncInstrument {
    fn record<T: MeasurementValue>(&self, value: T, attributes: &[KeyValue]) {
        if let Some(accumulator) = &self.accumulator {
            accumulator.record(
                &self.descriptor,
                value.into(),
                &T::NUMBER_KIND,
                &LabelSet::from(attributes),
            )
        }
    }
}

/// Configuration for building a synchronous instrument.
pub struct InstrumentBuilder<'a, T> {
    meter: &'a Meter,
    name: Cow<'static, str>,
    description: Option<String>,
    unit: Option<Unit>,
    instrument_kind: InstrumentKind,
    number_kind: NumberKind,
    _marker: marker::PhantomData<T>,
}

impl<'a, T> InstrumentBuilder<'a, T>
where
    T: From<SyncInstrumentParts>,
{
    fn new(
        meter: &'a Meter,
        name: Cow<'static, str>,
        instrument_kind: InstrumentKind,
        number_kind: NumberKind,
    ) -> Self {
        InstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            instrument_kind,
            number_kind,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive(`kb` is not the same as `kB`).
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Validate the instrument configuration and creates a new instrument.
    pub fn try_init(self) -> Result<T> {
        validate_instrument_config(&self.name, self.unit.as_ref())?;
        let descriptor = Descriptor::new(
            self.name.into_owned(),
            self.instrument_kind,
            self.number_kind,
            self.description,
            self.unit,
        );

        Ok(T::from(SyncInstrumentParts(SyncInstrument {
            descriptor,
            accumulator: self.meter.accumulator.clone(),
        })))
    }

    /// Creates a new instrument.
    ///
    /// An invalid configuration is reported to the global error handler and
    /// yields an instrument that discards its measurements.
    pub fn init(self) -> T {
        let descriptor = Descriptor::new(
            self.name.to_string(),
            self.instrument_kind,
            self.number_kind,
            self.description.clone(),
            self.unit.clone(),
        );
        self.try_init().unwrap_or_else(|err| {
            handle_error(err);
            T::from(SyncInstrumentParts(SyncInstrument {
                descriptor,
                accumulator: None,
            }))
        })
    }
}

impl<T> fmt::Debug for InstrumentBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<T>())
            .finish()
    }
}

/// Opaque constructor input for synchronous instruments.
#[doc(hidden)]
pub struct SyncInstrumentParts(SyncInstrument);

impl fmt::Debug for SyncInstrumentParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SyncInstrumentParts")
            .field(&self.0.descriptor)
            .finish()
    }
}

macro_rules! sync_instrument {
    ($(#[$meta:meta])* $name:ident, $method:ident, $verb:literal) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name<T> {
            inner: SyncInstrument,
            _marker: marker::PhantomData<T>,
        }

        impl<T: MeasurementValue> $name<T> {
            #[doc = concat!("Records ", $verb, " for the series identified by `attributes`.")]
            pub fn $method(&self, value: T, attributes: &[KeyValue]) {
                self.inner.record(value, attributes)
            }

            /// The descriptor of this instrument.
            pub fn descriptor(&self) -> &Descriptor {
                &self.inner.descriptor
            }
        }

        impl<T> From<SyncInstrumentParts> for $name<T> {
            fn from(parts: SyncInstrumentParts) -> Self {
                $name {
                    inner: parts.0,
                    _marker: marker::PhantomData,
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_fmt(format_args!(
                    "{}<{}>({})",
                    stringify!($name),
                    std::any::type_name::<T>(),
                    self.inner.descriptor.name()
                ))
            }
        }
    };
}

sync_instrument!(
    /// An instrument that records increasing values.
    Counter,
    add,
    "an increment"
);
sync_instrument!(
    /// An instrument that records increasing or decreasing values.
    UpDownCounter,
    add,
    "a change"
);
sync_instrument!(
    /// An instrument that records a distribution of values.
    Histogram,
    record,
    "a value"
);

type ObservableCallback<T> = Box<dyn Fn(&Observation<'_, T>) -> Result<()> + Send + Sync>;

/// Configuration for building an asynchronous instrument.
pub struct ObservableInstrumentBuilder<'a, I, T> {
    meter: &'a Meter,
    name: Cow<'static, str>,
    description: Option<String>,
    unit: Option<Unit>,
    instrument_kind: InstrumentKind,
    callbacks: Vec<ObservableCallback<T>>,
    _marker: marker::PhantomData<I>,
}

impl<'a, I, T> ObservableInstrumentBuilder<'a, I, T>
where
    I: From<Descriptor>,
    T: MeasurementValue,
{
    fn new(meter: &'a Meter, name: Cow<'static, str>, instrument_kind: InstrumentKind) -> Self {
        ObservableInstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            instrument_kind,
            callbacks: Vec::new(),
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set a callback that gets invoked once per collection.
    ///
    /// Callbacks report through the [`Observation`] they are given; an error
    /// or a panic is reported from the collection without stopping it.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Observation<'_, T>) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Validate the instrument configuration, register its callbacks and
    /// create the instrument.
    pub fn try_init(self) -> Result<I> {
        validate_instrument_config(&self.name, self.unit.as_ref())?;
        let descriptor = Descriptor::new(
            self.name.into_owned(),
            self.instrument_kind,
            T::NUMBER_KIND,
            self.description,
            self.unit,
        );

        for callback in self.callbacks {
            let observed = descriptor.clone();
            self.meter
                .register_callback(vec![descriptor.clone()], move |result| {
                    callback(&Observation {
                        result,
                        descriptor: &observed,
                        _marker: marker::PhantomData,
                    })
                })?;
        }

        Ok(I::from(descriptor))
    }

    /// Creates a new instrument.
    ///
    /// An invalid configuration is reported to the global error handler; the
    /// returned instrument then has no callbacks.
    pub fn init(self) -> I {
        let descriptor = Descriptor::new(
            self.name.to_string(),
            self.instrument_kind,
            T::NUMBER_KIND,
            self.description.clone(),
            self.unit.clone(),
        );
        self.try_init().unwrap_or_else(|err| {
            handle_error(err);
            I::from(descriptor)
        })
    }
}

impl<I, T> fmt::Debug for ObservableInstrumentBuilder<'_, I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableInstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<I>())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// The handle an instrument callback reports the instrument's current values
/// through.
pub struct Observation<'a, T> {
    result: &'a ObserverResult<'a>,
    descriptor: &'a Descriptor,
    _marker: marker::PhantomData<T>,
}

impl<T: MeasurementValue> Observation<'_, T> {
    /// Reports the current value of the series identified by `attributes`.
    ///
    /// Observing the same series twice in one collection keeps the last
    /// value.
    pub fn observe(&self, value: T, attributes: &[KeyValue]) {
        self.result
            .observe(self.descriptor, value.into(), &LabelSet::from(attributes))
    }
}

impl<T> fmt::Debug for Observation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

macro_rules! async_instrument {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name<T> {
            descriptor: Descriptor,
            _marker: marker::PhantomData<T>,
        }

        impl<T> $name<T> {
            /// The descriptor of this instrument, for use with
            /// [`Meter::register_callback`].
            pub fn descriptor(&self) -> &Descriptor {
                &self.descriptor
            }
        }

        impl<T> From<Descriptor> for $name<T> {
            fn from(descriptor: Descriptor) -> Self {
                $name {
                    descriptor,
                    _marker: marker::PhantomData,
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_fmt(format_args!(
                    "{}<{}>({})",
                    stringify!($name),
                    std::any::type_name::<T>(),
                    self.descriptor.name()
                ))
            }
        }
    };
}

async_instrument!(
    /// An asynchronous instrument reporting a monotonically increasing sum.
    ObservableCounter
);
async_instrument!(
    /// An asynchronous instrument reporting a sum that may go up and down.
    ObservableUpDownCounter
);
async_instrument!(
    /// An asynchronous instrument reporting the current value.
    ObservableGauge
);
