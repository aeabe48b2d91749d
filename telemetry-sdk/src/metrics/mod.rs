//! # Metrics SDK
//!
//! The [`Accumulator`] is the in-process registry of metric series. Every
//! measurement is folded into the aggregator of its (descriptor, label set)
//! series; a collection moves each updated series into a checkpoint and hands
//! it to a [`LockedProcessor`].
//!
//! Most applications use a [`controllers::BasicController`], which owns an
//! accumulator and a processor and exposes [`Meter`]s.
use crate::export::metrics::{self as export, LockedProcessor, Processor};
use crate::metrics::aggregators::Aggregator;
use crate::resource::Resource;
use dashmap::DashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use telemetry::global::handle_error;
use telemetry::labels::LabelSet;
use telemetry::metrics::{MetricsError, Result};
use telemetry::{otel_debug, otel_warn, Context};

pub mod aggregators;
pub mod controllers;
pub mod global;
mod meter;
pub mod processors;
pub mod sdk_api;
pub mod selectors;

pub use controllers::BasicController;
pub use meter::{
    Counter, Histogram, InstrumentBuilder, MeasurementValue, Meter, MeterProvider,
    ObservableCounter, ObservableGauge, ObservableInstrumentBuilder, ObservableUpDownCounter,
    Observation, UpDownCounter,
};
#[doc(hidden)]
pub use meter::SyncInstrumentParts;

use crate::metrics::sdk_api::{Descriptor, Number, NumberKind};

/// Creates a new accumulator builder
pub fn accumulator(processor: Arc<dyn Processor + Send + Sync>) -> AccumulatorBuilder {
    AccumulatorBuilder {
        processor,
        resource: None,
        idle_eviction_cycles: 1,
    }
}

/// Configuration for an accumulator
#[derive(Debug)]
pub struct AccumulatorBuilder {
    processor: Arc<dyn Processor + Send + Sync>,
    resource: Option<Resource>,
    idle_eviction_cycles: u64,
}

impl AccumulatorBuilder {
    /// The resource that will be applied to all records in this accumulator.
    pub fn with_resource(self, resource: Resource) -> Self {
        AccumulatorBuilder {
            resource: Some(resource),
            ..self
        }
    }

    /// The number of consecutive collections without updates after which an
    /// unreferenced series is removed from the accumulator. Defaults to 1.
    ///
    /// An evicted series starts again from zero when it is next recorded.
    pub fn with_idle_eviction_cycles(self, cycles: u64) -> Self {
        AccumulatorBuilder {
            idle_eviction_cycles: cycles.max(1),
            ..self
        }
    }

    /// Create a new accumulator from this configuration
    pub fn build(self) -> Accumulator {
        Accumulator(Arc::new(AccumulatorCore {
            current: DashMap::new(),
            observers: Mutex::new(Vec::new()),
            current_epoch: AtomicU64::new(0),
            collect_lock: Mutex::new(()),
            dropped_measurements: AtomicU64::new(0),
            processor: self.processor,
            resource: self.resource.unwrap_or_default(),
            idle_eviction_cycles: self.idle_eviction_cycles,
        }))
    }
}

/// Accumulator is the registry of metric series bound to a single `Processor`.
///
/// Measurements may be recorded from any number of threads. Collections are
/// serialized with each other but not with measurements. `collect` should be
/// arranged according to the processor model: push-based controllers call it
/// on a timer, pull-based ones when a pull request arrives.
#[derive(Debug, Clone)]
pub struct Accumulator(Arc<AccumulatorCore>);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MapKey {
    descriptor: Descriptor,
    labels: LabelSet,
}

type ObserverCallback = dyn Fn(&ObserverResult<'_>) -> Result<()> + Send + Sync;

struct Observer {
    descriptors: Vec<Descriptor>,
    callback: Box<ObserverCallback>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

#[derive(Debug)]
struct AccumulatorCore {
    /// A concurrent map of current series state.
    current: DashMap<MapKey, Arc<Record>>,
    /// Observer callbacks in registration order.
    observers: Mutex<Vec<Arc<Observer>>>,
    /// The current epoch number. It is incremented in `collect`.
    current_epoch: AtomicU64,
    /// Serializes collections.
    collect_lock: Mutex<()>,
    dropped_measurements: AtomicU64,
    /// The configured processor.
    processor: Arc<dyn Processor + Send + Sync>,
    /// The resource applied to all records in this Accumulator.
    resource: Resource,
    idle_eviction_cycles: u64,
}

/// Record maintains the state of one series. Due to the use of a concurrent
/// map, a writer may briefly hold a record that has just been evicted; such a
/// record is only evicted when no writer holds it, so no update is lost.
#[derive(Debug)]
struct Record {
    /// Incremented on every successful update.
    update_count: AtomicU64,
    /// Set to `update_count` on collection, supports checking for no updates
    /// during a round.
    collected_count: AtomicU64,
    /// `epoch + 1` of the last collection cycle this series was observed in,
    /// zero if it never was.
    observed_epoch: AtomicU64,
    /// Consecutive collections without updates. Only the collector touches it.
    idle_sweeps: AtomicU64,
    descriptor: Descriptor,
    labels: LabelSet,
    current: Aggregator,
    checkpoint: Aggregator,
}

impl Accumulator {
    /// Records a measurement for the series identified by `descriptor` and
    /// `labels`.
    ///
    /// Measurements whose number kind differs from the instrument's, NaN
    /// values, and negative values for monotonic instruments are dropped,
    /// counted in [`Accumulator::dropped_measurements`] and reported to the
    /// global error handler. This never panics.
    pub fn record(
        &self,
        descriptor: &Descriptor,
        number: Number,
        number_kind: &NumberKind,
        labels: &LabelSet,
    ) {
        if descriptor.number_kind() != number_kind {
            self.0.drop_measurement(MetricsError::NumberKindMismatch {
                name: descriptor.name().to_string(),
                expected: descriptor.number_kind().name(),
                actual: number_kind.name(),
            });
            return;
        }

        self.0.update(descriptor, number, labels, false)
    }

    /// Registers a callback that reports observations for the given
    /// asynchronous instruments once per collection.
    ///
    /// The callback may report any number of observations through the
    /// [`ObserverResult`]; repeated observations of the same series in one
    /// collection replace each other. An error or a panic in the callback is
    /// reported from [`Accumulator::collect`] without affecting other
    /// callbacks.
    pub fn register_observer<F>(&self, descriptors: Vec<Descriptor>, callback: F) -> Result<()>
    where
        F: Fn(&ObserverResult<'_>) -> Result<()> + Send + Sync + 'static,
    {
        if let Some(sync) = descriptors
            .iter()
            .find(|descriptor| descriptor.instrument_kind().synchronous())
        {
            return Err(MetricsError::Config(format!(
                "observer callbacks require asynchronous instruments, {} is a {}",
                sync.name(),
                sync.instrument_kind()
            )));
        }

        self.0.observers.lock()?.push(Arc::new(Observer {
            descriptors,
            callback: Box::new(callback),
        }));
        Ok(())
    }

    /// Runs every observer callback, then moves each series updated since the
    /// last collection into its checkpoint and passes it to `locked_processor`.
    ///
    /// Returns the number of series passed to the processor.
    ///
    /// # Errors
    ///
    /// - [`MetricsError::Cancelled`] if `cx` is cancelled before the series
    ///   were swept. Nothing was passed to the processor.
    /// - [`MetricsError::PartialCollection`] if observer callbacks failed. The
    ///   sweep still completed and its records are valid.
    pub fn collect(&self, cx: &Context, locked_processor: &mut dyn LockedProcessor) -> Result<usize> {
        self.0.collect(cx, locked_processor)
    }

    /// The number of measurements dropped since this accumulator was built.
    pub fn dropped_measurements(&self) -> u64 {
        self.0.dropped_measurements.load(Ordering::Relaxed)
    }

    /// The resource applied to all records in this accumulator.
    pub fn resource(&self) -> &Resource {
        &self.0.resource
    }
}

impl AccumulatorCore {
    fn drop_measurement(&self, err: MetricsError) {
        self.dropped_measurements.fetch_add(1, Ordering::Relaxed);
        otel_debug!(
            name: "Accumulator.MeasurementDropped",
            reason = format!("{}", err)
        );
        handle_error(err);
    }

    fn update(&self, descriptor: &Descriptor, number: Number, labels: &LabelSet, observed: bool) {
        if let Err(err) = aggregators::range_test(&number, descriptor) {
            self.drop_measurement(err);
            return;
        }

        // `None` means the instrument was disabled by the aggregator selector.
        let Some(record) = self.acquire(descriptor, labels) else {
            return;
        };

        if observed {
            let epoch = self.current_epoch.load(Ordering::Acquire) + 1;
            if record.observed_epoch.swap(epoch, Ordering::AcqRel) == epoch {
                // Last observation in a cycle wins, drop the earlier one.
                if let Some(scratch) = self.processor.aggregator_selector().aggregator_for(descriptor) {
                    if let Err(err) = record.current.synchronized_move(&scratch, descriptor) {
                        handle_error(err);
                        return;
                    }
                }
            }
        }

        if let Err(err) = record.current.update(&number, descriptor) {
            handle_error(err);
            return;
        }

        // Record was modified, inform collect() that things need to be
        // collected while the record is still mapped.
        record.update_count.fetch_add(1, Ordering::AcqRel);
    }

    fn acquire(&self, descriptor: &Descriptor, labels: &LabelSet) -> Option<Arc<Record>> {
        let key = MapKey {
            descriptor: descriptor.clone(),
            labels: labels.clone(),
        };
        if let Some(existing) = self.current.get(&key) {
            return Some(existing.value().clone());
        }

        let selector = self.processor.aggregator_selector();
        let current = selector.aggregator_for(descriptor)?;
        let checkpoint = selector.aggregator_for(descriptor)?;

        let record = self
            .current
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Record {
                    update_count: AtomicU64::new(0),
                    collected_count: AtomicU64::new(0),
                    observed_epoch: AtomicU64::new(0),
                    idle_sweeps: AtomicU64::new(0),
                    descriptor: descriptor.clone(),
                    labels: labels.clone(),
                    current,
                    checkpoint,
                })
            })
            .value()
            .clone();

        Some(record)
    }

    fn collect(&self, cx: &Context, locked_processor: &mut dyn LockedProcessor) -> Result<usize> {
        let _collecting = self.collect_lock.lock()?;

        let errors = self.run_observers(cx)?;
        if cx.is_cancelled() {
            return Err(MetricsError::Cancelled);
        }

        let checkpointed = self.sweep(locked_processor);
        self.current_epoch.fetch_add(1, Ordering::AcqRel);

        if errors.is_empty() {
            Ok(checkpointed)
        } else {
            Err(MetricsError::PartialCollection {
                checkpointed,
                errors,
            })
        }
    }

    fn run_observers(&self, cx: &Context) -> Result<Vec<MetricsError>> {
        // Callbacks may register further observers, don't hold the lock.
        let observers = self.observers.lock()?.clone();
        let mut errors = Vec::new();

        for observer in observers {
            if cx.is_cancelled() {
                return Err(MetricsError::Cancelled);
            }

            let result = ObserverResult {
                core: self,
                descriptors: &observer.descriptors,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (observer.callback)(&result)));
            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => MetricsError::ObserverCallback(err.to_string().into()),
                Err(payload) => MetricsError::ObserverCallback(panic_message(payload.as_ref())),
            };
            otel_warn!(
                name: "Accumulator.ObserverFailed",
                error = format!("{}", err)
            );
            errors.push(err);
        }

        Ok(errors)
    }

    fn sweep(&self, locked_processor: &mut dyn LockedProcessor) -> usize {
        // Only shard read locks are taken here, and only while cloning the
        // updated records. The processor runs with no map lock held.
        let mut updated = Vec::new();
        for entry in self.current.iter() {
            let record = entry.value();
            let mods = record.update_count.load(Ordering::Acquire);
            let coll = record.collected_count.load(Ordering::Acquire);

            if mods != coll {
                updated.push((Arc::clone(record), mods));
            } else {
                record.idle_sweeps.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut checkpointed = 0;
        for (record, mods) in updated {
            checkpointed += self.checkpoint_record(&record, locked_processor);
            record.collected_count.store(mods, Ordering::Release);
            record.idle_sweeps.store(0, Ordering::Relaxed);
        }

        self.evict_idle();
        checkpointed
    }

    fn evict_idle(&self) {
        self.current.retain(|_key, record| {
            let idle = record.idle_sweeps.load(Ordering::Relaxed) >= self.idle_eviction_cycles;
            let unchanged = record.update_count.load(Ordering::Acquire)
                == record.collected_count.load(Ordering::Acquire);
            // The shard lock is held here, so a strong count of one means no
            // writer holds this record and none can acquire it.
            if idle && unchanged && Arc::strong_count(record) == 1 {
                otel_debug!(
                    name: "Accumulator.SeriesEvicted",
                    instrument = record.descriptor.name().to_string()
                );
                return false;
            }

            true
        });
    }

    fn checkpoint_record(&self, record: &Record, locked_processor: &mut dyn LockedProcessor) -> usize {
        if let Err(err) = record
            .current
            .synchronized_move(&record.checkpoint, &record.descriptor)
        {
            handle_error(err);
            return 0;
        }

        let accumulation = export::accumulation(
            &record.descriptor,
            &record.labels,
            &self.resource,
            &record.checkpoint,
        );
        if let Err(err) = locked_processor.process(accumulation) {
            handle_error(err);
        }

        1
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> std::borrow::Cow<'static, str> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).into()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone().into()
    } else {
        "observer callback panicked".into()
    }
}

/// The handle an observer callback reports its observations through.
pub struct ObserverResult<'a> {
    core: &'a AccumulatorCore,
    descriptors: &'a [Descriptor],
}

impl ObserverResult<'_> {
    /// Reports the current value of the series identified by `descriptor` and
    /// `labels`.
    ///
    /// The number is interpreted with the descriptor's number kind. The
    /// descriptor must be one the callback was registered for, other
    /// observations are dropped and reported to the global error handler.
    pub fn observe(&self, descriptor: &Descriptor, number: Number, labels: &LabelSet) {
        if !self.descriptors.contains(descriptor) {
            self.core
                .drop_measurement(MetricsError::UnregisteredInstrument(
                    descriptor.name().to_string(),
                ));
            return;
        }

        self.core.update(descriptor, number, labels, true)
    }
}

impl fmt::Debug for ObserverResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverResult")
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::metrics::{Accumulation, AggregatorSelector};
    use crate::metrics::sdk_api::InstrumentKind;
    use crate::metrics::selectors::simple::Selector;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};
    use telemetry::KeyValue;

    #[derive(Debug)]
    struct TestProcessor(Selector);

    impl Processor for TestProcessor {
        fn aggregator_selector(&self) -> &dyn AggregatorSelector {
            &self.0
        }
    }

    /// Collects `(name, labels, sum)` for every accumulation.
    #[derive(Debug, Default)]
    struct Sums(Vec<(String, String, Number)>);

    impl LockedProcessor for Sums {
        fn process(&mut self, accumulation: Accumulation<'_>) -> Result<()> {
            let sum = accumulation
                .aggregator()
                .as_sum()
                .map(|agg| agg.sum())
                .transpose()?
                .unwrap_or_default();
            self.0.push((
                accumulation.descriptor().name().to_string(),
                accumulation.labels().encoded().to_string(),
                sum,
            ));
            Ok(())
        }
    }

    fn new_accumulator() -> Accumulator {
        accumulator(Arc::new(TestProcessor(Selector::Inexpensive))).build()
    }

    fn counter(name: &str) -> Descriptor {
        Descriptor::new(name.into(), InstrumentKind::Counter, NumberKind::U64, None, None)
    }

    fn observer(name: &str) -> Descriptor {
        Descriptor::new(
            name.into(),
            InstrumentKind::UpDownCounterObserver,
            NumberKind::I64,
            None,
            None,
        )
    }

    #[test]
    fn same_series_accumulates() {
        let acc = new_accumulator();
        let requests = counter("requests");
        let labels = LabelSet::from(&[KeyValue::new("route", "/a")]);
        acc.record(&requests, 5u64.into(), &NumberKind::U64, &labels);
        acc.record(&requests, 7u64.into(), &NumberKind::U64, &labels);

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 1);
        assert_eq!(sums.0[0].2, Number::from(12u64));
    }

    #[test]
    fn kind_mismatch_is_dropped_and_counted() {
        let acc = new_accumulator();
        let requests = counter("requests");
        acc.record(&requests, 1.5f64.into(), &NumberKind::F64, &LabelSet::default());
        acc.record(&requests, 1u64.into(), &NumberKind::U64, &LabelSet::default());

        assert_eq!(acc.dropped_measurements(), 1);
        let mut sums = Sums::default();
        acc.collect(&Context::new(), &mut sums).unwrap();
        assert_eq!(sums.0.len(), 1);
        assert_eq!(sums.0[0].2, Number::from(1u64));
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let acc = new_accumulator();
        let signed = Descriptor::new("c".into(), InstrumentKind::Counter, NumberKind::I64, None, None);
        acc.record(&signed, (-1i64).into(), &NumberKind::I64, &LabelSet::default());

        assert_eq!(acc.dropped_measurements(), 1);
        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 0);
    }

    #[test]
    fn concurrent_records_lose_nothing() {
        let acc = new_accumulator();
        let requests = counter("requests");
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let acc = acc.clone();
                let requests = requests.clone();
                thread::spawn(move || {
                    let labels = LabelSet::from(&[KeyValue::new("shard", i % 2)]);
                    for _ in 0..500 {
                        acc.record(&requests, 1u64.into(), &NumberKind::U64, &labels);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 2);
        let total: u64 = sums.0.iter().map(|(_, _, n)| n.to_u64(&NumberKind::U64)).sum();
        assert_eq!(total, 4000);
    }

    /// Signals once processing started, then holds the collection open.
    #[derive(Debug)]
    struct SlowProcessor {
        started: mpsc::Sender<()>,
        delay: Duration,
    }

    impl LockedProcessor for SlowProcessor {
        fn process(&mut self, _accumulation: Accumulation<'_>) -> Result<()> {
            let _ = self.started.send(());
            thread::sleep(self.delay);
            Ok(())
        }
    }

    #[test]
    fn records_proceed_while_processor_runs() {
        let acc = new_accumulator();
        let requests = counter("requests");
        let labels = LabelSet::from(&[KeyValue::new("route", "/a")]);
        acc.record(&requests, 1u64.into(), &NumberKind::U64, &labels);

        let (started, processing) = mpsc::channel();
        let collector = {
            let acc = acc.clone();
            thread::spawn(move || {
                let mut slow = SlowProcessor {
                    started,
                    delay: Duration::from_millis(500),
                };
                acc.collect(&Context::new(), &mut slow)
            })
        };

        processing.recv().unwrap();
        let begin = Instant::now();
        acc.record(&requests, 2u64.into(), &NumberKind::U64, &labels);
        acc.record(&counter("other"), 1u64.into(), &NumberKind::U64, &labels);
        let waited = begin.elapsed();
        assert_eq!(collector.join().unwrap().unwrap(), 1);
        assert!(waited < Duration::from_millis(100), "record waited {:?}", waited);

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 2);
        sums.0.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(sums.0[0].2, Number::from(1u64));
        assert_eq!(sums.0[1].2, Number::from(2u64));
    }

    /// Records into the accumulator it is processing for.
    #[derive(Debug)]
    struct RecordingProcessor {
        acc: Accumulator,
        descriptor: Descriptor,
    }

    impl LockedProcessor for RecordingProcessor {
        fn process(&mut self, _accumulation: Accumulation<'_>) -> Result<()> {
            self.acc
                .record(&self.descriptor, 1u64.into(), &NumberKind::U64, &LabelSet::default());
            Ok(())
        }
    }

    #[test]
    fn processor_may_record_during_collection() {
        let acc = new_accumulator();
        let requests = counter("requests");
        acc.record(&requests, 1u64.into(), &NumberKind::U64, &LabelSet::default());

        let mut recording = RecordingProcessor {
            acc: acc.clone(),
            descriptor: requests,
        };
        assert_eq!(acc.collect(&Context::new(), &mut recording).unwrap(), 1);

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 1);
        assert_eq!(sums.0[0].2, Number::from(1u64));
    }

    #[test]
    fn idle_series_are_evicted() {
        let acc = accumulator(Arc::new(TestProcessor(Selector::Inexpensive)))
            .with_idle_eviction_cycles(2)
            .build();
        let requests = counter("requests");
        acc.record(&requests, 1u64.into(), &NumberKind::U64, &LabelSet::default());

        let cx = Context::new();
        assert_eq!(acc.collect(&cx, &mut Sums::default()).unwrap(), 1);
        assert_eq!(acc.0.current.len(), 1);
        assert_eq!(acc.collect(&cx, &mut Sums::default()).unwrap(), 0);
        assert_eq!(acc.0.current.len(), 1);
        assert_eq!(acc.collect(&cx, &mut Sums::default()).unwrap(), 0);
        assert_eq!(acc.0.current.len(), 0);

        // A new measurement starts the series again from zero.
        acc.record(&requests, 4u64.into(), &NumberKind::U64, &LabelSet::default());
        let mut sums = Sums::default();
        acc.collect(&cx, &mut sums).unwrap();
        assert_eq!(sums.0[0].2, Number::from(4u64));
    }

    #[test]
    fn last_observation_in_a_cycle_wins() {
        let acc = new_accumulator();
        let queue = observer("queue.size");
        let registered = queue.clone();
        acc.register_observer(vec![queue.clone()], move |result| {
            result.observe(&registered, 3i64.into(), &LabelSet::default());
            result.observe(&registered, 9i64.into(), &LabelSet::default());
            Ok(())
        })
        .unwrap();

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 1);
        assert_eq!(sums.0[0].2, Number::from(9i64));

        // The next cycle observes afresh.
        let mut sums = Sums::default();
        acc.collect(&Context::new(), &mut sums).unwrap();
        assert_eq!(sums.0[0].2, Number::from(9i64));
    }

    #[test]
    fn failing_observers_do_not_stop_collection() {
        let acc = new_accumulator();
        let good = observer("good");
        let registered = good.clone();
        acc.register_observer(vec![observer("bad")], |_| {
            Err(MetricsError::Other("backend unavailable".into()))
        })
        .unwrap();
        acc.register_observer(vec![observer("panics")], |_| panic!("boom"))
            .unwrap();
        acc.register_observer(vec![good], move |result| {
            result.observe(&registered, 1i64.into(), &LabelSet::default());
            Ok(())
        })
        .unwrap();
        let requests = counter("requests");
        acc.record(&requests, 2u64.into(), &NumberKind::U64, &LabelSet::default());

        let mut sums = Sums::default();
        match acc.collect(&Context::new(), &mut sums) {
            Err(MetricsError::PartialCollection {
                checkpointed,
                errors,
            }) => {
                assert_eq!(checkpointed, 2);
                assert_eq!(errors.len(), 2);
                assert!(errors[1].to_string().contains("boom"));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(sums.0.len(), 2);
    }

    #[test]
    fn observations_need_registration() {
        let acc = new_accumulator();
        let registered = observer("registered");
        let other = observer("other");
        acc.register_observer(vec![registered], move |result| {
            result.observe(&other, 1i64.into(), &LabelSet::default());
            Ok(())
        })
        .unwrap();

        let mut sums = Sums::default();
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 0);
        assert_eq!(acc.dropped_measurements(), 1);
    }

    #[test]
    fn synchronous_instruments_cannot_be_observed() {
        let acc = new_accumulator();
        let result = acc.register_observer(vec![counter("requests")], |_| Ok(()));
        assert!(matches!(result, Err(MetricsError::Config(_))));
    }

    #[test]
    fn cancelled_collection_emits_nothing() {
        let acc = new_accumulator();
        let requests = counter("requests");
        acc.record(&requests, 3u64.into(), &NumberKind::U64, &LabelSet::default());

        let (cx, handle) = Context::new().with_cancellation();
        handle.cancel();
        let mut sums = Sums::default();
        assert!(matches!(
            acc.collect(&cx, &mut sums),
            Err(MetricsError::Cancelled)
        ));
        assert!(sums.0.is_empty());

        // Nothing was lost, the next collection picks the update up.
        assert_eq!(acc.collect(&Context::new(), &mut sums).unwrap(), 1);
        assert_eq!(sums.0[0].2, Number::from(3u64));
    }

    #[test]
    fn cancellation_between_observers() {
        let acc = new_accumulator();
        let (cx, handle) = Context::new().with_cancellation();
        let handle = Mutex::new(Some(handle));
        acc.register_observer(vec![observer("first")], move |_| {
            if let Some(handle) = handle.lock().unwrap().take() {
                handle.cancel();
            }
            Ok(())
        })
        .unwrap();
        acc.register_observer(vec![observer("second")], |_| panic!("must not run"))
            .unwrap();

        assert!(matches!(
            acc.collect(&cx, &mut Sums::default()),
            Err(MetricsError::Cancelled)
        ));
    }
}
