use crate::{
    export::metrics::{
        self,
        aggregation::{AggregationKind, Temporality, TemporalitySelector},
        Accumulation, AggregatorSelector, CheckpointSet, Checkpointer, CheckpointerFactory,
        LockedCheckpointer, LockedProcessor, Processor, Record,
    },
    metrics::{aggregators::Aggregator, sdk_api::Descriptor},
    Resource,
};
use core::fmt;
use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use telemetry::{
    labels::LabelSet,
    metrics::{MetricsError, Result},
    otel_debug,
};

/// Create a new basic processor
pub fn factory<A, T>(aggregator_selector: A, temporality_selector: T) -> BasicProcessorBuilder
where
    A: AggregatorSelector + Send + Sync + 'static,
    T: TemporalitySelector + Send + Sync + 'static,
{
    BasicProcessorBuilder {
        aggregator_selector: Arc::new(aggregator_selector),
        temporality_selector: Arc::new(temporality_selector),
    }
}

/// Creates [`BasicProcessor`]s sharing one aggregator and one temporality
/// selector.
pub struct BasicProcessorBuilder {
    aggregator_selector: Arc<dyn AggregatorSelector + Send + Sync>,
    temporality_selector: Arc<dyn TemporalitySelector + Send + Sync>,
}

impl fmt::Debug for BasicProcessorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicProcessorBuilder").finish()
    }
}

impl CheckpointerFactory for BasicProcessorBuilder {
    fn checkpointer(&self) -> Arc<dyn Checkpointer + Send + Sync> {
        Arc::new(BasicProcessor {
            aggregator_selector: Arc::clone(&self.aggregator_selector),
            temporality_selector: Arc::clone(&self.temporality_selector),
            state: Mutex::new(BasicProcessorState::default()),
        })
    }
}

/// Basic metric integration strategy
///
/// Keeps one entry per (descriptor, label set, resource). Accumulations that
/// map to the same entry within one collection are merged, so the processor
/// also combines the output of several accumulators, or of one accumulator
/// whose label sets were reduced.
pub struct BasicProcessor {
    aggregator_selector: Arc<dyn AggregatorSelector + Send + Sync>,
    temporality_selector: Arc<dyn TemporalitySelector + Send + Sync>,
    state: Mutex<BasicProcessorState>,
}

impl Processor for BasicProcessor {
    fn aggregator_selector(&self) -> &dyn AggregatorSelector {
        self.aggregator_selector.as_ref()
    }
}

impl Checkpointer for BasicProcessor {
    fn checkpoint(
        &self,
        f: &mut dyn FnMut(&mut dyn LockedCheckpointer) -> Result<()>,
    ) -> Result<()> {
        self.state.lock().map_err(From::from).and_then(|locked| {
            f(&mut BasicLockedProcessor {
                parent: self,
                state: locked,
            })
        })
    }
}

impl fmt::Debug for BasicProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicProcessor")
            .field("state", &self.state)
            .finish()
    }
}

/// A locked representation of the processor used where mutable references are necessary.
#[derive(Debug)]
struct BasicLockedProcessor<'a> {
    parent: &'a BasicProcessor,
    state: MutexGuard<'a, BasicProcessorState>,
}

impl LockedProcessor for BasicLockedProcessor<'_> {
    fn process(&mut self, accumulation: Accumulation<'_>) -> Result<()> {
        if self.state.started_collection != self.state.finished_collection.wrapping_add(1) {
            return Err(MetricsError::InconsistentState);
        }

        let desc = accumulation.descriptor();
        let key = StateKey::new(desc, accumulation.labels(), accumulation.resource());
        let agg = accumulation.aggregator();
        let finished_collection = self.state.finished_collection;

        if let Some(value) = self.state.values.get_mut(&key) {
            let same_collection = finished_collection == value.updated;
            value.updated = finished_collection;

            // The first accumulation of a key in this collection replaces the
            // previous interval's data. Any further one in the same collection
            // comes from another accumulator or from a reduced label set, and
            // is merged.
            if !same_collection {
                value.current = agg.snapshot()?;
                return Ok(());
            }

            return value.current.merge(agg, desc);
        }

        let kind = agg.kind();
        let temporality = self.parent.temporality_selector.temporality_for(desc, kind);
        let stateful = temporality.memory_required(desc.instrument_kind())
            && (!desc.instrument_kind().precomputed_sum() || kind == &AggregationKind::Sum);

        self.state.values.insert(
            key,
            StateValue {
                descriptor: desc.clone(),
                labels: accumulation.labels().clone(),
                resource: accumulation.resource().clone(),
                updated: finished_collection,
                fresh: true,
                stateful,
                temporality,
                current: agg.snapshot()?,
                cumulative: None,
                delta: None,
            },
        );

        Ok(())
    }
}

impl LockedCheckpointer for BasicLockedProcessor<'_> {
    fn processor(&mut self) -> &mut dyn LockedProcessor {
        self
    }

    fn start_collection(&mut self) {
        self.state.started_collection = self.state.started_collection.wrapping_add(1);
    }

    fn abort_collection(&mut self) {
        let aborted = self.state.finished_collection;
        let previous = aborted.wrapping_sub(1);
        self.state.values.retain(|_key, value| {
            if value.updated != aborted {
                return true;
            }
            if value.fresh {
                return false;
            }
            // Kept entries look as if they were not processed in the aborted
            // cycle. Their `current` no longer holds the previous interval,
            // but it is only read again once it has been replaced.
            value.updated = previous;
            true
        });
        self.state.started_collection = self.state.finished_collection;
        otel_debug!(name: "BasicProcessor.CollectionAborted");
    }

    fn finish_collection(&mut self) -> Result<CheckpointSet> {
        let interval_end = SystemTime::now();
        if self.state.started_collection != self.state.finished_collection.wrapping_add(1) {
            return Err(MetricsError::InconsistentState);
        }
        let finished_collection = self.state.finished_collection;
        self.state.finished_collection = self.state.finished_collection.wrapping_add(1);

        let mut result = Ok(());

        self.state.values.retain(|_key, value| {
            // Return early if previous error
            if result.is_err() {
                return true;
            }

            value.fresh = false;
            let stale = value.updated != finished_collection;

            if !value.stateful {
                // Stateless entries that were not updated over the previous
                // full collection interval are no longer needed.
                return !stale;
            }
            if stale {
                return true;
            }

            if value.descriptor.instrument_kind().precomputed_sum() {
                // delta = current - previous, previous = current
                result = value.precomputed_delta();
            } else {
                // cumulative = cumulative + current
                result = value.accumulate();
            }

            true
        });
        result?;

        let BasicProcessorState {
            values,
            process_start,
            interval_start,
            ..
        } = &*self.state;

        let mut records = Vec::with_capacity(values.len());
        for value in values.values() {
            let stale = value.updated != finished_collection;
            let (aggregator, start) = match (value.temporality, value.stateful) {
                (Temporality::Cumulative, true) => match &value.cumulative {
                    Some(cumulative) => (cumulative, *process_start),
                    None => continue,
                },
                (Temporality::Cumulative, false) => (&value.current, *process_start),
                (Temporality::Delta, true) => match &value.delta {
                    Some(delta) if !stale => (delta, *interval_start),
                    _ => continue,
                },
                (Temporality::Delta, false) => (&value.current, *interval_start),
            };

            records.push(metrics::record(
                value.descriptor.clone(),
                value.labels.clone(),
                value.resource.clone(),
                aggregator.snapshot()?,
                start,
                interval_end,
            ));
        }
        records.sort_by(compare_records);

        let checkpoint_set = CheckpointSet::new(records, *interval_start, interval_end);
        self.state.interval_start = interval_end;

        Ok(checkpoint_set)
    }
}

fn compare_records(a: &Record, b: &Record) -> std::cmp::Ordering {
    a.descriptor()
        .name()
        .cmp(b.descriptor().name())
        .then_with(|| a.labels().encoded().cmp(b.labels().encoded()))
        .then_with(|| a.resource().identity().cmp(b.resource().identity()))
}

#[derive(Debug)]
struct BasicProcessorState {
    values: HashMap<StateKey, StateValue>,
    process_start: SystemTime,
    interval_start: SystemTime,
    started_collection: u64,
    finished_collection: u64,
}

impl Default for BasicProcessorState {
    fn default() -> Self {
        let now = SystemTime::now();
        BasicProcessorState {
            values: HashMap::default(),
            process_start: now,
            interval_start: now,
            started_collection: 0,
            finished_collection: 0,
        }
    }
}

/// Identifies one output series. The hash is computed once from the
/// descriptor, the canonical label encoding and the resource.
#[derive(Debug, PartialEq, Eq)]
struct StateKey {
    hash: u64,
    descriptor: Descriptor,
    labels: LabelSet,
    resource: Resource,
}

impl StateKey {
    fn new(descriptor: &Descriptor, labels: &LabelSet, resource: &Resource) -> Self {
        let mut hasher = FnvHasher::default();
        descriptor.attribute_hash().hash(&mut hasher);
        labels.encoded().hash(&mut hasher);
        resource.identity().hash(&mut hasher);

        StateKey {
            hash: hasher.finish(),
            descriptor: descriptor.clone(),
            labels: labels.clone(),
            resource: resource.clone(),
        }
    }
}

impl Hash for StateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash)
    }
}

#[derive(Debug)]
struct StateValue {
    /// Instrument descriptor
    descriptor: Descriptor,

    /// Instrument labels, after any reduction
    labels: LabelSet,

    resource: Resource,

    /// Indicates the last sequence number when this value had process called by an
    /// accumulator.
    updated: u64,

    /// Set until the first collection that saw this entry finishes.
    fresh: bool,

    /// Indicates that memory is kept across collections, either a running
    /// total or the previous value of a precomputed sum.
    stateful: bool,

    temporality: Temporality,

    /// The data processed during the latest collection that saw this entry.
    current: Aggregator,

    /// Running total since the processor started (non-precomputed, stateful),
    /// or the previously reported value of a precomputed sum.
    cumulative: Option<Aggregator>,

    /// The change of a precomputed sum over the latest collection.
    delta: Option<Aggregator>,
}

impl StateValue {
    fn accumulate(&mut self) -> Result<()> {
        match &self.cumulative {
            Some(cumulative) => cumulative.merge(&self.current, &self.descriptor),
            None => {
                self.cumulative = Some(self.current.snapshot()?);
                Ok(())
            }
        }
    }

    fn precomputed_delta(&mut self) -> Result<()> {
        let delta = self.current.snapshot()?;
        if let Some(previous) = &self.cumulative {
            delta.subtract(previous, &self.descriptor)?;
        }
        self.delta = Some(delta);
        self.cumulative = Some(self.current.snapshot()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::metrics::accumulation;
    use crate::export::metrics::aggregation::{cumulative_temporality_selector, delta_temporality_selector};
    use crate::metrics::aggregators;
    use crate::metrics::sdk_api::{InstrumentKind, Number, NumberKind};
    use crate::metrics::selectors::simple::Selector;
    use telemetry::KeyValue;

    fn descriptor(name: &str, kind: InstrumentKind) -> Descriptor {
        Descriptor::new(name.into(), kind, NumberKind::U64, None, None)
    }

    fn sum_of(value: u64, descriptor: &Descriptor) -> Aggregator {
        let agg: Aggregator = aggregators::sum().into();
        agg.update(&value.into(), descriptor).unwrap();
        agg
    }

    /// Runs one collection, processing `inputs`, and returns
    /// `(name, labels, sum)` for every exported record.
    fn cycle(
        checkpointer: &Arc<dyn Checkpointer + Send + Sync>,
        inputs: &[(&Descriptor, &LabelSet, Aggregator)],
    ) -> Vec<(String, String, Number)> {
        let resource = Resource::empty();
        let mut out = Vec::new();
        checkpointer
            .checkpoint(&mut |locked| {
                locked.start_collection();
                for (descriptor, labels, agg) in inputs {
                    locked
                        .processor()
                        .process(accumulation(descriptor, labels, &resource, agg))?;
                }
                let set = locked.finish_collection()?;
                set.try_for_each(&mut |record| {
                    let sum = record.aggregator().as_sum().unwrap().sum()?;
                    out.push((
                        record.descriptor().name().to_string(),
                        record.labels().encoded().to_string(),
                        sum,
                    ));
                    Ok(())
                })
            })
            .unwrap();
        out
    }

    fn sums(records: &[(String, String, Number)]) -> Vec<u64> {
        records
            .iter()
            .map(|(_, _, sum)| sum.to_u64(&NumberKind::U64))
            .collect()
    }

    #[test]
    fn cumulative_totals_carry_over() {
        let checkpointer =
            factory(Selector::Inexpensive, cumulative_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let labels = LabelSet::default();

        assert_eq!(sums(&cycle(&checkpointer, &[(&requests, &labels, sum_of(5, &requests))])), [5]);
        assert_eq!(sums(&cycle(&checkpointer, &[(&requests, &labels, sum_of(3, &requests))])), [8]);
        // No new data, the running total is exported unchanged.
        assert_eq!(sums(&cycle(&checkpointer, &[])), [8]);
    }

    #[test]
    fn delta_cycles_are_isolated() {
        let checkpointer =
            factory(Selector::Inexpensive, delta_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let labels = LabelSet::default();

        assert_eq!(sums(&cycle(&checkpointer, &[(&requests, &labels, sum_of(5, &requests))])), [5]);
        assert!(cycle(&checkpointer, &[]).is_empty());
        assert_eq!(sums(&cycle(&checkpointer, &[(&requests, &labels, sum_of(2, &requests))])), [2]);
    }

    #[test]
    fn same_cycle_collisions_merge() {
        let checkpointer =
            factory(Selector::Inexpensive, delta_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let labels = LabelSet::from(&[KeyValue::new("method", "GET")]);

        let records = cycle(
            &checkpointer,
            &[
                (&requests, &labels, sum_of(5, &requests)),
                (&requests, &labels, sum_of(3, &requests)),
            ],
        );
        assert_eq!(records.len(), 1);
        assert_eq!(sums(&records), [8]);
    }

    #[test]
    fn precomputed_sums_become_deltas() {
        let checkpointer =
            factory(Selector::Inexpensive, delta_temporality_selector()).checkpointer();
        let bytes = descriptor("bytes.read", InstrumentKind::CounterObserver);
        let labels = LabelSet::default();

        assert_eq!(sums(&cycle(&checkpointer, &[(&bytes, &labels, sum_of(10, &bytes))])), [10]);
        assert_eq!(sums(&cycle(&checkpointer, &[(&bytes, &labels, sum_of(15, &bytes))])), [5]);
        assert_eq!(sums(&cycle(&checkpointer, &[(&bytes, &labels, sum_of(15, &bytes))])), [0]);
        assert!(cycle(&checkpointer, &[]).is_empty());
    }

    #[test]
    fn precomputed_sums_pass_through_cumulative() {
        let checkpointer =
            factory(Selector::Inexpensive, cumulative_temporality_selector()).checkpointer();
        let bytes = descriptor("bytes.read", InstrumentKind::CounterObserver);
        let labels = LabelSet::default();

        assert_eq!(sums(&cycle(&checkpointer, &[(&bytes, &labels, sum_of(10, &bytes))])), [10]);
        assert_eq!(sums(&cycle(&checkpointer, &[(&bytes, &labels, sum_of(15, &bytes))])), [15]);
        // A series the observer stopped reporting disappears.
        assert!(cycle(&checkpointer, &[]).is_empty());
    }

    #[test]
    fn records_are_sorted_by_name_and_labels() {
        let checkpointer =
            factory(Selector::Inexpensive, delta_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let errors = descriptor("errors", InstrumentKind::Counter);
        let a = LabelSet::from(&[KeyValue::new("route", "/a")]);
        let b = LabelSet::from(&[KeyValue::new("route", "/b")]);

        let records = cycle(
            &checkpointer,
            &[
                (&requests, &b, sum_of(3, &requests)),
                (&errors, &a, sum_of(1, &errors)),
                (&requests, &a, sum_of(5, &requests)),
            ],
        );
        let names: Vec<_> = records.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(names, ["errors", "requests", "requests"]);
        assert_eq!(sums(&records), [1, 5, 3]);
    }

    #[test]
    fn process_outside_collection_is_inconsistent() {
        let checkpointer =
            factory(Selector::Inexpensive, delta_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let agg = sum_of(1, &requests);
        let labels = LabelSet::default();
        let resource = Resource::empty();

        let result = checkpointer.checkpoint(&mut |locked| {
            locked
                .processor()
                .process(accumulation(&requests, &labels, &resource, &agg))
        });
        assert!(matches!(result, Err(MetricsError::InconsistentState)));

        let result = checkpointer.checkpoint(&mut |locked| locked.finish_collection().map(|_| ()));
        assert!(matches!(result, Err(MetricsError::InconsistentState)));
    }

    #[test]
    fn aborted_collection_is_discarded() {
        let checkpointer =
            factory(Selector::Inexpensive, cumulative_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let labels = LabelSet::default();
        let resource = Resource::empty();
        let lost = sum_of(100, &requests);

        checkpointer
            .checkpoint(&mut |locked| {
                locked.start_collection();
                locked
                    .processor()
                    .process(accumulation(&requests, &labels, &resource, &lost))?;
                locked.abort_collection();
                Ok(())
            })
            .unwrap();

        assert_eq!(sums(&cycle(&checkpointer, &[(&requests, &labels, sum_of(4, &requests))])), [4]);
    }

    #[test]
    fn cumulative_records_start_at_process_start() {
        let checkpointer =
            factory(Selector::Inexpensive, cumulative_temporality_selector()).checkpointer();
        let requests = descriptor("requests", InstrumentKind::Counter);
        let labels = LabelSet::default();
        let resource = Resource::empty();
        let agg = sum_of(1, &requests);

        let mut starts = Vec::new();
        let mut set_starts = Vec::new();
        for _ in 0..2 {
            checkpointer
                .checkpoint(&mut |locked| {
                    locked.start_collection();
                    locked
                        .processor()
                        .process(accumulation(&requests, &labels, &resource, &agg))?;
                    let set = locked.finish_collection()?;
                    starts.push(*set.records()[0].start_time());
                    set_starts.push(*set.start_time());
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(starts[0], starts[1]);
        assert!(set_starts[1] >= set_starts[0]);
    }
}
