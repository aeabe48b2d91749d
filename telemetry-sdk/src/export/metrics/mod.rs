//! Metrics Export
//!
//! The boundary between the pipeline and exporters. The accumulator hands
//! [`Accumulation`]s to a [`LockedProcessor`]; the processor turns them into a
//! [`CheckpointSet`] of owned [`Record`]s, which a controller hands to a
//! [`MetricsExporter`].
use core::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use telemetry::{labels::LabelSet, metrics::Result, Context};

use crate::{
    metrics::{aggregators::Aggregator, sdk_api::Descriptor},
    Resource,
};

pub mod aggregation;
mod stdout;

pub use stdout::{stdout, ExportLine, ExportNumeric, StdoutExporter, StdoutExporterBuilder};

/// AggregatorSelector supports selecting the kind of `Aggregator` to use at
/// runtime for a specific metric instrument.
pub trait AggregatorSelector {
    /// This allocates a variable number of aggregators of a kind suitable for
    /// the requested export.
    ///
    /// When the call returns `None`, the metric instrument is explicitly disabled.
    ///
    /// This must return a consistent variant for a given descriptor, since
    /// aggregators only merge with their own variant.
    ///
    /// This call should not block.
    fn aggregator_for(&self, descriptor: &Descriptor) -> Option<Aggregator>;
}

/// A container for the common elements for exported metric data that are shared
/// by the `Accumulator`->`Processor` and `Processor`->`Exporter` steps.
#[derive(Debug)]
pub struct Metadata<'a> {
    descriptor: &'a Descriptor,
    labels: &'a LabelSet,
    resource: &'a Resource,
}

impl<'a> Metadata<'a> {
    /// Create a new `Metadata` instance.
    pub fn new(descriptor: &'a Descriptor, labels: &'a LabelSet, resource: &'a Resource) -> Self {
        Metadata {
            descriptor,
            labels,
            resource,
        }
    }

    /// A description of the metric instrument being exported.
    pub fn descriptor(&self) -> &Descriptor {
        self.descriptor
    }

    /// The labels associated with the instrument and the aggregated data.
    pub fn labels(&self) -> &LabelSet {
        self.labels
    }

    /// Common attributes that apply to this metric event.
    pub fn resource(&self) -> &Resource {
        self.resource
    }
}

/// Allows `Accumulator` implementations to construct new `Accumulation`s to
/// send to `Processor`s. The `Descriptor`, `LabelSet`, `Resource`, and
/// `Aggregator` represent aggregate metric events received over a single
/// collection period.
pub fn accumulation<'a>(
    descriptor: &'a Descriptor,
    labels: &'a LabelSet,
    resource: &'a Resource,
    aggregator: &'a Aggregator,
) -> Accumulation<'a> {
    Accumulation::new(descriptor, labels, resource, aggregator)
}

/// A container for the exported data for a single metric instrument and label
/// set, as prepared by an `Accumulator` for the `Processor`.
pub struct Accumulation<'a> {
    metadata: Metadata<'a>,
    aggregator: &'a Aggregator,
}

impl<'a> Accumulation<'a> {
    /// Create a new `Accumulation` instance.
    pub fn new(
        descriptor: &'a Descriptor,
        labels: &'a LabelSet,
        resource: &'a Resource,
        aggregator: &'a Aggregator,
    ) -> Self {
        Accumulation {
            metadata: Metadata::new(descriptor, labels, resource),
            aggregator,
        }
    }

    /// A description of the metric instrument being exported.
    pub fn descriptor(&self) -> &Descriptor {
        self.metadata.descriptor
    }

    /// The labels associated with the instrument and the aggregated data.
    pub fn labels(&self) -> &LabelSet {
        self.metadata.labels
    }

    /// Common attributes that apply to this metric event.
    pub fn resource(&self) -> &Resource {
        self.metadata.resource
    }

    /// The checkpointed aggregator for this metric.
    pub fn aggregator(&self) -> &Aggregator {
        self.aggregator
    }
}

impl fmt::Debug for Accumulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulation")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Metric data processor.
///
/// Locked processors are responsible gathering exported results from the SDK during
/// collection, and deciding over which dimensions to group the exported data.
///
/// The `process` method is called during collection in a single-threaded
/// context from the SDK, after the aggregator is checkpointed, allowing the
/// processor to build the set of metrics currently being exported.
pub trait LockedProcessor {
    /// Process is called by the SDK once per internal record, passing the export
    /// [`Accumulation`] (a Descriptor, the corresponding labels, and the
    /// checkpointed aggregator).
    ///
    /// This call has no [`Context`] argument because it is expected to perform only
    /// computation. An SDK is not expected to call exporters from within Process, use
    /// a controller for that.
    fn process(&mut self, accumulation: Accumulation<'_>) -> Result<()>;
}

/// The exported data for a single metric instrument and label set, as prepared
/// by the `Processor` for the `Exporter`. This includes the effective start
/// and end time for the aggregation.
///
/// A record owns an immutable snapshot of its aggregator, so it stays valid
/// while writers keep updating the live series.
pub struct Record {
    descriptor: Descriptor,
    labels: LabelSet,
    resource: Resource,
    aggregator: Aggregator,
    start: SystemTime,
    end: SystemTime,
}

impl Record {
    /// A description of the metric instrument being exported.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The labels associated with the instrument and the aggregated data.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Common attributes that apply to this metric event.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The aggregated data for this metric
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// The start time of the interval covered by this aggregation.
    pub fn start_time(&self) -> &SystemTime {
        &self.start
    }

    /// The end time of the interval covered by this aggregation.
    pub fn end_time(&self) -> &SystemTime {
        &self.end
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("descriptor", &self.descriptor)
            .field("labels", &self.labels)
            .field("aggregation", self.aggregator.kind())
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

/// Allows `Processor` implementations to construct export records. The
/// `Descriptor`, `LabelSet`, `Resource` and `Aggregator` represent aggregate
/// metric events received over a single collection period.
pub fn record(
    descriptor: Descriptor,
    labels: LabelSet,
    resource: Resource,
    aggregator: Aggregator,
    start: SystemTime,
    end: SystemTime,
) -> Record {
    Record {
        descriptor,
        labels,
        resource,
        aggregator,
        start,
        end,
    }
}

/// The complete, immutable result of one collection.
///
/// A checkpoint set is produced once by
/// [`LockedCheckpointer::finish_collection`] and consumed by an exporter.
#[derive(Debug)]
pub struct CheckpointSet {
    records: Vec<Record>,
    start: SystemTime,
    end: SystemTime,
}

impl CheckpointSet {
    /// Create a checkpoint set covering the interval `start..end`.
    pub fn new(records: Vec<Record>, start: SystemTime, end: SystemTime) -> Self {
        CheckpointSet {
            records,
            start,
            end,
        }
    }

    /// Calls `f` once per record. Stops at, and returns, the first error.
    pub fn try_for_each(&self, f: &mut dyn FnMut(&Record) -> Result<()>) -> Result<()> {
        self.records.iter().try_for_each(f)
    }

    /// The records in this set.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records in the set.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection produced no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The start of the collection interval.
    pub fn start_time(&self) -> &SystemTime {
        &self.start
    }

    /// The end of the collection interval.
    pub fn end_time(&self) -> &SystemTime {
        &self.end
    }
}

/// Exporter handles presentation of the checkpoint of aggregate
/// metrics.  This is the final stage of a metrics export pipeline,
/// where metric data are formatted for a specific system.
///
/// Exporters are called at most once per checkpoint set; failed exports are
/// not retried.
pub trait MetricsExporter: fmt::Debug {
    /// Export is called immediately after completing a collection
    /// pass in the SDK.
    ///
    /// The Context comes from the controller that initiated
    /// collection.
    fn export(&self, cx: &Context, resource: &Resource, checkpoint_set: &CheckpointSet)
        -> Result<()>;
}

/// The interface used to create checkpoints.
pub trait Checkpointer: Processor {
    /// Synchronizes the checkpoint process and allows a single locked
    /// checkpoint to be accessed at a time.
    fn checkpoint(
        &self,
        f: &mut dyn FnMut(&mut dyn LockedCheckpointer) -> Result<()>,
    ) -> Result<()>;
}

/// The interface used by a controller to coordinate the processor with
/// accumulator(s) and exporter(s).
///
/// The `start_collection` and `finish_collection` methods start and finish a
/// collection interval. Controllers call the Accumulator(s) during collection
/// to process Accumulations.
pub trait LockedCheckpointer {
    /// Processes metric data for export.
    ///
    /// The `process` method is bracketed by `start_collection` and
    /// `finish_collection` calls.
    fn processor(&mut self) -> &mut dyn LockedProcessor;

    /// begins a collection interval.
    fn start_collection(&mut self);

    /// Discards everything processed since `start_collection`. State retained
    /// from earlier intervals is kept.
    fn abort_collection(&mut self);

    /// ends a collection interval, returning the records to export.
    fn finish_collection(&mut self) -> Result<CheckpointSet>;
}

/// An interface for producing configured [`Checkpointer`] instances.
pub trait CheckpointerFactory {
    /// Creates a new configured checkpointer.
    fn checkpointer(&self) -> Arc<dyn Checkpointer + Send + Sync>;
}

/// A utility extension to allow upcasting.
pub trait AsDynProcessor {
    /// Create an `Arc<dyn Processor>` from an impl of [`Processor`].
    fn as_dyn_processor<'a>(self: Arc<Self>) -> Arc<dyn Processor + Send + Sync + 'a>
    where
        Self: 'a;
}

impl<T: Processor + Sized + Send + Sync> AsDynProcessor for T {
    fn as_dyn_processor<'a>(self: Arc<Self>) -> Arc<dyn Processor + Send + Sync + 'a>
    where
        Self: 'a,
    {
        self
    }
}

/// Processor is responsible for deciding which kind of aggregation to use (via
/// `aggregator_selector`), gathering exported results from the SDK during
/// collection, and deciding over which dimensions to group the exported data.
///
/// The embedded AggregatorSelector interface is called (concurrently) in
/// instrumentation context to select the appropriate Aggregator for an
/// instrument.
pub trait Processor: AsDynProcessor + fmt::Debug {
    /// AggregatorSelector is responsible for selecting the
    /// concrete type of Aggregator used for a metric in the SDK.
    ///
    /// Note that the SDK only calls `aggregator_for` when new series
    /// require an Aggregator. This does not provide a way to
    /// disable metrics with active series.
    fn aggregator_selector(&self) -> &dyn AggregatorSelector;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregators;
    use crate::metrics::sdk_api::{InstrumentKind, NumberKind};
    use telemetry::metrics::MetricsError;

    fn checkpoint_set(names: &[&str]) -> CheckpointSet {
        let now = SystemTime::now();
        let records = names
            .iter()
            .map(|name| {
                let descriptor = Descriptor::new(
                    name.to_string(),
                    InstrumentKind::Counter,
                    NumberKind::U64,
                    None,
                    None,
                );
                record(
                    descriptor,
                    LabelSet::default(),
                    Resource::empty(),
                    aggregators::sum().into(),
                    now,
                    now,
                )
            })
            .collect();
        CheckpointSet::new(records, now, now)
    }

    #[test]
    fn visits_every_record_once() {
        let set = checkpoint_set(&["a", "b", "c"]);
        let mut seen = Vec::new();
        set.try_for_each(&mut |record| {
            seen.push(record.descriptor().name().to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn stops_at_first_error() {
        let set = checkpoint_set(&["a", "b", "c"]);
        let mut visited = 0;
        let result = set.try_for_each(&mut |record| {
            visited += 1;
            if record.descriptor().name() == "b" {
                Err(MetricsError::Other("stop".into()))
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
        assert_eq!(visited, 2);
    }

    #[test]
    fn empty_set() {
        let set = checkpoint_set(&[]);
        assert!(set.is_empty());
        assert!(set.try_for_each(&mut |_| Ok(())).is_ok());
    }
}
