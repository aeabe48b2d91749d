use crate::export::metrics::{
    accumulation, Accumulation, AggregatorSelector, CheckpointSet, Checkpointer,
    CheckpointerFactory, LockedCheckpointer, LockedProcessor, Processor,
};
use crate::metrics::sdk_api::Descriptor;
use core::fmt;
use std::sync::Arc;
use telemetry::{metrics::Result, KeyValue};

/// Decides whether a label is kept. Labels for which the filter returns
/// `false` are dropped before the accumulation reaches the inner processor.
pub type LabelFilter = Arc<dyn Fn(&KeyValue) -> bool + Send + Sync>;

/// Chooses the [`LabelFilter`] for an instrument.
pub trait LabelFilterSelector {
    /// The filter for series of `descriptor`, or `None` to keep every label.
    fn label_filter_for(&self, descriptor: &Descriptor) -> Option<LabelFilter>;
}

impl<F> LabelFilterSelector for F
where
    F: Fn(&Descriptor) -> Option<LabelFilter>,
{
    fn label_filter_for(&self, descriptor: &Descriptor) -> Option<LabelFilter> {
        self(descriptor)
    }
}

/// Wraps the checkpointers of `factory` so that every accumulation has its
/// label set reduced by `filter_selector` first.
///
/// Series that become identical after reduction are merged by the inner
/// processor, giving the same result as recording against the reduced label
/// set directly.
pub fn reducer<F, S>(factory: F, filter_selector: S) -> ReducerProcessorBuilder
where
    F: CheckpointerFactory + Send + Sync + 'static,
    S: LabelFilterSelector + Send + Sync + 'static,
{
    ReducerProcessorBuilder {
        factory: Box::new(factory),
        filter_selector: Arc::new(filter_selector),
    }
}

/// Creates [`ReducerProcessor`]s around the checkpointers of another factory.
pub struct ReducerProcessorBuilder {
    factory: Box<dyn CheckpointerFactory + Send + Sync>,
    filter_selector: Arc<dyn LabelFilterSelector + Send + Sync>,
}

impl fmt::Debug for ReducerProcessorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerProcessorBuilder").finish()
    }
}

impl CheckpointerFactory for ReducerProcessorBuilder {
    fn checkpointer(&self) -> Arc<dyn Checkpointer + Send + Sync> {
        Arc::new(ReducerProcessor {
            inner: self.factory.checkpointer(),
            filter_selector: Arc::clone(&self.filter_selector),
        })
    }
}

/// A checkpointer that reduces label sets before handing accumulations to
/// the checkpointer it wraps.
pub struct ReducerProcessor {
    inner: Arc<dyn Checkpointer + Send + Sync>,
    filter_selector: Arc<dyn LabelFilterSelector + Send + Sync>,
}

impl fmt::Debug for ReducerProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerProcessor")
            .field("inner", &self.inner)
            .finish()
    }
}

impl Processor for ReducerProcessor {
    fn aggregator_selector(&self) -> &dyn AggregatorSelector {
        self.inner.aggregator_selector()
    }
}

impl Checkpointer for ReducerProcessor {
    fn checkpoint(
        &self,
        f: &mut dyn FnMut(&mut dyn LockedCheckpointer) -> Result<()>,
    ) -> Result<()> {
        self.inner.checkpoint(&mut |locked| {
            f(&mut ReducerLockedProcessor {
                inner: locked,
                filter_selector: self.filter_selector.as_ref(),
            })
        })
    }
}

struct ReducerLockedProcessor<'a> {
    inner: &'a mut dyn LockedCheckpointer,
    filter_selector: &'a (dyn LabelFilterSelector + Send + Sync),
}

impl LockedProcessor for ReducerLockedProcessor<'_> {
    fn process(&mut self, acc: Accumulation<'_>) -> Result<()> {
        let Some(filter) = self.filter_selector.label_filter_for(acc.descriptor()) else {
            return self.inner.processor().process(acc);
        };

        let labels = acc.labels().filter(|kv| filter(kv));
        self.inner.processor().process(accumulation(
            acc.descriptor(),
            &labels,
            acc.resource(),
            acc.aggregator(),
        ))
    }
}

impl LockedCheckpointer for ReducerLockedProcessor<'_> {
    fn processor(&mut self) -> &mut dyn LockedProcessor {
        self
    }

    fn start_collection(&mut self) {
        self.inner.start_collection()
    }

    fn abort_collection(&mut self) {
        self.inner.abort_collection()
    }

    fn finish_collection(&mut self) -> Result<CheckpointSet> {
        self.inner.finish_collection()
    }
}
