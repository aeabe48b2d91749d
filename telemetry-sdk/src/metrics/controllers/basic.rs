use std::{
    env, fmt,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use telemetry::{
    global::handle_error,
    metrics::{MetricsError, Result},
    otel_debug, otel_error, otel_info, otel_warn, Context,
};

use crate::{
    export::metrics::{CheckpointSet, Checkpointer, CheckpointerFactory, MetricsExporter},
    metrics::{accumulator, Accumulator, Meter, MeterProvider},
    resource::Resource,
};

const DEFAULT_COLLECT_PERIOD: Duration = Duration::from_secs(60);
const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(30);

const METRIC_EXPORT_INTERVAL_NAME: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const METRIC_EXPORT_TIMEOUT_NAME: &str = "OTEL_METRIC_EXPORT_TIMEOUT";

/// Returns a new builder using the provided checkpointer factory.
///
/// Use builder options (including optional exporter) to configure a metric
/// export pipeline.
pub fn basic<T>(factory: T) -> BasicControllerBuilder
where
    T: CheckpointerFactory + Send + Sync + 'static,
{
    BasicControllerBuilder {
        checkpointer_factory: Box::new(factory),
        resource: None,
        exporter: None,
        collect_period: None,
        collect_timeout: None,
        push_timeout: None,
        idle_eviction_cycles: None,
    }
}

/// Organizes and synchronizes collection of metric data in both "pull" and
/// "push" configurations.
///
/// This supports two distinct modes:
///
/// - Push: `start` spawns a background thread that collects and exports once
///   per collect period, until `stop` is called.
/// - Pull: `collect` returns a checkpoint set to the caller, and
///   `collect_and_export` hands one to the configured exporter.
///
/// All meters of a controller record into one accumulator, so instruments are
/// identified by their descriptor alone.
#[derive(Clone)]
pub struct BasicController(Arc<ControllerInner>);

struct ControllerInner {
    accumulator: Accumulator,
    checkpointer: Arc<dyn Checkpointer + Send + Sync>,
    resource: Resource,
    exporter: Option<Box<dyn MetricsExporter + Send + Sync>>,
    worker: Mutex<Option<Worker>>,
    collect_period: Duration,
    collect_timeout: Duration,
    push_timeout: Duration,
}

struct Worker {
    sender: Sender<Message>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
enum Message {
    Flush(Sender<Result<()>>),
    Shutdown(Sender<Result<()>>),
}

impl BasicController {
    /// Collects once from every observer and series, returning the
    /// checkpoint set of this collection.
    ///
    /// The collection is cancelled when `cx` is, or when the collect timeout
    /// elapses; nothing is returned in that case and the next collection
    /// picks up the pending updates. Observer callback failures are reported
    /// to the global error handler and do not fail the collection.
    pub fn collect(&self, cx: &Context) -> Result<CheckpointSet> {
        let cx = if self.0.collect_timeout.is_zero() {
            cx.clone()
        } else {
            cx.with_timeout(self.0.collect_timeout)
        };

        let mut checkpoint_set = None;
        self.0.checkpointer.checkpoint(&mut |locked| {
            locked.start_collection();
            match self.0.accumulator.collect(&cx, locked.processor()) {
                Ok(_) => {}
                Err(MetricsError::PartialCollection {
                    checkpointed,
                    errors,
                }) => {
                    otel_warn!(
                        name: "BasicController.PartialCollection",
                        checkpointed = checkpointed,
                        failed_callbacks = errors.len()
                    );
                    for err in errors {
                        handle_error(err);
                    }
                }
                Err(err) => {
                    locked.abort_collection();
                    return Err(err);
                }
            }

            checkpoint_set = Some(locked.finish_collection()?);
            Ok(())
        })?;

        checkpoint_set.ok_or(MetricsError::InconsistentState)
    }

    /// Collects and hands the result to the configured exporter, if any.
    ///
    /// Export failures are returned, never retried.
    pub fn collect_and_export(&self, cx: &Context) -> Result<()> {
        let checkpoint_set = self.collect(cx)?;
        let Some(exporter) = &self.0.exporter else {
            return Ok(());
        };
        if checkpoint_set.is_empty() {
            otel_debug!(name: "BasicController.NoMetricsCollected");
        }

        let cx = if self.0.push_timeout.is_zero() {
            cx.clone()
        } else {
            cx.with_timeout(self.0.push_timeout)
        };
        exporter.export(&cx, &self.0.resource, &checkpoint_set)
    }

    /// Starts a background thread that collects and exports metrics with the
    /// configured period.
    ///
    /// This is required for calling a configured [`MetricsExporter`]
    /// periodically and is otherwise optional when only pulling metric data.
    /// Returns an error when the controller was already started.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.0.worker.lock()?;
        if worker.is_some() {
            return Err(MetricsError::Other("controller already started".into()));
        }

        let (sender, receiver) = mpsc::channel();
        let controller = self.clone();
        let handle = thread::Builder::new()
            .name("telemetry.metrics.BasicController".to_string())
            .spawn(move || controller.run(receiver))
            .map_err(|err| {
                otel_error!(
                    name: "BasicController.ThreadStartError",
                    error = format!("{:?}", err)
                );
                MetricsError::Other(err.to_string())
            })?;

        *worker = Some(Worker { sender, handle });
        Ok(())
    }

    fn run(&self, receiver: Receiver<Message>) {
        let period = self.0.collect_period;
        let mut interval_start = Instant::now();
        let mut remaining = period;
        otel_info!(
            name: "BasicController.ThreadStarted",
            period_ms = period.as_millis()
        );

        loop {
            match receiver.recv_timeout(remaining) {
                Ok(Message::Flush(response)) => {
                    otel_debug!(name: "BasicController.ExportingDueToFlush");
                    let _ = response.send(self.collect_and_export(&Context::new()));

                    let elapsed = interval_start.elapsed();
                    if elapsed < period {
                        remaining = period - elapsed;
                    } else {
                        interval_start = Instant::now();
                        remaining = Duration::ZERO;
                    }
                }
                Ok(Message::Shutdown(response)) => {
                    otel_debug!(name: "BasicController.ExportingDueToShutdown");
                    let _ = response.send(self.collect_and_export(&Context::new()));
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let export_start = Instant::now();
                    if let Err(err) = self.collect_and_export(&Context::new()) {
                        handle_error(err);
                    }

                    let taken = export_start.elapsed();
                    interval_start = Instant::now();
                    remaining = period.saturating_sub(taken);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        otel_info!(name: "BasicController.ThreadStopped");
    }

    /// Collects and exports immediately.
    ///
    /// When started, the background thread does the work and the periodic
    /// schedule is kept; otherwise this runs on the calling thread.
    pub fn force_flush(&self) -> Result<()> {
        let sender = self
            .0
            .worker
            .lock()?
            .as_ref()
            .map(|worker| worker.sender.clone());
        let Some(sender) = sender else {
            return self.collect_and_export(&Context::new());
        };

        let (response_tx, response_rx) = mpsc::channel();
        sender
            .send(Message::Flush(response_tx))
            .map_err(|err| MetricsError::Other(err.to_string()))?;
        response_rx
            .recv()
            .map_err(|err| MetricsError::Other(format!("flush failed: {}", err)))?
    }

    /// Stops the background thread after one last collection and export, and
    /// waits for it to exit.
    ///
    /// Does nothing when the controller is not running.
    pub fn stop(&self) -> Result<()> {
        let Some(worker) = self.0.worker.lock()?.take() else {
            return Ok(());
        };

        let (response_tx, response_rx) = mpsc::channel();
        let result = worker
            .sender
            .send(Message::Shutdown(response_tx))
            .map_err(|err| MetricsError::Other(err.to_string()))
            .and_then(|_| {
                response_rx
                    .recv()
                    .map_err(|err| MetricsError::Other(format!("shutdown failed: {}", err)))?
            });

        if worker.handle.join().is_err() {
            return Err(MetricsError::Other("controller thread panicked".into()));
        }
        result
    }

    /// true if the controller was started via `start`.
    pub fn is_running(&self) -> bool {
        self.0
            .worker
            .lock()
            .map(|worker| worker.is_some())
            .unwrap_or(false)
    }

    /// Get a reference to the current resource.
    pub fn resource(&self) -> &Resource {
        &self.0.resource
    }

    /// The number of measurements dropped by the accumulator since the
    /// controller was built.
    pub fn dropped_measurements(&self) -> u64 {
        self.0.accumulator.dropped_measurements()
    }
}

impl MeterProvider for BasicController {
    fn versioned_meter(&self, name: &'static str, version: Option<&'static str>) -> Meter {
        Meter::new(name, version, self.0.accumulator.clone())
    }
}

impl fmt::Debug for BasicController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicController")
            .field("resource", &self.0.resource)
            .field("exporter", &self.0.exporter)
            .field("collect_period", &self.0.collect_period)
            .field("collect_timeout", &self.0.collect_timeout)
            .field("push_timeout", &self.0.push_timeout)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Options for configuring a [`BasicController`]
pub struct BasicControllerBuilder {
    checkpointer_factory: Box<dyn CheckpointerFactory + Send + Sync>,
    resource: Option<Resource>,
    exporter: Option<Box<dyn MetricsExporter + Send + Sync>>,
    collect_period: Option<Duration>,
    collect_timeout: Option<Duration>,
    push_timeout: Option<Duration>,
    idle_eviction_cycles: Option<u64>,
}

impl BasicControllerBuilder {
    /// Sets the [`Resource`] used for this controller.
    ///
    /// Defaults to the resource detected from the environment and the SDK.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Sets the exporter used for exporting metric data.
    ///
    /// Note: Exporters such as Prometheus that pull data do not implement
    /// [`MetricsExporter`]. They will directly call `collect` on the
    /// controller.
    pub fn with_exporter(mut self, exporter: impl MetricsExporter + Send + Sync + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    /// Sets the interval between calls to `collect` and `export` while the
    /// controller is started.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_INTERVAL`
    /// environment variable. A zero period is ignored.
    ///
    /// If this option is not used, 60 seconds is used as the default.
    pub fn with_collect_period(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            self.collect_period = Some(period);
        }
        self
    }

    /// Sets the timeout of the `collect` call, after which it is cancelled.
    /// A zero timeout disables it.
    ///
    /// If this option is not used, 10 seconds is used as the default.
    pub fn with_collect_timeout(mut self, timeout: Duration) -> Self {
        self.collect_timeout = Some(timeout);
        self
    }

    /// Sets the deadline given to the exporter, through its context.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_TIMEOUT`
    /// environment variable. A zero timeout disables it.
    ///
    /// If this option is not used, 30 seconds is used as the default.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = Some(timeout);
        self
    }

    /// The number of collections without updates after which an unreferenced
    /// series is dropped from the accumulator. Defaults to 1.
    pub fn with_idle_eviction_cycles(mut self, cycles: u64) -> Self {
        self.idle_eviction_cycles = Some(cycles);
        self
    }

    /// Build a new [`BasicController`] from the current configuration.
    pub fn build(self) -> BasicController {
        let resource = self.resource.unwrap_or_else(Resource::from_environment);
        let checkpointer = self.checkpointer_factory.checkpointer();
        let mut accumulator = accumulator(checkpointer.clone().as_dyn_processor())
            .with_resource(resource.clone());
        if let Some(cycles) = self.idle_eviction_cycles {
            accumulator = accumulator.with_idle_eviction_cycles(cycles);
        }

        let collect_period = self
            .collect_period
            .unwrap_or_else(|| duration_from_env(METRIC_EXPORT_INTERVAL_NAME, DEFAULT_COLLECT_PERIOD));
        let push_timeout = self
            .push_timeout
            .unwrap_or_else(|| duration_from_env(METRIC_EXPORT_TIMEOUT_NAME, DEFAULT_PUSH_TIMEOUT));

        BasicController(Arc::new(ControllerInner {
            accumulator: accumulator.build(),
            checkpointer,
            resource,
            exporter: self.exporter,
            worker: Mutex::new(None),
            collect_period,
            collect_timeout: self.collect_timeout.unwrap_or(DEFAULT_COLLECT_TIMEOUT),
            push_timeout,
        }))
    }
}

impl fmt::Debug for BasicControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicControllerBuilder")
            .field("resource", &self.resource)
            .field("exporter", &self.exporter)
            .field("collect_period", &self.collect_period)
            .field("collect_timeout", &self.collect_timeout)
            .field("push_timeout", &self.push_timeout)
            .finish()
    }
}

/// Reads a positive number of milliseconds from `name`. Unset, zero or
/// unparsable values give `default`.
fn duration_from_env(name: &'static str, default: Duration) -> Duration {
    let Ok(value) = env::var(name) else {
        return default;
    };

    match value.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Duration::from_millis(millis),
        _ => {
            otel_warn!(
                name: "BasicController.InvalidEnvValue",
                variable = name,
                value = value,
                default_ms = default.as_millis()
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::metrics::aggregation::{cumulative_temporality_selector, delta_temporality_selector};
    use crate::metrics::processors::factory;
    use crate::metrics::sdk_api::NumberKind;
    use crate::metrics::selectors::simple::Selector;
    use telemetry::KeyValue;

    /// Keeps `(name, sum)` of every exported record.
    #[derive(Clone, Debug, Default)]
    struct RecordingExporter(Arc<Mutex<Vec<Vec<(String, u64)>>>>);

    impl MetricsExporter for RecordingExporter {
        fn export(&self, _cx: &Context, _res: &Resource, set: &CheckpointSet) -> Result<()> {
            let mut batch = Vec::new();
            set.try_for_each(&mut |record| {
                let sum = record
                    .aggregator()
                    .as_sum()
                    .map(|agg| agg.sum())
                    .transpose()?
                    .map_or(0, |sum| sum.to_u64(&NumberKind::U64));
                batch.push((record.descriptor().name().to_string(), sum));
                Ok(())
            })?;
            self.0.lock()?.push(batch);
            Ok(())
        }
    }

    fn controller(exporter: RecordingExporter) -> BasicController {
        basic(factory(Selector::Inexpensive, delta_temporality_selector()))
            .with_resource(Resource::new([KeyValue::new("service.name", "test")]))
            .with_exporter(exporter)
            .build()
    }

    #[test]
    fn collect_returns_checkpoint_set() {
        let controller = basic(factory(Selector::Inexpensive, cumulative_temporality_selector()))
            .with_resource(Resource::empty())
            .build();
        let counter = controller.meter("test").u64_counter("requests").init();
        counter.add(5, &[]);
        counter.add(7, &[]);

        let set = controller.collect(&Context::new()).unwrap();
        assert_eq!(set.len(), 1);
        let record = &set.records()[0];
        assert_eq!(record.aggregator().as_sum().unwrap().sum().unwrap().to_u64(&NumberKind::U64), 12);
    }

    #[test]
    fn cancelled_collect_keeps_updates() {
        let controller = basic(factory(Selector::Inexpensive, delta_temporality_selector()))
            .with_resource(Resource::empty())
            .build();
        let counter = controller.meter("test").u64_counter("requests").init();
        counter.add(5, &[]);

        let (cx, handle) = Context::new().with_cancellation();
        handle.cancel();
        assert!(matches!(controller.collect(&cx), Err(MetricsError::Cancelled)));

        let set = controller.collect(&Context::new()).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn collect_and_export_pushes_to_exporter() {
        let exporter = RecordingExporter::default();
        let controller = controller(exporter.clone());
        controller
            .meter("test")
            .u64_counter("requests")
            .init()
            .add(3, &[]);

        controller.collect_and_export(&Context::new()).unwrap();
        assert_eq!(
            *exporter.0.lock().unwrap(),
            vec![vec![("requests".to_string(), 3)]]
        );
    }

    #[test]
    fn force_flush_without_start_runs_inline() {
        let exporter = RecordingExporter::default();
        let controller = controller(exporter.clone());
        controller.force_flush().unwrap();
        assert_eq!(exporter.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn started_controller_flushes_and_stops() {
        let exporter = RecordingExporter::default();
        let controller = basic(factory(Selector::Inexpensive, delta_temporality_selector()))
            .with_resource(Resource::empty())
            .with_exporter(exporter.clone())
            .with_collect_period(Duration::from_secs(3600))
            .build();
        let counter = controller.meter("test").u64_counter("requests").init();

        controller.start().unwrap();
        assert!(controller.is_running());
        assert!(controller.start().is_err());

        counter.add(2, &[]);
        controller.force_flush().unwrap();
        counter.add(4, &[]);
        controller.stop().unwrap();
        assert!(!controller.is_running());

        let batches = exporter.0.lock().unwrap();
        assert_eq!(
            *batches,
            vec![
                vec![("requests".to_string(), 2)],
                vec![("requests".to_string(), 4)],
            ]
        );
        drop(batches);

        // Stopping twice is a no-op.
        assert!(controller.stop().is_ok());
    }

    #[test]
    fn periodic_export_runs_on_timer() {
        let exporter = RecordingExporter::default();
        let controller = basic(factory(Selector::Inexpensive, delta_temporality_selector()))
            .with_resource(Resource::empty())
            .with_exporter(exporter.clone())
            .with_collect_period(Duration::from_millis(20))
            .build();

        controller.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        controller.stop().unwrap();

        assert!(exporter.0.lock().unwrap().len() >= 2);
    }

    #[test]
    fn periods_come_from_env() {
        temp_env::with_vars(
            [
                (METRIC_EXPORT_INTERVAL_NAME, Some("2500")),
                (METRIC_EXPORT_TIMEOUT_NAME, Some("not-a-number")),
            ],
            || {
                let controller =
                    basic(factory(Selector::Inexpensive, delta_temporality_selector()))
                        .with_resource(Resource::empty())
                        .build();
                assert_eq!(controller.0.collect_period, Duration::from_millis(2500));
                assert_eq!(controller.0.push_timeout, DEFAULT_PUSH_TIMEOUT);
            },
        );
    }

    #[test]
    fn builder_overrides_env() {
        temp_env::with_var(METRIC_EXPORT_INTERVAL_NAME, Some("2500"), || {
            let controller = basic(factory(Selector::Inexpensive, delta_temporality_selector()))
                .with_resource(Resource::empty())
                .with_collect_period(Duration::from_secs(5))
                .build();
            assert_eq!(controller.0.collect_period, Duration::from_secs(5));
        });
    }

    #[test]
    fn defaults_without_env() {
        temp_env::with_vars_unset(
            [METRIC_EXPORT_INTERVAL_NAME, METRIC_EXPORT_TIMEOUT_NAME],
            || {
                let controller =
                    basic(factory(Selector::Inexpensive, delta_temporality_selector()))
                        .with_resource(Resource::empty())
                        .build();
                assert_eq!(controller.0.collect_period, DEFAULT_COLLECT_PERIOD);
                assert_eq!(controller.0.collect_timeout, DEFAULT_COLLECT_TIMEOUT);
                assert_eq!(controller.0.push_timeout, DEFAULT_PUSH_TIMEOUT);
            },
        );
    }
}
