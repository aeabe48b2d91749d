//! Stdout Metrics Exporter
use crate::{
    export::metrics::{CheckpointSet, MetricsExporter},
    Resource,
};
use std::fmt;
use std::io;
use std::sync::Mutex;
use std::time::SystemTime;
use telemetry::{
    labels::{default_encoder, merge_iters, Encoder, LabelSet},
    metrics::{MetricsError, Result},
    Context,
};

/// Create a new stdout exporter builder with the configuration for a stdout exporter.
pub fn stdout() -> StdoutExporterBuilder<io::Stdout> {
    StdoutExporterBuilder::<io::Stdout>::builder()
}

/// A metric exporter that writes one line per record to the local STDOUT or
/// via the registered implementation of `Write`.
#[derive(Debug)]
pub struct StdoutExporter<W> {
    /// Writer is the destination. If not set, `Stdout` is used.
    writer: Mutex<W>,

    /// Specifies if timestamps should be printed
    timestamps: bool,

    /// Encodes the labels.
    label_encoder: Box<dyn Encoder + Send + Sync>,

    /// An optional user-defined function to format a given export batch.
    formatter: Option<Formatter>,
}

/// Individually exported metric
///
/// Can be formatted using [`StdoutExporterBuilder::with_formatter`].
#[derive(Default, Debug)]
pub struct ExportLine {
    /// metric name, with the encoded resource and labels
    pub name: String,

    /// populated by sum, min/max/sum/count and histogram aggregators
    pub sum: Option<ExportNumeric>,

    /// populated by min/max/sum/count and histogram aggregators
    pub count: Option<u64>,

    /// populated by the min/max/sum/count aggregator
    pub min: Option<ExportNumeric>,

    /// populated by the min/max/sum/count aggregator
    pub max: Option<ExportNumeric>,

    /// populated by the histogram aggregator
    pub buckets: Option<Vec<u64>>,

    /// populated by the last value aggregator
    pub last_value: Option<ExportNumeric>,

    /// metric timestamp
    pub timestamp: Option<SystemTime>,
}

/// A number exported as debug for serialization
pub struct ExportNumeric(Box<dyn fmt::Debug>);

impl fmt::Debug for ExportNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<W> MetricsExporter for StdoutExporter<W>
where
    W: fmt::Debug + io::Write,
{
    fn export(&self, _cx: &Context, res: &Resource, checkpoint_set: &CheckpointSet) -> Result<()> {
        let mut batch = Vec::with_capacity(checkpoint_set.len());
        checkpoint_set.try_for_each(&mut |record| {
            let desc = record.descriptor();
            let agg = record.aggregator();
            let kind = desc.number_kind();

            let mut expose = ExportLine::default();
            if let Some(last_value) = agg.as_last_value() {
                let (value, timestamp) = last_value.last_value()?;
                expose.last_value = Some(ExportNumeric(value.to_debug(kind)));
                if self.timestamps {
                    expose.timestamp = Some(timestamp);
                }
            }
            if let Some(sum) = agg.as_sum() {
                expose.sum = Some(ExportNumeric(sum.sum()?.to_debug(kind)));
            }
            if let Some(count) = agg.as_count() {
                expose.count = Some(count.count()?);
            }
            if let Some(min_max) = agg.as_min_max() {
                if min_max.count()? > 0 {
                    expose.min = Some(ExportNumeric(min_max.min()?.to_debug(kind)));
                    expose.max = Some(ExportNumeric(min_max.max()?.to_debug(kind)));
                }
            }
            if let Some(histogram) = agg.as_histogram() {
                expose.buckets = Some(histogram.histogram()?.counts().to_vec());
            }

            // Record labels win over resource attributes with the same key.
            let combined = LabelSet::from_key_values(
                merge_iters(record.labels().iter(), record.resource().merge(res).iter()).cloned(),
            );
            let encoded = combined.encoded_with(self.label_encoder.as_ref());

            let mut sb = String::new();
            sb.push_str(desc.name());
            if !encoded.is_empty() {
                sb.push('{');
                sb.push_str(&encoded);
                sb.push('}');
            }
            expose.name = sb;

            batch.push(expose);
            Ok(())
        })?;

        let formatted = match &self.formatter {
            Some(formatter) => formatter.0(batch)?,
            None => batch
                .iter()
                .map(|line| format!("{:?}\n", line))
                .collect::<String>(),
        };
        let mut writer = self.writer.lock()?;
        writer
            .write_all(formatted.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| MetricsError::Other(e.to_string()))
    }
}

/// A formatter for user-defined batch serialization.
struct Formatter(Box<dyn Fn(Vec<ExportLine>) -> Result<String> + Send + Sync>);
impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formatter(closure)")
    }
}

/// Configuration for a given stdout exporter.
#[derive(Debug)]
pub struct StdoutExporterBuilder<W> {
    writer: Mutex<W>,
    timestamps: bool,
    label_encoder: Option<Box<dyn Encoder + Send + Sync>>,
    formatter: Option<Formatter>,
}

impl<W> StdoutExporterBuilder<W>
where
    W: io::Write + fmt::Debug + Send + Sync + 'static,
{
    fn builder() -> StdoutExporterBuilder<io::Stdout> {
        StdoutExporterBuilder {
            writer: Mutex::new(io::stdout()),
            timestamps: true,
            label_encoder: None,
            formatter: None,
        }
    }

    /// Set the writer that this exporter will use.
    pub fn with_writer<W2: io::Write>(self, writer: W2) -> StdoutExporterBuilder<W2> {
        StdoutExporterBuilder {
            writer: Mutex::new(writer),
            timestamps: self.timestamps,
            label_encoder: self.label_encoder,
            formatter: self.formatter,
        }
    }

    /// Hide the timestamps from exported results
    pub fn with_do_not_print_time(self, do_not_print_time: bool) -> Self {
        StdoutExporterBuilder {
            timestamps: !do_not_print_time,
            ..self
        }
    }

    /// Set the label encoder that this exporter will use.
    pub fn with_label_encoder<E>(self, label_encoder: E) -> Self
    where
        E: Encoder + Send + Sync + 'static,
    {
        StdoutExporterBuilder {
            label_encoder: Some(Box::new(label_encoder)),
            ..self
        }
    }

    /// Set a formatter for serializing export batch data
    pub fn with_formatter<T>(self, formatter: T) -> Self
    where
        T: Fn(Vec<ExportLine>) -> Result<String> + Send + Sync + 'static,
    {
        StdoutExporterBuilder {
            formatter: Some(Formatter(Box::new(formatter))),
            ..self
        }
    }

    /// Build a new stdout exporter.
    pub fn build(self) -> Result<StdoutExporter<W>> {
        Ok(StdoutExporter {
            writer: self.writer,
            timestamps: self.timestamps,
            label_encoder: self.label_encoder.unwrap_or_else(default_encoder),
            formatter: self.formatter,
        })
    }
}
