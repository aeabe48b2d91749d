//! Metrics error types shared by the pipeline and exporters.
use std::borrow::Cow;
use std::result;
use std::sync::PoisonError;
use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type Result<T> = result::Result<T, MetricsError>;

/// Errors returned by the metrics pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricsError {
    /// Other errors not covered by specific cases.
    #[error("Metrics error: {0}")]
    Other(String),
    /// Invalid configuration
    #[error("Config error {0}")]
    Config(String),
    /// Fail to export metrics
    #[error("Metrics exporter {name} failed with {0}", name = .0.exporter_name())]
    ExportErr(Box<dyn ExportError>),
    /// An internal invariant was broken, e.g. a collection finished without
    /// having started.
    #[error("inconsistent processor state")]
    InconsistentState,
    /// The aggregator holds no data for this cycle.
    #[error("no data collected by this aggregator")]
    NoDataCollected,
    /// A NaN measurement was rejected.
    #[error("NaN value is an invalid input")]
    NaNInput,
    /// A negative measurement was rejected by a monotonic instrument.
    #[error("negative value is out of range for this instrument")]
    NegativeInput,
    /// Two aggregators of different kinds were combined.
    #[error("inconsistent aggregator types: {0}")]
    InconsistentAggregator(String),
    /// A measurement's number kind disagrees with its instrument.
    #[error("instrument {name} expects {expected} measurements, got {actual}")]
    NumberKindMismatch {
        /// Instrument name
        name: String,
        /// Number kind declared by the instrument
        expected: &'static str,
        /// Number kind of the rejected measurement
        actual: &'static str,
    },
    /// An observation was reported for an instrument the callback was not
    /// registered for.
    #[error("observation for unregistered instrument {0}")]
    UnregisteredInstrument(String),
    /// The caller's context was cancelled before the collection finished.
    #[error("collection cancelled")]
    Cancelled,
    /// An observer callback returned an error or panicked.
    #[error("observer callback failed: {0}")]
    ObserverCallback(Cow<'static, str>),
    /// The collection finished, but some observer callbacks failed. The
    /// series that were collected are still valid.
    #[error("collected {checkpointed} records, {} observer callback(s) failed", .errors.len())]
    PartialCollection {
        /// Number of records handed to the processor.
        checkpointed: usize,
        /// The callback failures.
        errors: Vec<MetricsError>,
    },
}

impl<T: ExportError> From<T> for MetricsError {
    fn from(err: T) -> Self {
        MetricsError::ExportErr(Box::new(err))
    }
}

impl<T> From<PoisonError<T>> for MetricsError {
    fn from(err: PoisonError<T>) -> Self {
        MetricsError::Other(err.to_string())
    }
}

/// Marker trait for errors returned by exporters
pub trait ExportError: std::error::Error + Send + Sync + 'static {
    /// The name of exporter that returned this error
    fn exporter_name(&self) -> &'static str;
}

/// Units denote underlying data units tracked by instruments.
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash)]
pub struct Unit(Cow<'static, str>);

impl Unit {
    /// Create a new `Unit` from an `Into<String>`
    pub fn new<S>(value: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Unit(value.into())
    }

    /// View unit as &str
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for Unit {
    #[inline]
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct TransportError;

    impl ExportError for TransportError {
        fn exporter_name(&self) -> &'static str {
            "test"
        }
    }

    #[test]
    fn export_errors_name_their_exporter() {
        let err: MetricsError = TransportError.into();
        assert_eq!(
            err.to_string(),
            "Metrics exporter test failed with connection refused"
        );
    }

    #[test]
    fn partial_collection_counts_failures() {
        let err = MetricsError::PartialCollection {
            checkpointed: 4,
            errors: vec![
                MetricsError::ObserverCallback("a".into()),
                MetricsError::Cancelled,
            ],
        };
        assert_eq!(
            err.to_string(),
            "collected 4 records, 2 observer callback(s) failed"
        );
    }
}
