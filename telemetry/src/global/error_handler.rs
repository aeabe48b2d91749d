use std::sync::PoisonError;
use std::sync::RwLock;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsError;
use once_cell::sync::Lazy;

/// The global error handler.
static GLOBAL_ERROR_HANDLER: Lazy<RwLock<Option<ErrorHandler>>> = Lazy::new(|| RwLock::new(None));

/// Errors reported through the global error handler.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[error(transparent)]
    /// An issue raised by the metrics pipeline.
    Metric(#[from] MetricsError),

    #[error("{0}")]
    /// Other types of failures not covered by the variants above.
    Other(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Other(err.to_string())
    }
}

struct ErrorHandler(Box<dyn Fn(Error) + Send + Sync>);

/// Handle error using the globally configured error handler.
///
/// Writes to stderr if unset.
pub fn handle_error<T: Into<Error>>(err: T) {
    if let Ok(handler) = GLOBAL_ERROR_HANDLER.read() {
        if let Some(handler) = handler.as_ref() {
            (handler.0)(err.into());
            return;
        }
    }

    match err.into() {
        #[cfg(feature = "metrics")]
        Error::Metric(err) => eprintln!("telemetry metrics error occurred. {}", err),
        Error::Other(err_msg) => eprintln!("telemetry error occurred. {}", err_msg),
    }
}

/// Set global error handler.
pub fn set_error_handler<F>(f: F) -> std::result::Result<(), Error>
where
    F: Fn(Error) + Send + Sync + 'static,
{
    GLOBAL_ERROR_HANDLER
        .write()
        .map(|mut handler| *handler = Some(ErrorHandler(Box::new(f))))
        .map_err(Into::into)
}

/// Remove the global error handler, returning to the stderr fallback.
pub fn reset_error_handler() {
    if let Ok(mut handler) = GLOBAL_ERROR_HANDLER.write() {
        *handler = None;
    }
}
