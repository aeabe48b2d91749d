//! Process-wide hooks.
//!
//! The pipeline never panics on bad input or failed callbacks. Failures that
//! cannot be returned to a caller, such as a dropped measurement or a failed
//! background export, are routed to a single error handler installed with
//! [`set_error_handler`]. Without a handler they are written to stderr.
//!
//! The internal logging macros ([`otel_debug!`](crate::otel_debug),
//! [`otel_info!`](crate::otel_info), [`otel_warn!`](crate::otel_warn) and
//! [`otel_error!`](crate::otel_error)) also live here.

mod error_handler;
mod internal_logging;

pub use error_handler::{handle_error, reset_error_handler, set_error_handler, Error};
