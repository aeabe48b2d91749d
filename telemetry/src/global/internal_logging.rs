#![allow(unused_macros)]
//! Internal logging for the pipeline itself.
//!
//! These macros are meant for the pipeline, exporters and other plugins, not
//! for application logging. With the `internal-logs` feature of the calling
//! crate they forward to `tracing`, with that crate's name as target. Under
//! `cfg(test)` they also print to stdout, which is visible with `--nocapture`.
//!
//! Each takes a `name` describing the event and optional `key = value`
//! attributes. Attribute values must implement both `tracing::Value` and
//! `Display`; pass errors as `format!("{}", err)`.

#[doc(hidden)]
#[macro_export]
macro_rules! __telemetry_log {
    ($level:ident, $name:expr $(, $key:ident = $value:expr)*) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::$level!(
                name: $name,
                target: env!("CARGO_PKG_NAME"),
                name = $name
                $(, $key = $value)*
            );
        }

        #[cfg(test)]
        {
            let line = [
                format!("otel_{}: name={}", stringify!($level), $name)
                $(, format!(", {}={}", stringify!($key), $value))*
            ]
            .concat();
            println!("{}", line);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name $(, $value)*);
        }
    }};
}

/// Logs a debug event, for detail that is only useful while troubleshooting.
///
/// # Example:
/// ```rust
/// use telemetry::otel_debug;
/// otel_debug!(name: "collection_finished", records = 3);
/// ```
#[macro_export]
macro_rules! otel_debug {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__telemetry_log!(debug, $name $(, $key = $value)*)
    };
}

/// Logs an informational event, such as a background thread starting.
///
/// # Example:
/// ```rust
/// use telemetry::otel_info;
/// otel_info!(name: "collector_started", interval_ms = 60000);
/// ```
#[macro_export]
macro_rules! otel_info {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__telemetry_log!(info, $name $(, $key = $value)*)
    };
}

/// Logs a warning, for data that was dropped or configuration that was
/// ignored.
///
/// # Example:
/// ```rust
/// use telemetry::otel_warn;
/// otel_warn!(name: "measurement_dropped", reason = "number kind mismatch");
/// ```
#[macro_export]
macro_rules! otel_warn {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__telemetry_log!(warn, $name $(, $key = $value)*)
    };
}

/// Logs an error the pipeline could not recover from.
///
/// # Example:
/// ```rust
/// use telemetry::otel_error;
/// otel_error!(name: "export_failed", error = "connection refused");
/// ```
#[macro_export]
macro_rules! otel_error {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::__telemetry_log!(error, $name $(, $key = $value)*)
    };
}
