use crate::resource::{Resource, ResourceDetector};
use std::time::Duration;
use telemetry::KeyValue;

/// Detect the telemetry SDK information used to capture data recorded by the instrumentation libraries.
///
/// It provides:
/// - The name of the telemetry SDK(`telemetry.sdk.name`).
/// - The language of the telemetry SDK(`telemetry.sdk.language`). It will be `rust` for this SDK.
/// - The version of the telemetry SDK(`telemetry.sdk.version`). It will be current `telemetry_sdk` crate version.
#[derive(Debug)]
pub struct TelemetryResourceDetector;

impl ResourceDetector for TelemetryResourceDetector {
    fn detect(&self, _timeout: Duration) -> Resource {
        Resource::new(vec![
            KeyValue::new("telemetry.sdk.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("telemetry.sdk.language", "rust"),
            KeyValue::new("telemetry.sdk.version", env!("CARGO_PKG_VERSION")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry::{Key, Value};

    #[test]
    fn reports_sdk_identity() {
        let resource = TelemetryResourceDetector.detect(Duration::from_secs(0));
        assert_eq!(resource.len(), 3);
        assert_eq!(
            resource.get(&Key::new("telemetry.sdk.language")),
            Some(Value::from("rust"))
        );
    }
}
