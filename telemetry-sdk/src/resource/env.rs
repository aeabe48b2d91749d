//! Resource detectors reading process environment variables.
use crate::resource::{Resource, ResourceDetector, SERVICE_NAME};
use std::env;
use std::time::Duration;
use telemetry::{Key, KeyValue, Value};

const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

const UNKNOWN_SERVICE: &str = "unknown_service";

/// Reads `OTEL_RESOURCE_ATTRIBUTES`, a comma separated list of `key=value`
/// pairs.
///
/// Keys and values are trimmed. Entries without `=` or with an empty key are
/// skipped, and a repeated key keeps its last value.
#[derive(Debug, Default)]
pub struct EnvResourceDetector {
    _private: (),
}

impl EnvResourceDetector {
    /// Create `EnvResourceDetector` instance.
    pub fn new() -> Self {
        EnvResourceDetector::default()
    }
}

impl ResourceDetector for EnvResourceDetector {
    fn detect(&self, _timeout: Duration) -> Resource {
        env::var(OTEL_RESOURCE_ATTRIBUTES)
            .map(|raw| parse_attributes(&raw))
            .unwrap_or_default()
    }
}

fn parse_attributes(raw: &str) -> Resource {
    Resource::new(raw.split(',').filter_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        (!key.is_empty()).then(|| KeyValue::new(key.to_owned(), value.trim().to_owned()))
    }))
}

/// Provides `service.name`, which every resource carries.
///
/// `OTEL_SERVICE_NAME` wins over a `service.name` entry in
/// `OTEL_RESOURCE_ATTRIBUTES`; with neither set the name is `unknown_service`.
#[derive(Debug)]
pub struct SdkProvidedResourceDetector;

impl ResourceDetector for SdkProvidedResourceDetector {
    fn detect(&self, timeout: Duration) -> Resource {
        Resource::new([KeyValue::new(SERVICE_NAME, service_name(timeout))])
    }
}

fn service_name(timeout: Duration) -> Value {
    if let Some(name) = env::var(OTEL_SERVICE_NAME).ok().filter(|name| !name.is_empty()) {
        return name.into();
    }

    EnvResourceDetector::new()
        .detect(timeout)
        .get(&Key::new(SERVICE_NAME))
        .unwrap_or_else(|| UNKNOWN_SERVICE.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_resource_attributes() {
        temp_env::with_var(
            OTEL_RESOURCE_ATTRIBUTES,
            Some("region=eu-west-1, host = web-3 ,tier=a,tier=b,token=YWJj==,flag,=orphan"),
            || {
                let resource = EnvResourceDetector::new().detect(Duration::ZERO);
                assert_eq!(
                    resource,
                    Resource::new([
                        KeyValue::new("region", "eu-west-1"),
                        KeyValue::new("host", "web-3"),
                        KeyValue::new("tier", "b"),
                        KeyValue::new("token", "YWJj=="),
                    ])
                );
            },
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some(" , ,"))]
    fn missing_attributes_give_empty_resource(#[case] raw: Option<&str>) {
        temp_env::with_var(OTEL_RESOURCE_ATTRIBUTES, raw, || {
            assert!(EnvResourceDetector::new()
                .detect(Duration::ZERO)
                .is_empty());
        });
    }

    #[rstest]
    #[case(None, None, UNKNOWN_SERVICE)]
    #[case(Some(""), None, UNKNOWN_SERVICE)]
    #[case(Some("checkout"), None, "checkout")]
    #[case(None, Some("service.name=billing"), "billing")]
    #[case(Some("checkout"), Some("service.name=billing"), "checkout")]
    fn service_name_precedence(
        #[case] service_name: Option<&str>,
        #[case] attributes: Option<&str>,
        #[case] expected: &'static str,
    ) {
        temp_env::with_vars(
            [
                (OTEL_SERVICE_NAME, service_name),
                (OTEL_RESOURCE_ATTRIBUTES, attributes),
            ],
            || {
                let resource = SdkProvidedResourceDetector.detect(Duration::ZERO);
                assert_eq!(
                    resource.get(&Key::new(SERVICE_NAME)),
                    Some(Value::from(expected))
                );
            },
        );
    }
}
