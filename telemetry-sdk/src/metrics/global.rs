//! The optional process-wide meter provider.
//!
//! Applications that prefer not to pass a provider around can install one
//! here once at startup. Until one is installed, and again after
//! [`shutdown_meter_provider`], [`meter`] hands out no-op meters.
use crate::metrics::{Meter, MeterProvider};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use telemetry::{otel_error, otel_info};

type GlobalMeterProvider = Arc<dyn MeterProvider + Send + Sync>;

/// The global `MeterProvider` singleton.
static GLOBAL_METER_PROVIDER: Lazy<RwLock<Option<GlobalMeterProvider>>> =
    Lazy::new(|| RwLock::new(None));

/// Sets the given [`MeterProvider`] instance as the current global meter
/// provider, returning the one it replaces.
///
/// Libraries should NOT call this function. It is intended for
/// applications/executables.
pub fn set_meter_provider<P>(new_provider: P) -> Option<GlobalMeterProvider>
where
    P: MeterProvider + Send + Sync + 'static,
{
    match GLOBAL_METER_PROVIDER.write() {
        Ok(mut provider) => {
            otel_info!(name: "MeterProvider.GlobalSet");
            provider.replace(Arc::new(new_provider))
        }
        Err(err) => {
            otel_error!(
                name: "MeterProvider.GlobalSetFailed",
                error = format!("{}", err)
            );
            None
        }
    }
}

/// Returns the currently configured global [`MeterProvider`], if any.
pub fn meter_provider() -> Option<GlobalMeterProvider> {
    GLOBAL_METER_PROVIDER
        .read()
        .map(|provider| provider.clone())
        .unwrap_or_else(|err| {
            otel_error!(
                name: "MeterProvider.GlobalGetFailed",
                error = format!("{}", err)
            );
            None
        })
}

/// Creates a named [`Meter`] via the currently configured global
/// [`MeterProvider`], or a no-op meter when none is installed.
///
/// Meters keep recording into the provider that created them, even after
/// the global provider is replaced.
pub fn meter(name: &'static str) -> Meter {
    meter_provider()
        .map(|provider| provider.meter(name))
        .unwrap_or_else(Meter::noop)
}

/// Removes the global meter provider, returning it so the caller can stop
/// or flush it.
pub fn shutdown_meter_provider() -> Option<GlobalMeterProvider> {
    GLOBAL_METER_PROVIDER
        .write()
        .map(|mut provider| provider.take())
        .unwrap_or(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::metrics::aggregation::delta_temporality_selector;
    use crate::metrics::controllers::basic;
    use crate::metrics::processors::factory;
    use crate::metrics::selectors::simple::Selector;
    use crate::Resource;
    use telemetry::Context;

    // One test, as the provider is process-wide.
    #[test]
    fn install_use_and_reset() {
        assert!(shutdown_meter_provider().is_none());
        meter("before").u64_counter("ignored").init().add(1, &[]);

        let controller = basic(factory(Selector::Inexpensive, delta_temporality_selector()))
            .with_resource(Resource::empty())
            .build();
        assert!(set_meter_provider(controller.clone()).is_none());
        assert!(meter_provider().is_some());

        meter("app").u64_counter("requests").init().add(2, &[]);
        assert_eq!(controller.collect(&Context::new()).unwrap().len(), 1);

        assert!(shutdown_meter_provider().is_some());
        assert!(meter_provider().is_none());
        assert!(format!("{:?}", meter("after")).contains("noop: true"));
    }
}
