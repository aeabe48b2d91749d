//! Representations of entities producing telemetry.
//!
//! A [Resource] is an immutable representation of the entity producing
//! telemetry as attributes. For example, a process producing telemetry that is
//! running in a container has a host name, a service name and possibly a
//! deployment environment. All of these can be included in the `Resource`,
//! which is then attached to every exported record.
//!
//! # Resource detectors
//!
//! [`ResourceDetector`]s are used to detect resource from runtime or
//! environmental variables. The following are provided by default with this
//! SDK.
//!
//! - [`EnvResourceDetector`] - detect resource from environmental variables.
//! - [`SdkProvidedResourceDetector`] - the service name, with a default.
//! - [`TelemetryResourceDetector`] - detect telemetry SDK's information.
mod env;
mod sdk_info;

pub use env::{EnvResourceDetector, SdkProvidedResourceDetector};
pub use sdk_info::TelemetryResourceDetector;

use std::time::Duration;
use telemetry::labels::{self, Encoder, LabelSet};
use telemetry::{Key, KeyValue, Value};

/// The attribute key naming the logical service.
pub const SERVICE_NAME: &str = "service.name";

/// An immutable representation of the entity producing telemetry as attributes.
///
/// Clones share the same attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resource {
    attrs: LabelSet,
}

impl Resource {
    /// Create a new `Resource` from key value pairs.
    ///
    /// Values are de-duplicated by key, and the last key-value pair will be retained
    pub fn new<T: IntoIterator<Item = KeyValue>>(kvs: T) -> Self {
        Resource {
            attrs: LabelSet::from_key_values(kvs),
        }
    }

    /// Creates an empty resource.
    pub fn empty() -> Self {
        Resource::default()
    }

    /// Create a new `Resource` from resource detectors.
    ///
    /// Later detectors take precedence over earlier ones.
    pub fn from_detectors(timeout: Duration, detectors: Vec<Box<dyn ResourceDetector>>) -> Self {
        detectors
            .into_iter()
            .fold(Resource::empty(), |resource, detector| {
                resource.merge(&detector.detect(timeout))
            })
    }

    /// The resource detected from the process environment and SDK
    /// information, used when no resource is configured.
    ///
    /// The service name is applied last, so `OTEL_SERVICE_NAME` wins over a
    /// `service.name` entry in `OTEL_RESOURCE_ATTRIBUTES`.
    pub fn from_environment() -> Self {
        Resource::from_detectors(
            Duration::from_secs(0),
            vec![
                Box::new(TelemetryResourceDetector),
                Box::new(EnvResourceDetector::new()),
                Box::new(SdkProvidedResourceDetector),
            ],
        )
    }

    /// Create a new `Resource` by combining two resources.
    ///
    /// Keys from the `other` resource have priority over keys from this resource, even if the
    /// updated value is empty.
    pub fn merge(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        Resource::new(self.attrs.iter().chain(other.attrs.iter()).cloned())
    }

    /// Returns the number of attributes for this resource
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns `true` if the resource contains no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Gets an iterator over the attributes of this resource, sorted by key.
    pub fn iter(&self) -> labels::Iter<'_> {
        self.attrs.iter()
    }

    /// Retrieve the value from resource associate with given key.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.attrs.get(key).cloned()
    }

    /// Encoded attributes
    pub fn encoded(&self, encoder: &dyn Encoder) -> String {
        self.attrs.encoded_with(encoder)
    }

    /// The canonical identity of this resource, see [`LabelSet::encoded`].
    pub(crate) fn identity(&self) -> &str {
        self.attrs.encoded()
    }
}

impl<'a> IntoIterator for &'a Resource {
    type Item = &'a KeyValue;
    type IntoIter = labels::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.iter()
    }
}

/// ResourceDetector detects resource information
///
/// Implementations of this trait can be passed to [`Resource::from_detectors`]
/// to generate a Resource from the merged information.
pub trait ResourceDetector {
    /// detect returns an initialized Resource based on gathered information.
    ///
    /// timeout is used in case the detection operation takes too much time.
    ///
    /// If source information to construct a Resource is inaccessible, an empty Resource should be returned
    ///
    /// If source information to construct a Resource is invalid, for example,
    /// missing required values. an empty Resource should be returned.
    fn detect(&self, timeout: Duration) -> Resource;
}
