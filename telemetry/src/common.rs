use std::any::{type_name, Any};
use std::borrow::{Borrow, Cow};
use std::sync::Arc;
use std::{fmt, hash};

/// The key part of attribute [KeyValue] pairs.
#[non_exhaustive]
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(SharedStr);

impl Key {
    /// Create a new `Key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry::Key;
    /// use std::sync::Arc;
    ///
    /// let key1 = Key::new("my_static_str");
    /// let key2 = Key::new(String::from("my_owned_string"));
    /// let key3 = Key::new(Arc::from("my_ref_counted_str"));
    /// ```
    pub fn new(value: impl Into<Key>) -> Self {
        value.into()
    }

    /// A key usable in `const` items.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(SharedStr::Static(value))
    }

    /// Returns a reference to the underlying key name
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// String storage shared by keys and string values. Static names avoid an
/// allocation, ref-counted names are cheap to clone across label sets.
/// Equality, ordering and hashing only look at the text.
#[derive(Clone, Eq)]
enum SharedStr {
    Owned(Box<str>),
    Static(&'static str),
    RefCounted(Arc<str>),
}

impl SharedStr {
    fn as_str(&self) -> &str {
        match self {
            SharedStr::Owned(s) => s.as_ref(),
            SharedStr::Static(s) => s,
            SharedStr::RefCounted(s) => s.as_ref(),
        }
    }
}

impl From<Cow<'static, str>> for SharedStr {
    fn from(s: Cow<'static, str>) -> Self {
        match s {
            Cow::Borrowed(s) => SharedStr::Static(s),
            Cow::Owned(s) => SharedStr::Owned(s.into_boxed_str()),
        }
    }
}

impl PartialEq for SharedStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl PartialOrd for SharedStr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SharedStr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl hash::Hash for SharedStr {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

/// Conversions and formatting for the newtypes over [`SharedStr`].
macro_rules! shared_str_newtype {
    ($($name:ident),+) => {$(
        impl From<&'static str> for $name {
            fn from(s: &'static str) -> Self {
                $name(SharedStr::Static(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(SharedStr::Owned(s.into_boxed_str()))
            }
        }

        impl From<Arc<str>> for $name {
            fn from(s: Arc<str>) -> Self {
                $name(SharedStr::RefCounted(s))
            }
        }

        impl From<Cow<'static, str>> for $name {
            fn from(s: Cow<'static, str>) -> Self {
                $name(s.into())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self.0.as_str(), f)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.0.as_str())
            }
        }
    )+};
}

shared_str_newtype!(Key, StringValue);

/// A [Value::Array] containing homogeneous values.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    /// Array of bools
    Bool(Vec<bool>),
    /// Array of integers
    I64(Vec<i64>),
    /// Array of floats
    F64(Vec<f64>),
    /// Array of strings
    String(Vec<StringValue>),
}

impl fmt::Display for Array {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Array::Bool(values) => write_list(fmt, values, |f, v| write!(f, "{}", v)),
            Array::I64(values) => write_list(fmt, values, |f, v| write!(f, "{}", v)),
            Array::F64(values) => write_list(fmt, values, |f, v| write!(f, "{}", v)),
            Array::String(values) => write_list(fmt, values, |f, v| write!(f, "{:?}", v.as_str())),
        }
    }
}

fn write_list<T>(
    fmt: &mut fmt::Formatter<'_>,
    values: &[T],
    item: impl Fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    fmt.write_str("[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            fmt.write_str(",")?;
        }
        item(fmt, value)?;
    }
    fmt.write_str("]")
}

macro_rules! into_array {
    ($(($t:ty, $val:expr),)+) => {
        $(
            impl From<$t> for Array {
                fn from(t: $t) -> Self {
                    $val(t)
                }
            }
        )+
    }
}

into_array!(
    (Vec<bool>, Array::Bool),
    (Vec<i64>, Array::I64),
    (Vec<f64>, Array::F64),
    (Vec<StringValue>, Array::String),
);

/// The value part of attribute [KeyValue] pairs.
///
/// The set of kinds is closed. Values coming from code that cannot name one of
/// these kinds statically go through [`Value::from_any`], which maps anything
/// it does not recognise to [`Value::Unsupported`] instead of stringifying it.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// bool values
    Bool(bool),
    /// i64 values
    I64(i64),
    /// f64 values
    F64(f64),
    /// String values
    String(StringValue),
    /// Array of homogeneous values
    Array(Array),
    /// A value whose type is outside the supported set, tagged with the
    /// originating type name.
    Unsupported(&'static str),
}

/// Wrapper for string-like values
#[non_exhaustive]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StringValue(SharedStr);

impl StringValue {
    /// Returns a string slice to this value
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<StringValue> for String {
    fn from(s: StringValue) -> Self {
        s.0.as_str().to_owned()
    }
}

impl Value {
    /// Converts a value of an arbitrary type into the closed set of supported
    /// kinds.
    ///
    /// Integers narrower than 64 bits widen to [`Value::I64`], `f32` widens to
    /// [`Value::F64`], and owned or static strings become [`Value::String`].
    /// Every other type, including `u64` which does not fit `i64` losslessly,
    /// becomes [`Value::Unsupported`].
    ///
    /// # Examples
    ///
    /// ```
    /// use telemetry::Value;
    ///
    /// assert_eq!(Value::from_any(&7i32), Value::I64(7));
    /// assert!(matches!(Value::from_any(&()), Value::Unsupported(_)));
    /// ```
    pub fn from_any<T: Any>(value: &T) -> Value {
        let any = value as &dyn Any;
        if let Some(v) = any.downcast_ref::<Value>() {
            v.clone()
        } else if let Some(v) = any.downcast_ref::<bool>() {
            Value::Bool(*v)
        } else if let Some(v) = any.downcast_ref::<i64>() {
            Value::I64(*v)
        } else if let Some(v) = any.downcast_ref::<i32>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<i16>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<i8>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<u32>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<u16>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<u8>() {
            Value::I64(i64::from(*v))
        } else if let Some(v) = any.downcast_ref::<f64>() {
            Value::F64(*v)
        } else if let Some(v) = any.downcast_ref::<f32>() {
            Value::F64(f64::from(*v))
        } else if let Some(v) = any.downcast_ref::<&'static str>() {
            Value::String((*v).into())
        } else if let Some(v) = any.downcast_ref::<String>() {
            Value::String(v.clone().into())
        } else if let Some(v) = any.downcast_ref::<StringValue>() {
            Value::String(v.clone())
        } else if let Some(v) = any.downcast_ref::<Array>() {
            Value::Array(v.clone())
        } else if let Some(v) = any.downcast_ref::<Vec<bool>>() {
            Value::Array(Array::Bool(v.clone()))
        } else if let Some(v) = any.downcast_ref::<Vec<i64>>() {
            Value::Array(Array::I64(v.clone()))
        } else if let Some(v) = any.downcast_ref::<Vec<f64>>() {
            Value::Array(Array::F64(v.clone()))
        } else {
            Value::Unsupported(type_name::<T>())
        }
    }

    /// String representation of the `Value`
    ///
    /// This will allocate iff the underlying value is not a `String`.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::Bool(v) => format!("{}", v).into(),
            Value::I64(v) => format!("{}", v).into(),
            Value::F64(v) => format!("{}", v).into(),
            Value::String(v) => Cow::Borrowed(v.as_str()),
            Value::Array(v) => format!("{}", v).into(),
            Value::Unsupported(type_name) => format!("<unsupported {}>", type_name).into(),
        }
    }

    /// Static name of this value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(Array::Bool(_)) => "bool[]",
            Value::Array(Array::I64(_)) => "i64[]",
            Value::Array(Array::F64(_)) => "f64[]",
            Value::Array(Array::String(_)) => "string[]",
            Value::Unsupported(_) => "unsupported",
        }
    }
}

macro_rules! from_values {
   (
        $(
            ($t:ty, $val:expr);
        )+
    ) => {
        $(
            impl From<$t> for Value {
                fn from(t: $t) -> Self {
                    $val(t)
                }
            }
        )+
    }
}

from_values!(
    (bool, Value::Bool);
    (i64, Value::I64);
    (f64, Value::F64);
    (StringValue, Value::String);
    (Array, Value::Array);
);

macro_rules! string_into_value {
    ($($t:ty),+) => {$(
        impl From<$t> for Value {
            fn from(s: $t) -> Self {
                Value::String(s.into())
            }
        }
    )+};
}

string_into_value!(&'static str, String, Arc<str>, Cow<'static, str>);

impl fmt::Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => v.fmt(fmt),
            Value::I64(v) => v.fmt(fmt),
            Value::F64(v) => v.fmt(fmt),
            Value::String(v) => fmt.write_str(v.as_str()),
            Value::Array(v) => v.fmt(fmt),
            Value::Unsupported(type_name) => write!(fmt, "<unsupported {}>", type_name),
        }
    }
}

/// A key-value pair describing an attribute.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct KeyValue {
    /// The attribute name
    pub key: Key,

    /// The attribute value
    pub value: Value,
}

impl KeyValue {
    /// Create a new `KeyValue` pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_any_maps_supported_kinds() {
        assert_eq!(Value::from_any(&true), Value::Bool(true));
        assert_eq!(Value::from_any(&-3i64), Value::I64(-3));
        assert_eq!(Value::from_any(&9u16), Value::I64(9));
        assert_eq!(Value::from_any(&1.5f32), Value::F64(1.5));
        assert_eq!(Value::from_any(&"abc"), Value::from("abc"));
        assert_eq!(
            Value::from_any(&String::from("owned")),
            Value::String("owned".into())
        );
        assert_eq!(
            Value::from_any(&vec![1i64, 2]),
            Value::Array(Array::I64(vec![1, 2]))
        );
    }

    #[test]
    fn from_any_falls_back_to_unsupported() {
        struct Opaque;
        match Value::from_any(&Opaque) {
            Value::Unsupported(name) => assert!(name.ends_with("Opaque")),
            other => panic!("expected unsupported value, got {:?}", other),
        }
        // u64 does not fit i64 without loss, so it is not silently narrowed.
        assert!(matches!(Value::from_any(&u64::MAX), Value::Unsupported("u64")));
        assert_eq!(
            Value::from_any(&()).as_str(),
            Cow::<str>::Owned("<unsupported ()>".to_string())
        );
    }

    #[test]
    fn kind_names_are_distinct_per_kind() {
        let values = [
            Value::Bool(true),
            Value::I64(1),
            Value::F64(1.0),
            Value::from("1"),
            Value::Array(Array::I64(vec![1])),
            Value::Unsupported("x"),
        ];
        let mut names: Vec<_> = values.iter().map(Value::kind_name).collect();
        names.dedup();
        assert_eq!(names.len(), values.len());
    }
}
