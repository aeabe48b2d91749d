//! Canonical label sets
//!
//! A [`LabelSet`] is the dimensional coordinate of a measurement. It is built
//! from an unordered list of [`KeyValue`]s, keeps only the last value provided
//! for each key and iterates in key order. Equality and hashing are defined by
//! the set's canonical encoding, so two sets with the same effective pairs are
//! interchangeable as map keys no matter how they were built.
use crate::{Key, KeyValue, Value};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::iter::Peekable;
use std::sync::Arc;
use std::{fmt, slice};

mod encoder;
pub use encoder::{canonical_encoding, default_encoder, DefaultLabelEncoder, Encoder};

static EMPTY_SET: Lazy<Arc<InternalLabelSet>> =
    Lazy::new(|| Arc::new(InternalLabelSet::new(Vec::new())));

struct InternalLabelSet {
    key_values: Vec<KeyValue>,
    encoded: String,
    hash: u64,
}

impl InternalLabelSet {
    /// `key_values` must already be free of duplicate keys.
    fn new(mut key_values: Vec<KeyValue>) -> Self {
        key_values.sort_by(|a, b| a.key.cmp(&b.key));
        let encoded = canonical_encoding(&mut key_values.iter());
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);

        InternalLabelSet {
            key_values,
            encoded,
            hash: hasher.finish(),
        }
    }
}

/// A canonical, de-duplicated and key-sorted set of labels.
///
/// Cloning is cheap, the pairs are shared.
///
/// # Examples
///
/// ```
/// use telemetry::{labels::LabelSet, KeyValue};
///
/// let a = LabelSet::from_key_values(vec![
///     KeyValue::new("route", "/a"),
///     KeyValue::new("method", "GET"),
///     KeyValue::new("route", "/b"),
/// ]);
/// let b = LabelSet::from(&[KeyValue::new("method", "GET"), KeyValue::new("route", "/b")]);
///
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 2);
/// ```
#[derive(Clone)]
pub struct LabelSet(Arc<InternalLabelSet>);

impl LabelSet {
    /// Build a set from key value pairs. When a key repeats, the last value
    /// provided for it is kept.
    pub fn from_key_values<I: IntoIterator<Item = KeyValue>>(iter: I) -> Self {
        let key_values: Vec<KeyValue> = iter.into_iter().collect();
        if key_values.is_empty() {
            return LabelSet::default();
        }

        let mut seen_keys = HashSet::with_capacity(key_values.len());
        let mut distinct = key_values
            .into_iter()
            .rev()
            .filter(|kv| seen_keys.insert(kv.key.clone()))
            .collect::<Vec<_>>();
        distinct.reverse();

        LabelSet(Arc::new(InternalLabelSet::new(distinct)))
    }

    /// The number of distinct keys in the set.
    pub fn len(&self) -> usize {
        self.0.key_values.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.key_values.is_empty()
    }

    /// Iterate over the labels in key order.
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// The value stored for `key`, if any.
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.0
            .key_values
            .binary_search_by(|kv| kv.key.cmp(key))
            .ok()
            .map(|idx| &self.0.key_values[idx].value)
    }

    /// The canonical, type-tagged encoding of this set.
    ///
    /// This is the identity of the set: it is what equality and hashing are
    /// computed from.
    pub fn encoded(&self) -> &str {
        &self.0.encoded
    }

    /// Encode the set with a presentation encoder, e.g. for exporters.
    pub fn encoded_with(&self, encoder: &dyn Encoder) -> String {
        if self.is_empty() {
            return String::new();
        }
        encoder.encode(&mut self.iter())
    }

    /// A new set holding only the labels accepted by `predicate`.
    pub fn filter<F>(&self, predicate: F) -> LabelSet
    where
        F: Fn(&KeyValue) -> bool,
    {
        if self.0.key_values.iter().all(&predicate) {
            return self.clone();
        }

        let key_values = self
            .0
            .key_values
            .iter()
            .filter(|kv| predicate(kv))
            .cloned()
            .collect::<Vec<_>>();
        if key_values.is_empty() {
            return LabelSet::default();
        }

        LabelSet(Arc::new(InternalLabelSet::new(key_values)))
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        LabelSet(EMPTY_SET.clone())
    }
}

impl<T> From<T> for LabelSet
where
    T: AsRef<[KeyValue]>,
{
    fn from(kvs: T) -> Self {
        LabelSet::from_key_values(kvs.as_ref().iter().cloned())
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash && self.0.encoded == other.0.encoded)
    }
}

impl Eq for LabelSet {}

impl Hash for LabelSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash)
    }
}

impl fmt::Debug for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|kv| (&kv.key, &kv.value)))
            .finish()
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a KeyValue;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Iter(self.0.key_values.iter())
    }
}

/// An iterator over the entries of a [`LabelSet`].
#[derive(Debug)]
pub struct Iter<'a>(slice::Iter<'a, KeyValue>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a KeyValue;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Merge two key-sorted iterators into one key-sorted iterator.
///
/// When both sides hold the same key, the entry from `a` is yielded and the
/// one from `b` is skipped.
pub fn merge_iters<'a, A, B>(a: A, b: B) -> MergeIter<'a, A, B>
where
    A: Iterator<Item = &'a KeyValue>,
    B: Iterator<Item = &'a KeyValue>,
{
    MergeIter {
        a: a.peekable(),
        b: b.peekable(),
    }
}

/// Iterator returned by [`merge_iters`].
#[derive(Debug)]
pub struct MergeIter<'a, A, B>
where
    A: Iterator<Item = &'a KeyValue>,
    B: Iterator<Item = &'a KeyValue>,
{
    a: Peekable<A>,
    b: Peekable<B>,
}

impl<'a, A, B> Iterator for MergeIter<'a, A, B>
where
    A: Iterator<Item = &'a KeyValue>,
    B: Iterator<Item = &'a KeyValue>,
{
    type Item = &'a KeyValue;

    fn next(&mut self) -> Option<Self::Item> {
        let which = match (self.a.peek(), self.b.peek()) {
            (Some(a), Some(b)) => a.key.cmp(&b.key),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => return None,
        };

        match which {
            Ordering::Less => self.a.next(),
            Ordering::Equal => {
                self.b.next();
                self.a.next()
            }
            Ordering::Greater => self.b.next(),
        }
    }
}
