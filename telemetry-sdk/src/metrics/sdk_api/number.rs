use std::cmp;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number represents either an integral or a floating point value. It
/// needs to be accompanied with a source of [`NumberKind`] that describes
/// the actual type of the value stored within Number.
///
/// The bits are never converted between kinds: an `I64` number read as `F64`
/// is meaningless, which is why every operation takes the kind explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Number(u64);

impl Number {
    /// Create an atomic version of the current number
    pub fn to_atomic(self) -> AtomicNumber {
        AtomicNumber(AtomicU64::new(self.0))
    }

    /// Compares this number to the given other number. Both should be of the same kind.
    pub fn partial_cmp(&self, number_kind: &NumberKind, other: &Number) -> Option<cmp::Ordering> {
        match number_kind {
            NumberKind::I64 => (self.0 as i64).partial_cmp(&(other.0 as i64)),
            NumberKind::F64 => {
                let current = u64_to_f64(self.0);
                let other = u64_to_f64(other.0);
                current.partial_cmp(&other)
            }
            NumberKind::U64 => self.0.partial_cmp(&other.0),
        }
    }

    /// Checks if this value is an f64 nan value. Do not use on non-f64 values.
    pub fn is_nan(&self) -> bool {
        u64_to_f64(self.0).is_nan()
    }

    /// `true` if the actual value is less than zero.
    pub fn is_negative(&self, number_kind: &NumberKind) -> bool {
        match number_kind {
            NumberKind::I64 => (self.0 as i64).is_negative(),
            NumberKind::F64 => u64_to_f64(self.0).is_sign_negative() && u64_to_f64(self.0) != 0.0,
            NumberKind::U64 => false,
        }
    }

    /// The sum of two numbers of the same kind. Integers saturate.
    pub fn add(&self, number_kind: &NumberKind, other: &Number) -> Number {
        match number_kind {
            NumberKind::I64 => Number::from((self.0 as i64).saturating_add(other.0 as i64)),
            NumberKind::F64 => Number::from(u64_to_f64(self.0) + u64_to_f64(other.0)),
            NumberKind::U64 => Number::from(self.0.saturating_add(other.0)),
        }
    }

    /// `self - other` for two numbers of the same kind. Integers saturate.
    pub fn sub(&self, number_kind: &NumberKind, other: &Number) -> Number {
        match number_kind {
            NumberKind::I64 => Number::from((self.0 as i64).saturating_sub(other.0 as i64)),
            NumberKind::F64 => Number::from(u64_to_f64(self.0) - u64_to_f64(other.0)),
            NumberKind::U64 => Number::from(self.0.saturating_sub(other.0)),
        }
    }

    /// Return loaded data for debugging purposes
    pub fn to_debug(&self, kind: &NumberKind) -> Box<dyn fmt::Debug> {
        match kind {
            NumberKind::I64 => Box::new(self.0 as i64),
            NumberKind::F64 => Box::new(u64_to_f64(self.0)),
            NumberKind::U64 => Box::new(self.0),
        }
    }

    /// Casts the number to `f64`. May result in data/precision loss.
    pub fn to_f64(&self, number_kind: &NumberKind) -> f64 {
        match number_kind {
            NumberKind::F64 => u64_to_f64(self.0),
            NumberKind::U64 => self.0 as f64,
            NumberKind::I64 => (self.0 as i64) as f64,
        }
    }

    /// Casts the number to `u64`. May result in data/precision loss.
    pub fn to_u64(&self, number_kind: &NumberKind) -> u64 {
        match number_kind {
            NumberKind::F64 => u64_to_f64(self.0) as u64,
            NumberKind::U64 => self.0,
            NumberKind::I64 => self.0 as i64 as u64,
        }
    }

    /// Casts the number to `i64`. May result in data/precision loss.
    pub fn to_i64(&self, number_kind: &NumberKind) -> i64 {
        match number_kind {
            NumberKind::F64 => u64_to_f64(self.0) as i64,
            NumberKind::U64 => self.0 as i64,
            NumberKind::I64 => self.0 as i64,
        }
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number(f64_to_u64(f))
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number(i as u64)
    }
}

impl From<u64> for Number {
    fn from(u: u64) -> Self {
        Number(u)
    }
}

/// An atomic version of [`Number`]
#[derive(Default)]
pub struct AtomicNumber(AtomicU64);

impl AtomicNumber {
    /// Stores a [`Number`] into the atomic number.
    pub fn store(&self, val: &Number) {
        self.0.store(val.0, Ordering::SeqCst)
    }

    /// Loads the current [`Number`].
    pub fn load(&self) -> Number {
        Number(self.0.load(Ordering::SeqCst))
    }

    /// Replaces the current value, returning the previous one in the same
    /// atomic step.
    pub fn swap(&self, val: &Number) -> Number {
        Number(self.0.swap(val.0, Ordering::SeqCst))
    }

    /// Adds to the current number. Both numbers must be of the same kind.
    ///
    /// Integers saturate like [`Number::add`], `f64` overflows to `inf`.
    #[inline]
    pub fn fetch_add(&self, number_kind: &NumberKind, val: &Number) {
        // The closure never declines, so the update always succeeds.
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some(Number(old).add(number_kind, val).0)
            });
    }
}

impl fmt::Debug for AtomicNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicNumber").field(&self.load()).finish()
    }
}

/// A descriptor for the encoded data type of a [`Number`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberKind {
    /// A Number that stores `i64` values.
    I64,
    /// A Number that stores `f64` values.
    F64,
    /// A Number that stores `u64` values.
    U64,
}

impl NumberKind {
    /// Returns the zero value for this kind.
    pub fn zero(&self) -> Number {
        match self {
            NumberKind::I64 => 0i64.into(),
            NumberKind::F64 => 0f64.into(),
            NumberKind::U64 => 0u64.into(),
        }
    }

    /// Returns the max value for this kind.
    pub fn max(&self) -> Number {
        match self {
            NumberKind::I64 => i64::MAX.into(),
            NumberKind::F64 => f64::MAX.into(),
            NumberKind::U64 => u64::MAX.into(),
        }
    }

    /// Returns the min value for this kind.
    pub fn min(&self) -> Number {
        match self {
            NumberKind::I64 => i64::MIN.into(),
            NumberKind::F64 => f64::MIN.into(),
            NumberKind::U64 => u64::MIN.into(),
        }
    }

    /// The static name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            NumberKind::I64 => "i64",
            NumberKind::F64 => "f64",
            NumberKind::U64 => "u64",
        }
    }
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn u64_to_f64(val: u64) -> f64 {
    f64::from_bits(val)
}

#[inline]
fn f64_to_u64(val: f64) -> u64 {
    f64::to_bits(val)
}
