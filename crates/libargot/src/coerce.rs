//! Conversion between argument text and the typed storage it is bound to.
//!
//! Every value an argument can hold is one of a closed set of kinds. The
//! [`Binding`] enum pairs a kind with a [`Slot`] owned by the caller, so that
//! parsing and resetting are exhaustive matches rather than runtime type
//! checks.

use std::{
    fmt,
    num::IntErrorKind,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

/// Why a piece of text could not be converted to the requested kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceError {
    /// Nothing left to parse once the sign and base prefix were removed.
    #[error("empty value")]
    Empty,
    /// The text is not a literal of the requested kind.
    #[error("invalid {0} literal")]
    Invalid(Kind),
    /// The literal does not fit in the destination width.
    #[error("value out of range for {0}")]
    Overflow(Kind),
    /// A sign was given for an unsigned destination.
    #[error("sign not allowed for {0}")]
    Negative(Kind),
}

/// The supported destination kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Word-width signed integer.
    Int,
    /// 64-bit signed integer.
    Int64,
    /// Word-width unsigned integer.
    UInt,
    /// 64-bit unsigned integer.
    UInt64,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// Text.
    Text,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::UInt => "uint",
            Self::UInt64 => "uint64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Text => "string",
        };
        f.write_str(name)
    }
}

/// Shared handle to caller-owned storage.
///
/// The caller keeps one clone to read results from, and registers another
/// with a command, which writes through it while parsing and resetting.
#[derive(Debug, Default)]
pub struct Slot<T>(Arc<Mutex<T>>);

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Slot<T> {
    /// Creates a slot holding `value`.
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Replaces the stored value.
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Runs `f` with mutable access to the stored value.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Locks the slot. A poisoned lock still yields the value: writes are
    /// single assignments, so the value is never half-updated.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Slot<T> {
    /// Returns a copy of the stored value.
    pub fn get(&self) -> T {
        self.lock().clone()
    }
}

/// A live reference to storage of one supported kind.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Word-width signed integer storage.
    Int(Slot<isize>),
    /// 64-bit signed integer storage.
    Int64(Slot<i64>),
    /// Word-width unsigned integer storage.
    UInt(Slot<usize>),
    /// 64-bit unsigned integer storage.
    UInt64(Slot<u64>),
    /// Float storage.
    Float64(Slot<f64>),
    /// Boolean storage.
    Bool(Slot<bool>),
    /// Text storage.
    Text(Slot<String>),
}

impl Binding {
    /// The kind of the bound storage.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::Int,
            Self::Int64(_) => Kind::Int64,
            Self::UInt(_) => Kind::UInt,
            Self::UInt64(_) => Kind::UInt64,
            Self::Float64(_) => Kind::Float64,
            Self::Bool(_) => Kind::Bool,
            Self::Text(_) => Kind::Text,
        }
    }

    /// Coerces `text` to the bound kind and writes it through. Storage is
    /// left untouched when coercion fails.
    pub fn assign(&self, text: &str) -> Result<(), CoerceError> {
        match self {
            Self::Int(slot) => slot.set(parse_int(text)?),
            Self::Int64(slot) => slot.set(parse_int64(text)?),
            Self::UInt(slot) => slot.set(parse_uint(text)?),
            Self::UInt64(slot) => slot.set(parse_uint64(text)?),
            Self::Float64(slot) => slot.set(parse_float64(text)?),
            Self::Bool(slot) => slot.set(parse_bool(text)?),
            Self::Text(slot) => slot.set(text.to_string()),
        }
        Ok(())
    }

    /// Formats the value currently held by the storage.
    pub fn current(&self) -> String {
        match self {
            Self::Int(slot) => slot.get().format_value(),
            Self::Int64(slot) => slot.get().format_value(),
            Self::UInt(slot) => slot.get().format_value(),
            Self::UInt64(slot) => slot.get().format_value(),
            Self::Float64(slot) => slot.get().format_value(),
            Self::Bool(slot) => slot.get().format_value(),
            Self::Text(slot) => slot.get(),
        }
    }
}

/// A type that can be bound to a named argument.
pub trait Bindable: Sized {
    /// Wraps a slot of this type into a [`Binding`].
    fn bind(slot: &Slot<Self>) -> Binding;

    /// Formats a value the way defaults are stored and displayed.
    fn format_value(&self) -> String;
}

/// Implements [`Bindable`] for types whose `Display` output is the stored form.
macro_rules! bindable {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn bind(slot: &Slot<Self>) -> Binding {
                    Binding::$variant(slot.clone())
                }

                fn format_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

// f64's Display never uses exponent notation and round-trips exactly.
bindable! {
    isize => Int,
    i64 => Int64,
    usize => UInt,
    u64 => UInt64,
    f64 => Float64,
    bool => Bool,
    String => Text,
}

/// Splits an optional sign off `text`. Returns `(negative, rest)`.
fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else {
        (false, text.strip_prefix('+').unwrap_or(text))
    }
}

/// Picks the radix from a literal prefix and strips it.
///
/// `0x` selects 16, `0b` 2, `0o` or a bare leading `0` selects 8, anything
/// else is decimal.
fn split_radix(digits: &str) -> (u32, &str) {
    let bytes = digits.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => return (16, &digits[2..]),
            b'b' | b'B' => return (2, &digits[2..]),
            b'o' | b'O' => return (8, &digits[2..]),
            _ => return (8, &digits[1..]),
        }
    }
    (10, digits)
}

/// Parses the unsigned magnitude of an integer literal.
fn parse_magnitude(digits: &str, kind: Kind) -> Result<u128, CoerceError> {
    let (radix, body) = split_radix(digits);
    if body.is_empty() {
        return Err(if digits.is_empty() {
            CoerceError::Empty
        } else {
            CoerceError::Invalid(kind)
        });
    }
    // from_str_radix accepts its own sign, which must not follow ours.
    if body.starts_with(['+', '-']) {
        return Err(CoerceError::Invalid(kind));
    }
    u128::from_str_radix(body, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => CoerceError::Overflow(kind),
        IntErrorKind::Empty => CoerceError::Empty,
        _ => CoerceError::Invalid(kind),
    })
}

/// Parses a signed integer literal into an `i128`, checked against `[min, max]`.
fn parse_signed(text: &str, min: i128, max: i128, kind: Kind) -> Result<i128, CoerceError> {
    let (negative, digits) = split_sign(text);
    let magnitude = parse_magnitude(digits, kind)?;
    let magnitude = i128::try_from(magnitude).map_err(|_| CoerceError::Overflow(kind))?;
    let value = if negative { -magnitude } else { magnitude };
    if value < min || value > max {
        return Err(CoerceError::Overflow(kind));
    }
    Ok(value)
}

/// Parses an unsigned integer literal, checked against `max`.
fn parse_unsigned(text: &str, max: u128, kind: Kind) -> Result<u128, CoerceError> {
    if text.starts_with(['+', '-']) {
        return Err(CoerceError::Negative(kind));
    }
    let value = parse_magnitude(text, kind)?;
    if value > max {
        return Err(CoerceError::Overflow(kind));
    }
    Ok(value)
}

/// Parses a word-width signed integer.
pub fn parse_int(text: &str) -> Result<isize, CoerceError> {
    let value = parse_signed(text, isize::MIN as i128, isize::MAX as i128, Kind::Int)?;
    isize::try_from(value).map_err(|_| CoerceError::Overflow(Kind::Int))
}

/// Parses a 64-bit signed integer.
pub fn parse_int64(text: &str) -> Result<i64, CoerceError> {
    let value = parse_signed(text, i64::MIN.into(), i64::MAX.into(), Kind::Int64)?;
    i64::try_from(value).map_err(|_| CoerceError::Overflow(Kind::Int64))
}

/// Parses a word-width unsigned integer. Any sign is rejected.
pub fn parse_uint(text: &str) -> Result<usize, CoerceError> {
    let value = parse_unsigned(text, usize::MAX as u128, Kind::UInt)?;
    usize::try_from(value).map_err(|_| CoerceError::Overflow(Kind::UInt))
}

/// Parses a 64-bit unsigned integer. Any sign is rejected.
pub fn parse_uint64(text: &str) -> Result<u64, CoerceError> {
    let value = parse_unsigned(text, u64::MAX.into(), Kind::UInt64)?;
    u64::try_from(value).map_err(|_| CoerceError::Overflow(Kind::UInt64))
}

/// Parses a 64-bit float.
pub fn parse_float64(text: &str) -> Result<f64, CoerceError> {
    if text.is_empty() {
        return Err(CoerceError::Empty);
    }
    text.parse::<f64>()
        .map_err(|_| CoerceError::Invalid(Kind::Float64))
}

/// Parses a boolean: `true`, `false`, `t`, `f`, `1` or `0`, in any case.
pub fn parse_bool(text: &str) -> Result<bool, CoerceError> {
    if text == "1" || text.eq_ignore_ascii_case("t") || text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text == "0" || text.eq_ignore_ascii_case("f") || text.eq_ignore_ascii_case("false")
    {
        Ok(false)
    } else if text.is_empty() {
        Err(CoerceError::Empty)
    } else {
        Err(CoerceError::Invalid(Kind::Bool))
    }
}
