/*!
The in-memory model of a CBOR data item.

Every variant carries the encoding metadata observed while decoding (argument
widths, float width, definite or indefinite length) so that a decoded value
can be written back byte-for-byte. Values built in code use the `Shortest`
and definite defaults. Equality ignores the metadata.
*/

use super::header::{Major, Width};
use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::fmt::{self, Write};

/// Width of an encoded floating-point value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    #[default]
    Shortest,
    Half,
    Single,
    Double,
}

/// Length encoding of strings, arrays and maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    Definite(Width),
    Indefinite,
}

impl Default for Length {
    fn default() -> Self {
        Self::Definite(Width::Shortest)
    }
}

impl Length {
    pub fn is_definite(&self) -> bool {
        matches!(self, Self::Definite(_))
    }
}

/// A major type 7 simple value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Simple(pub u8);

impl Simple {
    pub const FALSE: Self = Self(20);
    pub const TRUE: Self = Self(21);
    pub const NULL: Self = Self(22);
    pub const UNDEFINED: Self = Self(23);

    /// Codes 24 to 31 encode floats, the break code and reserved values.
    pub const fn is_valid(self) -> bool {
        self.0 < 24 || self.0 > 31
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    UInt(u64, Width),
    /// A negative integer with the value `-1 - n`.
    NInt(u64, Width),
    Float(f64, FloatWidth),
    Bytes(Vec<u8>, Length),
    Text(String, Length),
    Array(Vec<Value>, Length),
    Map(Vec<(Value, Value)>, Length),
    Tag(u64, Box<Value>, Width),
    Simple(Simple),
}

impl Value {
    pub fn uint(n: u64) -> Self {
        Self::UInt(n, Width::Shortest)
    }

    pub fn int(n: i64) -> Self {
        if n >= 0 {
            Self::UInt(n as u64, Width::Shortest)
        } else {
            Self::NInt((-1 - n) as u64, Width::Shortest)
        }
    }

    pub fn float(f: f64) -> Self {
        Self::Float(f, FloatWidth::Shortest)
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(b.into(), Length::default())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into(), Length::default())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(items.into_iter().collect(), Length::default())
    }

    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self::Map(pairs.into_iter().collect(), Length::default())
    }

    pub fn tag(tag: u64, value: Value) -> Self {
        Self::Tag(tag, Box::new(value), Width::Shortest)
    }

    pub fn bool(b: bool) -> Self {
        Self::Simple(if b { Simple::TRUE } else { Simple::FALSE })
    }

    pub fn null() -> Self {
        Self::Simple(Simple::NULL)
    }

    pub fn undefined() -> Self {
        Self::Simple(Simple::UNDEFINED)
    }

    pub fn major(&self) -> Major {
        match self {
            Self::UInt(..) => Major::Unsigned,
            Self::NInt(..) => Major::Negative,
            Self::Bytes(..) => Major::Bytes,
            Self::Text(..) => Major::Text,
            Self::Array(..) => Major::Array,
            Self::Map(..) => Major::Map,
            Self::Tag(..) => Major::Tag,
            Self::Float(..) | Self::Simple(_) => Major::Simple,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(..) => "float",
            Self::Simple(Simple::FALSE | Simple::TRUE) => "boolean",
            Self::Simple(Simple::NULL) => "null",
            Self::Simple(Simple::UNDEFINED) => "undefined",
            v => v.major().name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Simple(Simple::NULL))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Simple(Simple::FALSE) => Some(false),
            Self::Simple(Simple::TRUE) => Some(true),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(n, _) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::UInt(n, _) => i64::try_from(*n).ok(),
            Self::NInt(n, _) => i64::try_from(*n).ok().map(|n| -1 - n),
            _ => None,
        }
    }

    /// Integer value, including tag 2/3 bignums of up to 16 bytes.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::UInt(n, _) => Some(*n as i128),
            Self::NInt(n, _) => Some(-1 - *n as i128),
            Self::Tag(2, inner, _) => bignum_magnitude(inner).and_then(|n| i128::try_from(n).ok()),
            Self::Tag(3, inner, _) => bignum_magnitude(inner)
                .and_then(|n| i128::try_from(n).ok())
                .map(|n| -1 - n),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::UInt(n, _) => Some(*n as u128),
            Self::Tag(2, inner, _) => bignum_magnitude(inner),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f, _) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s, _) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b, _) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a, _) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(m, _) => Some(m),
            _ => None,
        }
    }

    /// Look up the first entry of a map whose key is the text `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

fn bignum_magnitude(value: &Value) -> Option<u128> {
    let bytes = value.as_bytes()?;
    let start = bytes.iter().take_while(|b| **b == 0).count();
    if bytes.len() - start > 16 {
        return None;
    }
    Some(
        bytes[start..]
            .iter()
            .fold(0u128, |acc, b| (acc << 8) | *b as u128),
    )
}

fn bignum_bytes(n: u128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let start = bytes.iter().take_while(|b| **b == 0).count();
    bytes[start..].to_vec()
}

fn map_eq(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|pair| {
        match b
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && other == pair)
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UInt(a, _), Self::UInt(b, _)) => a == b,
            (Self::NInt(a, _), Self::NInt(b, _)) => a == b,
            (Self::Float(a, _), Self::Float(b, _)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Self::Bytes(a, _), Self::Bytes(b, _)) => a == b,
            (Self::Text(a, _), Self::Text(b, _)) => a == b,
            (Self::Array(a, _), Self::Array(b, _)) => a == b,
            (Self::Map(a, _), Self::Map(b, _)) => map_eq(a, b),
            (Self::Tag(a, x, _), Self::Tag(b, y, _)) => a == b && x == y,
            (Self::Simple(a), Self::Simple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

macro_rules! impl_from_uint {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::uint(value as u64)
                }
            }
        )*
    };
}

impl_from_uint!(u8, u16, u32, u64, usize);

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::int(value as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, isize);

impl From<u128> for Value {
    fn from(value: u128) -> Self {
        match u64::try_from(value) {
            Ok(n) => Self::uint(n),
            Err(_) => Self::tag(2, Self::bytes(bignum_bytes(value))),
        }
    }
}

impl From<i128> for Value {
    fn from(value: i128) -> Self {
        if value >= 0 {
            return Self::from(value as u128);
        }
        let n = (-1 - value) as u128;
        match u64::try_from(n) {
            Ok(n) => Self::NInt(n, Width::Shortest),
            Err(_) => Self::tag(3, Self::bytes(bignum_bytes(n))),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::float(value as f64)
    }
}

impl From<half::f16> for Value {
    fn from(value: half::f16) -> Self {
        Self::Float(value.into(), FloatWidth::Half)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::bytes(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value, Length::default())
    }
}

/// An owned byte string.
///
/// `Vec<u8>` maps to a CBOR array of integers like any other `Vec<T>`; wrap
/// it in `ByteBuf` to map it to a byte string instead.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteBuf(pub Vec<u8>);

impl From<Vec<u8>> for ByteBuf {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for ByteBuf {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<ByteBuf> for Vec<u8> {
    fn from(value: ByteBuf) -> Self {
        value.0
    }
}

impl core::ops::Deref for ByteBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::ops::DerefMut for ByteBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for ByteBuf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn write_text(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_hex(f: &mut fmt::Formatter<'_>, b: &[u8]) -> fmt::Result {
    f.write_str("h'")?;
    for byte in b {
        write!(f, "{byte:02x}")?;
    }
    f.write_char('\'')
}

/// RFC 8949 §8 diagnostic notation. Indefinite-length items are marked
/// with `_`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(n, _) => write!(f, "{n}"),
            Self::NInt(n, _) => write!(f, "{}", -1 - *n as i128),
            Self::Float(v, _) if v.is_nan() => f.write_str("NaN"),
            Self::Float(v, _) if v.is_infinite() => {
                f.write_str(if v.is_sign_positive() {
                    "Infinity"
                } else {
                    "-Infinity"
                })
            }
            Self::Float(v, _) => write!(f, "{v:?}"),
            Self::Bytes(b, Length::Indefinite) => {
                f.write_str("(_ ")?;
                write_hex(f, b)?;
                f.write_char(')')
            }
            Self::Bytes(b, _) => write_hex(f, b),
            Self::Text(s, Length::Indefinite) => {
                f.write_str("(_ ")?;
                write_text(f, s)?;
                f.write_char(')')
            }
            Self::Text(s, _) => write_text(f, s),
            Self::Array(items, len) => {
                f.write_char('[')?;
                if !len.is_definite() {
                    f.write_str("_ ")?;
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::Map(pairs, len) => {
                f.write_char('{')?;
                if !len.is_definite() {
                    f.write_str("_ ")?;
                }
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_char('}')
            }
            Self::Tag(tag, inner, _) => write!(f, "{tag}({inner})"),
            Self::Simple(Simple::FALSE) => f.write_str("false"),
            Self::Simple(Simple::TRUE) => f.write_str("true"),
            Self::Simple(Simple::NULL) => f.write_str("null"),
            Self::Simple(Simple::UNDEFINED) => f.write_str("undefined"),
            Self::Simple(Simple(n)) => write!(f, "simple({n})"),
        }
    }
}
