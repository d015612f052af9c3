use super::*;
use alloc::{borrow::ToOwned, boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use crate::canonical::{cmp_keys, shortest_float};
use crate::header::{Argument, BREAK, Header};
use core::cmp::Ordering;
use tracing::trace;

#[cfg(feature = "instrument")]
use tracing::instrument;

/// Conversion from the CBOR value model into a native value.
pub trait FromCbor: Sized {
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error>;

    /// The value of a record field that is absent from the input.
    fn missing(field: &'static str) -> Result<Self, Error> {
        Err(Error::MissingField(field))
    }
}

/// Reads items from a buffer, validating them as it goes.
pub struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
    options: Options,
}

/// An aggregate whose items are still being read.
enum Frame<'a> {
    Array {
        items: Vec<Value>,
        length: Length,
        remaining: u64,
    },
    Map {
        pairs: Vec<(Value, Value)>,
        length: Length,
        remaining: u64,
        key: Option<Value>,
        // Where the pending key starts, and the previous key's bytes
        key_start: usize,
        prev_key: Option<&'a [u8]>,
    },
    Tag(u64, Width),
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], options: Options) -> Self {
        Self {
            data,
            offset: 0,
            options,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn non_canonical(&self, what: &'static str) -> Result<(), Error> {
        if self.options.canonical {
            trace!("Rejecting non-canonical input at offset {}: {what}", self.offset);
            Err(Error::NonCanonicalInput(what))
        } else {
            Ok(())
        }
    }

    fn read_header(&mut self) -> Result<Header, Error> {
        if self.is_empty() {
            return Err(Error::UnexpectedEof);
        }
        let (header, len) = header::read_header(&self.data[self.offset..])?;
        self.offset += len;
        Ok(header)
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], Error> {
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or(Error::UnexpectedEof)?;
        let data = self.data;
        let bytes = &data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn at_break(&mut self) -> Result<bool, Error> {
        match self.data.get(self.offset) {
            None => Err(Error::UnexpectedEof),
            Some(&BREAK) => {
                self.offset += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    fn enter(&self, stack: &[Frame<'a>]) -> Result<(), Error> {
        if stack.len() >= self.options.max_depth as usize {
            trace!("Maximum nesting depth {} exceeded", self.options.max_depth);
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        Ok(())
    }

    /// Decode the next complete item.
    ///
    /// Open arrays, maps and tags live on a heap stack, so nesting depth
    /// costs memory rather than call frames.
    pub fn decode_value(&mut self) -> Result<Value, Error> {
        let mut stack = Vec::new();
        loop {
            let Some(mut value) = self.next_item(&mut stack)? else {
                continue;
            };
            loop {
                let Some(frame) = stack.last_mut() else {
                    return Ok(value);
                };
                match self.attach(frame, value)? {
                    Some(done) => {
                        stack.pop();
                        value = done;
                    }
                    None => break,
                }
            }
        }
    }

    /// Read one item. Aggregate headers push a frame and yield `None`; a
    /// break closing the innermost indefinite aggregate yields it.
    fn next_item(&mut self, stack: &mut Vec<Frame<'a>>) -> Result<Option<Value>, Error> {
        let awaits_break = matches!(
            stack.last(),
            Some(Frame::Array {
                length: Length::Indefinite,
                ..
            }) | Some(Frame::Map {
                length: Length::Indefinite,
                key: None,
                ..
            })
        );
        if awaits_break && self.at_break()? {
            return Ok(match stack.pop() {
                Some(Frame::Array { items, length, .. }) => Some(Value::Array(items, length)),
                Some(Frame::Map { pairs, length, .. }) => Some(Value::Map(pairs, length)),
                _ => None,
            });
        }
        if let Some(Frame::Map {
            key: None,
            key_start,
            ..
        }) = stack.last_mut()
        {
            *key_start = self.offset;
        }

        let header = self.read_header()?;
        if header.is_break() {
            return Err(Error::UnexpectedBreak);
        }
        if header.major != Major::Simple && !header.is_shortest() {
            if let Argument::Value(..) = header.argument {
                self.non_canonical("argument not in shortest form")?;
            }
        }

        match (header.major, header.argument) {
            (Major::Unsigned, Argument::Value(n, w)) => Ok(Some(Value::UInt(n, w))),
            (Major::Negative, Argument::Value(n, w)) => Ok(Some(Value::NInt(n, w))),
            (Major::Bytes, Argument::Value(len, w)) => Ok(Some(Value::Bytes(
                self.take(len)?.to_vec(),
                Length::Definite(w),
            ))),
            (Major::Bytes, Argument::Indefinite) => {
                self.non_canonical("indefinite-length byte string")?;
                let chunks = self.chunks(Major::Bytes)?;
                Ok(Some(Value::Bytes(chunks.concat(), Length::Indefinite)))
            }
            (Major::Text, Argument::Value(len, w)) => {
                let s = core::str::from_utf8(self.take(len)?)?;
                Ok(Some(Value::Text(s.to_owned(), Length::Definite(w))))
            }
            (Major::Text, Argument::Indefinite) => {
                self.non_canonical("indefinite-length text string")?;
                let mut s = String::new();
                for chunk in self.chunks(Major::Text)? {
                    s.push_str(core::str::from_utf8(chunk)?);
                }
                Ok(Some(Value::Text(s, Length::Indefinite)))
            }
            (Major::Array, argument) => {
                self.enter(stack)?;
                let (length, remaining) =
                    self.aggregate(argument, 1, "indefinite-length array")?;
                if let (Length::Definite(_), 0) = (length, remaining) {
                    return Ok(Some(Value::Array(Vec::new(), length)));
                }
                stack.push(Frame::Array {
                    items: Vec::new(),
                    length,
                    remaining,
                });
                Ok(None)
            }
            (Major::Map, argument) => {
                self.enter(stack)?;
                let (length, remaining) = self.aggregate(argument, 2, "indefinite-length map")?;
                if let (Length::Definite(_), 0) = (length, remaining) {
                    return Ok(Some(Value::Map(Vec::new(), length)));
                }
                stack.push(Frame::Map {
                    pairs: Vec::new(),
                    length,
                    remaining,
                    key: None,
                    key_start: self.offset,
                    prev_key: None,
                });
                Ok(None)
            }
            (Major::Tag, Argument::Value(tag, w)) => {
                self.enter(stack)?;
                stack.push(Frame::Tag(tag, w));
                Ok(None)
            }
            (Major::Simple, Argument::Value(v, w)) => self.simple(v, w).map(Some),
            (major, Argument::Indefinite) => Err(Error::MalformedHeader(
                header::HeaderFault::IndefiniteNotAllowed(major),
            )),
        }
    }

    fn chunks(&mut self, major: Major) -> Result<Vec<&'a [u8]>, Error> {
        let mut chunks = Vec::new();
        loop {
            let header = self.read_header()?;
            if header.is_break() {
                return Ok(chunks);
            }
            match header {
                Header {
                    major: m,
                    argument: Argument::Value(len, _),
                } if m == major => chunks.push(self.take(len)?),
                Header { major: m, .. } => return Err(Error::InvalidChunk(m)),
            }
        }
    }

    /// The length and entry count of an aggregate header. A definite count
    /// is bounded by the bytes left, as every item takes at least one.
    fn aggregate(
        &self,
        argument: Argument,
        items_per_entry: u64,
        what: &'static str,
    ) -> Result<(Length, u64), Error> {
        match argument {
            Argument::Value(count, w) => {
                if count.saturating_mul(items_per_entry) > self.remaining() as u64 {
                    return Err(Error::UnexpectedEof);
                }
                Ok((Length::Definite(w), count))
            }
            Argument::Indefinite => {
                self.non_canonical(what)?;
                Ok((Length::Indefinite, 0))
            }
        }
    }

    /// Add a finished item to `frame`, returning the aggregate once it is
    /// complete.
    fn attach(&self, frame: &mut Frame<'a>, value: Value) -> Result<Option<Value>, Error> {
        match frame {
            Frame::Array {
                items,
                length,
                remaining,
            } => {
                items.push(value);
                if length.is_definite() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        return Ok(Some(Value::Array(core::mem::take(items), *length)));
                    }
                }
                Ok(None)
            }
            Frame::Map {
                pairs,
                length,
                remaining,
                key,
                key_start,
                prev_key,
            } => {
                let Some(k) = key.take() else {
                    if self.options.canonical {
                        let data = self.data;
                        let encoded = &data[*key_start..self.offset];
                        if let Some(prev) = *prev_key {
                            match cmp_keys(prev, encoded) {
                                Ordering::Less => {}
                                Ordering::Equal => {
                                    trace!("Map contains duplicate keys");
                                    return Err(Error::DuplicateKey);
                                }
                                Ordering::Greater => self.non_canonical("map keys out of order")?,
                            }
                        }
                        *prev_key = Some(encoded);
                    }
                    *key = Some(value);
                    return Ok(None);
                };
                pairs.push((k, value));
                if length.is_definite() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        return Ok(Some(Value::Map(core::mem::take(pairs), *length)));
                    }
                }
                Ok(None)
            }
            Frame::Tag(tag, w) => Ok(Some(Value::Tag(*tag, Box::new(value), *w))),
        }
    }

    fn simple(&mut self, v: u64, width: Width) -> Result<Value, Error> {
        let (f, float_width) = match width {
            Width::Immediate => return Ok(Value::Simple(Simple(v as u8))),
            Width::One if v < 32 => return Err(Error::InvalidSimpleValue(v as u8)),
            Width::One => return Ok(Value::Simple(Simple(v as u8))),
            Width::Two => (
                half::f16::from_bits(v as u16).to_f64(),
                FloatWidth::Half,
            ),
            Width::Four => (f32::from_bits(v as u32) as f64, FloatWidth::Single),
            Width::Eight | Width::Shortest => (f64::from_bits(v), FloatWidth::Double),
        };
        if self.options.canonical {
            if f.is_nan() {
                if !(float_width == FloatWidth::Half && v == 0x7E00) {
                    self.non_canonical("NaN not encoded as f97e00")?;
                }
            } else if shortest_float(f) != float_width {
                self.non_canonical("float not in shortest form")?;
            }
        }
        Ok(Value::Float(f, float_width))
    }
}

/// Decode the first item in `data`, returning it with the number of bytes
/// it occupied.
#[cfg_attr(feature = "instrument", instrument(skip_all))]
pub fn decode(data: &[u8], options: &Options) -> Result<(Value, usize), Error> {
    let mut d = Decoder::new(data, *options);
    let value = d.decode_value()?;
    Ok((value, d.offset()))
}

/// Decode a buffer holding exactly one item into a native value.
#[cfg_attr(feature = "instrument", instrument(skip_all))]
pub fn decode_as<T>(data: &[u8], options: &Options) -> Result<T, Error>
where
    T: FromCbor,
{
    let (value, len) = decode(data, options)?;
    if len < data.len() {
        return Err(Error::TrailingData(data.len() - len));
    }
    T::from_cbor(value, options)
}

/// Decode a CBOR sequence (RFC 8742): concatenated items up to the end of
/// `data`.
pub fn parse_sequence(data: &[u8], options: &Options) -> Result<Vec<Value>, Error> {
    let mut d = Decoder::new(data, *options);
    let mut items = Vec::new();
    while !d.is_empty() {
        items.push(d.decode_value()?);
    }
    Ok(items)
}

fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl FromCbor for Value {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        Ok(value)
    }
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
                    match value {
                        Value::UInt(n, _) => {
                            <$ty>::try_from(n).map_err(|_| Error::OutOfRange(stringify!($ty)))
                        }
                        Value::NInt(..) => Err(Error::OutOfRange(stringify!($ty))),
                        v => Err(mismatch("unsigned integer", &v)),
                    }
                }
            }
        )*
    };
}

impl_uint_from_cbor!(u8, u16, u32, u64, usize);

macro_rules! impl_int_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
                    match value {
                        Value::UInt(..) | Value::NInt(..) => value
                            .as_i128()
                            .and_then(|n| <$ty>::try_from(n).ok())
                            .ok_or(Error::OutOfRange(stringify!($ty))),
                        v => Err(mismatch("integer", &v)),
                    }
                }
            }
        )*
    };
}

impl_int_from_cbor!(i8, i16, i32, i64, isize);

impl FromCbor for u128 {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::UInt(..) | Value::Tag(2, ..) => {
                value.as_u128().ok_or(Error::OutOfRange("u128"))
            }
            Value::NInt(..) | Value::Tag(3, ..) => Err(Error::OutOfRange("u128")),
            v => Err(mismatch("unsigned integer", &v)),
        }
    }
}

impl FromCbor for i128 {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::UInt(..) | Value::NInt(..) | Value::Tag(2 | 3, ..) => {
                value.as_i128().ok_or(Error::OutOfRange("i128"))
            }
            v => Err(mismatch("integer", &v)),
        }
    }
}

impl FromCbor for f64 {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Float(f, _) => Ok(f),
            v => Err(mismatch("float", &v)),
        }
    }
}

impl FromCbor for f32 {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Float(f, _) if f.is_nan() || (f as f32) as f64 == f => Ok(f as f32),
            Value::Float(..) => Err(Error::OutOfRange("f32")),
            v => Err(mismatch("float", &v)),
        }
    }
}

impl FromCbor for half::f16 {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Float(f, _) if canonical::float_fits(f, FloatWidth::Half) => {
                Ok(half::f16::from_f64(f))
            }
            Value::Float(..) => Err(Error::OutOfRange("f16")),
            v => Err(mismatch("float", &v)),
        }
    }
}

impl FromCbor for bool {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        value.as_bool().ok_or_else(|| mismatch("boolean", &value))
    }
}

impl FromCbor for String {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Text(s, _) => Ok(s),
            v => Err(mismatch("text string", &v)),
        }
    }
}

impl FromCbor for ByteBuf {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Bytes(b, _) => Ok(ByteBuf(b)),
            v => Err(mismatch("byte string", &v)),
        }
    }
}

impl<const N: usize> FromCbor for [u8; N] {
    fn from_cbor(value: Value, _: &Options) -> Result<Self, Error> {
        match value {
            Value::Bytes(b, _) => b
                .try_into()
                .map_err(|_| Error::OutOfRange("fixed-length byte string")),
            v => Err(mismatch("byte string", &v)),
        }
    }
}

/// `null` and `undefined` both decode as `None`.
impl<T> FromCbor for Option<T>
where
    T: FromCbor,
{
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
        match value {
            Value::Simple(Simple::NULL | Simple::UNDEFINED) => Ok(None),
            v => T::from_cbor(v, options).map(Some),
        }
    }

    fn missing(_: &'static str) -> Result<Self, Error> {
        Ok(None)
    }
}

impl<T> FromCbor for Box<T>
where
    T: FromCbor,
{
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
        T::from_cbor(value, options).map(Box::new)
    }

    fn missing(field: &'static str) -> Result<Self, Error> {
        T::missing(field).map(Box::new)
    }
}

impl<T> FromCbor for Vec<T>
where
    T: FromCbor,
{
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
        match value {
            Value::Array(items, _) => items
                .into_iter()
                .map(|item| T::from_cbor(item, options))
                .collect(),
            v => Err(mismatch("array", &v)),
        }
    }
}

fn map_pairs(value: Value) -> Result<Vec<(Value, Value)>, Error> {
    match value {
        Value::Map(pairs, _) => Ok(pairs),
        v => Err(mismatch("map", &v)),
    }
}

impl<K, V> FromCbor for BTreeMap<K, V>
where
    K: FromCbor + Ord,
    V: FromCbor,
{
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
        let mut map = BTreeMap::new();
        for (k, v) in map_pairs(value)? {
            if map
                .insert(K::from_cbor(k, options)?, V::from_cbor(v, options)?)
                .is_some()
            {
                return Err(Error::DuplicateKey);
            }
        }
        Ok(map)
    }
}

#[cfg(feature = "std")]
impl<K, V, S> FromCbor for std::collections::HashMap<K, V, S>
where
    K: FromCbor + Eq + core::hash::Hash,
    V: FromCbor,
    S: core::hash::BuildHasher + Default,
{
    fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
        let mut map = Self::default();
        for (k, v) in map_pairs(value)? {
            if map
                .insert(K::from_cbor(k, options)?, V::from_cbor(v, options)?)
                .is_some()
            {
                return Err(Error::DuplicateKey);
            }
        }
        Ok(map)
    }
}

macro_rules! impl_tuple_from_cbor {
    ($(($len:literal; $($name:ident),+)),*) => {
        $(
            impl<$($name),+> FromCbor for ($($name,)+)
            where
                $($name: FromCbor),+
            {
                fn from_cbor(value: Value, options: &Options) -> Result<Self, Error> {
                    let items = match value {
                        Value::Array(items, _) => items,
                        v => return Err(mismatch("array", &v)),
                    };
                    if items.len() != $len {
                        return Err(Error::LengthMismatch {
                            declared: $len,
                            actual: items.len(),
                        });
                    }
                    let mut items = items.into_iter();
                    Ok(($(
                        $name::from_cbor(
                            items.next().ok_or(Error::UnexpectedEof)?,
                            options,
                        )?,
                    )+))
                }
            }
        )*
    };
}

impl_tuple_from_cbor!(
    (2; A, B),
    (3; A, B, C),
    (4; A, B, C, D),
    (5; A, B, C, D, E)
);
