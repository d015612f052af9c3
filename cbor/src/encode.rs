use super::*;
use alloc::{boxed::Box, collections::BTreeMap, string::String, vec, vec::Vec};
use crate::canonical::{CANONICAL_NAN, float_fits, shortest_float};
use crate::header::{BREAK, write_header_with, write_indefinite};
use tracing::{debug, trace};

#[cfg(feature = "instrument")]
use tracing::instrument;

/// Conversion of a native value into the CBOR value model.
pub trait ToCbor {
    fn to_cbor(&self, options: &Options) -> Result<Value, Error>;
}

/// Writes values as CBOR, following the metadata they carry unless the
/// options ask for canonical output.
pub struct Encoder {
    data: Vec<u8>,
    options: Options,
    depth: u32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Encoder {
    pub fn new(options: Options) -> Self {
        Self {
            data: Vec::new(),
            options,
            depth: 0,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn offset(&self) -> usize {
        self.data.len()
    }

    fn reserve(&self, extra: usize) -> Result<(), Error> {
        match self.options.max_output_len {
            Some(max) if self.data.len().saturating_add(extra) > max => {
                debug!("Encoded output would exceed {max} bytes");
                Err(Error::BufferOverflow(max))
            }
            _ => Ok(()),
        }
    }

    fn emit_extend(&mut self, b: &[u8]) -> Result<(), Error> {
        self.reserve(b.len())?;
        self.data.extend_from_slice(b);
        Ok(())
    }

    fn emit_uint_minor(&mut self, major: Major, val: u64, width: Width) -> Result<(), Error> {
        let width = if self.options.canonical {
            Width::Shortest
        } else {
            width
        };
        self.reserve(1 + width.resolve(val).extra_bytes())?;
        write_header_with(&mut self.data, major, val, width);
        Ok(())
    }

    fn emit_indefinite(&mut self, major: Major) -> Result<(), Error> {
        if self.options.canonical {
            debug!("Refusing indefinite-length {major} in canonical mode");
            return Err(Error::IndefiniteLength);
        }
        self.reserve(1)?;
        write_indefinite(&mut self.data, major);
        Ok(())
    }

    fn emit_break(&mut self) -> Result<(), Error> {
        self.emit_extend(&[BREAK])
    }

    fn is_indefinite(&self, length: Length) -> bool {
        !self.options.canonical && length == Length::Indefinite
    }

    fn descend(&mut self) -> Result<(), Error> {
        if self.depth >= self.options.max_depth {
            trace!("Maximum nesting depth {} exceeded", self.options.max_depth);
            return Err(Error::DepthExceeded(self.options.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `f` one nesting level deeper.
    fn nest<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        self.descend()?;
        let r = f(self);
        self.depth -= 1;
        r
    }

    /// Sort the map entries written since `start` into canonical order.
    /// `marks` holds the end of every key and value relative to `start`.
    fn sort_entries(&mut self, start: usize, marks: &[usize]) -> Result<(), Error> {
        let body = self.data.split_off(start);
        let mut items = Vec::with_capacity(marks.len());
        let mut prev = 0;
        for mark in marks {
            items.push(&body[prev..*mark]);
            prev = *mark;
        }
        let mut pairs = items
            .chunks_exact(2)
            .map(|c| (c[0], c[1]))
            .collect::<Vec<_>>();
        canonical::sort_pairs(&mut pairs)?;

        for (k, v) in pairs {
            self.data.extend_from_slice(k);
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Append pre-encoded CBOR as-is.
    pub fn emit_raw_slice(&mut self, data: &[u8]) -> Result<(), Error> {
        self.emit_extend(data)
    }

    pub fn emit<T>(&mut self, value: &T) -> Result<(), Error>
    where
        T: ToCbor + ?Sized,
    {
        let value = value.to_cbor(&self.options)?;
        self.emit_value(&value)
    }

    /// Write `value`. Nested items are queued on a heap stack, so nesting
    /// depth costs memory rather than call frames.
    pub fn emit_value(&mut self, value: &Value) -> Result<(), Error> {
        let depth = self.depth;
        let r = self.emit_steps(vec![Step::Item(value)]);
        self.depth = depth;
        r
    }

    fn emit_steps(&mut self, mut steps: Vec<Step<'_>>) -> Result<(), Error> {
        // Start offset and entry boundaries of each open canonical map
        let mut maps: Vec<(usize, Vec<usize>)> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Item(value) => self.emit_item(value, &mut steps, &mut maps)?,
                Step::Mark => {
                    if let Some((start, marks)) = maps.last_mut() {
                        marks.push(self.data.len() - *start);
                    }
                }
                Step::Break => self.emit_break()?,
                Step::Sort => {
                    if let Some((start, marks)) = maps.pop() {
                        self.sort_entries(start, &marks)?;
                    }
                }
                Step::Leave => self.depth -= 1,
            }
        }
        Ok(())
    }

    fn emit_item<'v>(
        &mut self,
        value: &'v Value,
        steps: &mut Vec<Step<'v>>,
        maps: &mut Vec<(usize, Vec<usize>)>,
    ) -> Result<(), Error> {
        match value {
            Value::UInt(n, w) => self.emit_uint_minor(Major::Unsigned, *n, *w),
            Value::NInt(n, w) => self.emit_uint_minor(Major::Negative, *n, *w),
            Value::Float(f, w) => self.emit_float(*f, *w),
            Value::Bytes(b, len) => self.emit_string(Major::Bytes, b, *len),
            Value::Text(s, len) => self.emit_string(Major::Text, s.as_bytes(), *len),
            Value::Array(items, len) => {
                self.descend()?;
                steps.push(Step::Leave);
                if self.is_indefinite(*len) {
                    self.emit_indefinite(Major::Array)?;
                    steps.push(Step::Break);
                } else {
                    self.emit_uint_minor(Major::Array, items.len() as u64, definite_width(*len))?;
                }
                steps.extend(items.iter().rev().map(Step::Item));
                Ok(())
            }
            Value::Map(pairs, len) => {
                self.descend()?;
                steps.push(Step::Leave);
                if self.options.canonical {
                    self.emit_uint_minor(Major::Map, pairs.len() as u64, Width::Shortest)?;
                    maps.push((self.data.len(), Vec::with_capacity(pairs.len() * 2)));
                    steps.push(Step::Sort);
                    for (k, v) in pairs.iter().rev() {
                        steps.extend([Step::Mark, Step::Item(v), Step::Mark, Step::Item(k)]);
                    }
                    return Ok(());
                }
                if self.is_indefinite(*len) {
                    self.emit_indefinite(Major::Map)?;
                    steps.push(Step::Break);
                } else {
                    self.emit_uint_minor(Major::Map, pairs.len() as u64, definite_width(*len))?;
                }
                for (k, v) in pairs.iter().rev() {
                    steps.extend([Step::Item(v), Step::Item(k)]);
                }
                Ok(())
            }
            Value::Tag(tag, inner, w) => {
                self.descend()?;
                steps.push(Step::Leave);
                self.emit_uint_minor(Major::Tag, *tag, *w)?;
                steps.push(Step::Item(&**inner));
                Ok(())
            }
            Value::Simple(s) => {
                if !s.is_valid() {
                    return Err(Error::InvalidSimpleValue(s.0));
                }
                self.emit_uint_minor(Major::Simple, s.0 as u64, Width::Shortest)
            }
        }
    }

    fn emit_float(&mut self, value: f64, width: FloatWidth) -> Result<(), Error> {
        if value.is_nan() && (self.options.canonical || width == FloatWidth::Shortest) {
            return self.emit_extend(&CANONICAL_NAN);
        }
        let width = match width {
            FloatWidth::Shortest => shortest_float(value),
            _ if self.options.canonical => shortest_float(value),
            w if float_fits(value, w) => w,
            _ => shortest_float(value),
        };

        let mut buf = Vec::with_capacity(9);
        match width {
            FloatWidth::Half => {
                buf.push((7 << 5) | 25);
                buf.extend(half::f16::from_f64(value).to_be_bytes())
            }
            FloatWidth::Single => {
                buf.push((7 << 5) | 26);
                buf.extend((value as f32).to_be_bytes())
            }
            FloatWidth::Double | FloatWidth::Shortest => {
                buf.push((7 << 5) | 27);
                buf.extend(value.to_be_bytes())
            }
        }
        self.emit_extend(&buf)
    }

    fn emit_string(&mut self, major: Major, bytes: &[u8], len: Length) -> Result<(), Error> {
        if self.is_indefinite(len) {
            self.emit_indefinite(major)?;
            if !bytes.is_empty() {
                self.emit_uint_minor(major, bytes.len() as u64, Width::Shortest)?;
                self.emit_extend(bytes)?;
            }
            self.emit_break()
        } else {
            self.emit_uint_minor(major, bytes.len() as u64, definite_width(len))?;
            self.emit_extend(bytes)
        }
    }

    pub fn emit_tagged<T>(&mut self, tag: u64, value: &T) -> Result<(), Error>
    where
        T: ToCbor + ?Sized,
    {
        self.nest(|e| {
            e.emit_uint_minor(Major::Tag, tag, Width::Shortest)?;
            e.emit(value)
        })
    }

    pub fn emit_byte_stream<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ByteStream) -> Result<(), Error>,
    {
        let mut s = ByteStream::new(self)?;
        f(&mut s)?;
        s.end()
    }

    pub fn emit_text_stream<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TextStream) -> Result<(), Error>,
    {
        let mut s = TextStream::new(self)?;
        f(&mut s)?;
        s.end()
    }

    /// Build an array item by item. With `count = None` the array is written
    /// with indefinite length, which canonical mode refuses.
    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Array) -> Result<(), Error>,
    {
        self.nest(|e| {
            let mut a = Array::new(e, count)?;
            f(&mut a)?;
            a.end()
        })
    }

    /// Build a map from alternating keys and values. In canonical mode the
    /// pairs are sorted when the map is closed.
    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Map) -> Result<(), Error>,
    {
        self.nest(|e| {
            let mut m = Map::new(e, count)?;
            f(&mut m)?;
            m.end()
        })
    }
}

/// Pending work for [`Encoder::emit_value`].
enum Step<'v> {
    Item(&'v Value),
    // End of a key or value in the innermost canonical map
    Mark,
    Break,
    // Close the innermost canonical map
    Sort,
    Leave,
}

fn definite_width(len: Length) -> Width {
    match len {
        Length::Definite(w) => w,
        Length::Indefinite => Width::Shortest,
    }
}

pub struct ByteStream<'a> {
    encoder: &'a mut Encoder,
}

impl<'a> ByteStream<'a> {
    fn new(encoder: &'a mut Encoder) -> Result<Self, Error> {
        encoder.emit_indefinite(Major::Bytes)?;
        Ok(Self { encoder })
    }

    /// Append one definite-length chunk.
    pub fn emit<V>(&mut self, value: &V) -> Result<(), Error>
    where
        V: AsRef<[u8]> + ?Sized,
    {
        self.encoder
            .emit_string(Major::Bytes, value.as_ref(), Length::default())
    }

    fn end(self) -> Result<(), Error> {
        self.encoder.emit_break()
    }
}

pub struct TextStream<'a> {
    encoder: &'a mut Encoder,
}

impl<'a> TextStream<'a> {
    fn new(encoder: &'a mut Encoder) -> Result<Self, Error> {
        encoder.emit_indefinite(Major::Text)?;
        Ok(Self { encoder })
    }

    /// Append one definite-length chunk.
    pub fn emit<V>(&mut self, value: &V) -> Result<(), Error>
    where
        V: AsRef<str> + ?Sized,
    {
        self.encoder
            .emit_string(Major::Text, value.as_ref().as_bytes(), Length::default())
    }

    fn end(self) -> Result<(), Error> {
        self.encoder.emit_break()
    }
}

pub struct Sequence<'a, const D: usize> {
    encoder: &'a mut Encoder,
    start: usize,
    count: Option<usize>,
    idx: usize,
    // Item boundaries relative to `start`, kept for sorting canonical maps
    marks: Vec<usize>,
}

pub type Array<'a> = Sequence<'a, 1>;
pub type Map<'a> = Sequence<'a, 2>;

impl<'a, const D: usize> Sequence<'a, D> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Result<Self, Error> {
        let (major, what) = if D == 1 {
            (Major::Array, "array length")
        } else {
            (Major::Map, "map length")
        };
        let items = match count {
            Some(count) => Some(count.checked_mul(D).ok_or(Error::OutOfRange(what))?),
            None => None,
        };
        match count {
            Some(count) => encoder.emit_uint_minor(major, count as u64, Width::Shortest)?,
            None => encoder.emit_indefinite(major)?,
        }
        Ok(Self {
            start: encoder.offset(),
            encoder,
            count: items,
            idx: 0,
            marks: Vec::new(),
        })
    }

    pub fn offset(&self) -> usize {
        self.encoder.offset() - self.start
    }

    fn field<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Encoder) -> Result<(), Error>,
    {
        self.idx += 1;
        if let Some(count) = self.count {
            if self.idx > count {
                debug!("Too many items added to definite length sequence");
                return Err(Error::LengthMismatch {
                    declared: count / D,
                    actual: self.idx.div_ceil(D),
                });
            }
        }
        f(self.encoder)?;
        if D == 2 && self.encoder.options.canonical {
            self.marks.push(self.encoder.offset() - self.start);
        }
        Ok(())
    }

    fn end(self) -> Result<(), Error> {
        let Some(count) = self.count else {
            return self.encoder.emit_break();
        };
        if self.idx != count {
            debug!(
                "Definite length sequence is short of items: {}, expected {}",
                self.idx, count
            );
            return Err(Error::LengthMismatch {
                declared: count / D,
                actual: self.idx.div_ceil(D),
            });
        }
        if D == 2 && self.encoder.options.canonical {
            self.encoder.sort_entries(self.start, &self.marks)
        } else {
            Ok(())
        }
    }

    pub fn emit<T>(&mut self, value: &T) -> Result<(), Error>
    where
        T: ToCbor + ?Sized,
    {
        self.field(|e| e.emit(value))
    }

    pub fn emit_value(&mut self, value: &Value) -> Result<(), Error> {
        self.field(|e| e.emit_value(value))
    }

    pub fn emit_raw_slice(&mut self, data: &[u8]) -> Result<(), Error> {
        self.field(|e| e.emit_raw_slice(data))
    }

    pub fn emit_tagged<T>(&mut self, tag: u64, value: &T) -> Result<(), Error>
    where
        T: ToCbor + ?Sized,
    {
        self.field(|e| e.emit_tagged(tag, value))
    }

    pub fn emit_byte_stream<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ByteStream) -> Result<(), Error>,
    {
        self.field(|e| e.emit_byte_stream(f))
    }

    pub fn emit_text_stream<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TextStream) -> Result<(), Error>,
    {
        self.field(|e| e.emit_text_stream(f))
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Array) -> Result<(), Error>,
    {
        self.field(|e| e.emit_array(count, f))
    }

    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Map) -> Result<(), Error>,
    {
        self.field(|e| e.emit_map(count, f))
    }
}

/// Encode a single value.
#[cfg_attr(feature = "instrument", instrument(skip_all))]
pub fn encode(value: &Value, options: &Options) -> Result<Vec<u8>, Error> {
    let mut e = Encoder::new(*options);
    e.emit_value(value)?;
    Ok(e.build())
}

/// Convert a native value and encode it.
#[cfg_attr(feature = "instrument", instrument(skip_all))]
pub fn encode_as<T>(value: &T, options: &Options) -> Result<Vec<u8>, Error>
where
    T: ToCbor + ?Sized,
{
    encode(&value.to_cbor(options)?, options)
}

macro_rules! impl_stream_emit_functions {
    ($(( $method:ident, $stream_type:ty)),*) => {
        $(
            pub fn $method<F>(options: &Options, f: F) -> Result<Vec<u8>, Error>
            where
                F: FnOnce(&mut $stream_type) -> Result<(), Error>,
            {
                let mut e = Encoder::new(*options);
                e.$method(f)?;
                Ok(e.build())
            }
        )*
    };
}

impl_stream_emit_functions!(
    (emit_byte_stream, ByteStream),
    (emit_text_stream, TextStream)
);

macro_rules! impl_collection_emit_functions {
    ($(( $method:ident, $collection_type:ty)),*) => {
        $(
            pub fn $method<F>(count: Option<usize>, options: &Options, f: F) -> Result<Vec<u8>, Error>
            where
                F: FnOnce(&mut $collection_type) -> Result<(), Error>,
            {
                let mut e = Encoder::new(*options);
                e.$method(count, f)?;
                Ok(e.build())
            }
        )*
    };
}

impl_collection_emit_functions!((emit_array, Array), (emit_map, Map));

macro_rules! impl_to_cbor_via_from {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
                    Ok(Value::from(*self))
                }
            }
        )*
    };
}

impl_to_cbor_via_from!(
    u8,
    u16,
    u32,
    u64,
    usize,
    u128,
    i8,
    i16,
    i32,
    i64,
    isize,
    i128,
    half::f16,
    f32,
    f64,
    bool
);

impl ToCbor for Value {
    fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
        Ok(self.clone())
    }
}

impl ToCbor for str {
    fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
        Ok(Value::text(self))
    }
}

impl ToCbor for String {
    fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
        Ok(Value::text(self.as_str()))
    }
}

impl ToCbor for ByteBuf {
    fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
        Ok(Value::bytes(self.as_slice()))
    }
}

impl<const N: usize> ToCbor for [u8; N] {
    fn to_cbor(&self, _: &Options) -> Result<Value, Error> {
        Ok(Value::bytes(self.as_slice()))
    }
}

impl<T> ToCbor for Option<T>
where
    T: ToCbor,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        match self {
            Some(value) => value.to_cbor(options),
            None => Ok(Value::null()),
        }
    }
}

impl<T> ToCbor for &T
where
    T: ToCbor + ?Sized,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        (**self).to_cbor(options)
    }
}

impl<T> ToCbor for Box<T>
where
    T: ToCbor + ?Sized,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        self.as_ref().to_cbor(options)
    }
}

impl<T> ToCbor for [T]
where
    T: ToCbor,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        Ok(Value::array(
            self.iter()
                .map(|v| v.to_cbor(options))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }
}

impl<T> ToCbor for Vec<T>
where
    T: ToCbor,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        self.as_slice().to_cbor(options)
    }
}

fn map_to_cbor<'a, K, V, I>(entries: I, options: &Options) -> Result<Value, Error>
where
    K: ToCbor + 'a,
    V: ToCbor + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    Ok(Value::map(
        entries
            .into_iter()
            .map(|(k, v)| Ok((k.to_cbor(options)?, v.to_cbor(options)?)))
            .collect::<Result<Vec<_>, Error>>()?,
    ))
}

impl<K, V> ToCbor for BTreeMap<K, V>
where
    K: ToCbor,
    V: ToCbor,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        map_to_cbor(self, options)
    }
}

#[cfg(feature = "std")]
impl<K, V, S> ToCbor for std::collections::HashMap<K, V, S>
where
    K: ToCbor,
    V: ToCbor,
{
    fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
        map_to_cbor(self, options)
    }
}

macro_rules! impl_tuple_to_cbor {
    ($(($($name:ident $idx:tt),+)),*) => {
        $(
            impl<$($name),+> ToCbor for ($($name,)+)
            where
                $($name: ToCbor),+
            {
                fn to_cbor(&self, options: &Options) -> Result<Value, Error> {
                    Ok(Value::array([$(self.$idx.to_cbor(options)?),+]))
                }
            }
        )*
    };
}

impl_tuple_to_cbor!(
    (A 0, B 1),
    (A 0, B 1, C 2),
    (A 0, B 1, C 2, D 3),
    (A 0, B 1, C 2, D 3, E 4)
);
