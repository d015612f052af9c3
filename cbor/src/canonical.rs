/*!
Canonical (deterministic) encoding rules.

A canonical item uses the shortest argument width everywhere, definite
lengths only, the narrowest float width that holds the value exactly, and map
pairs sorted by their encoded keys: shorter keys first, equal lengths compared
byte by byte. Repeated keys are an error.
*/

use super::*;
use alloc::vec::Vec;
use core::cmp::Ordering;
use crate::value::FloatWidth;

/// The canonical encoding of NaN: a half-precision quiet NaN.
pub const CANONICAL_NAN: [u8; 3] = [0xF9, 0x7E, 0x00];

fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f).to_bits() == value.to_bits() => Some(f),
        _ => None,
    }
}

/// The narrowest float width that round-trips `value` exactly.
pub fn shortest_float(value: f64) -> FloatWidth {
    if value.is_nan() || lossless_float_coerce::<half::f16>(value).is_some() {
        FloatWidth::Half
    } else if lossless_float_coerce::<f32>(value).is_some() {
        FloatWidth::Single
    } else {
        FloatWidth::Double
    }
}

/// Whether `value` can be written at `width` without losing precision.
pub fn float_fits(value: f64, width: FloatWidth) -> bool {
    match width {
        FloatWidth::Shortest | FloatWidth::Double => true,
        _ if value.is_nan() => true,
        FloatWidth::Half => lossless_float_coerce::<half::f16>(value).is_some(),
        FloatWidth::Single => lossless_float_coerce::<f32>(value).is_some(),
    }
}

/// Canonical ordering of two encoded map keys.
pub fn cmp_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sort encoded `(key, value)` pairs into canonical order, rejecting
/// repeated keys.
pub(crate) fn sort_pairs<K, V>(pairs: &mut [(K, V)]) -> Result<(), Error>
where
    K: AsRef<[u8]>,
{
    pairs.sort_by(|(a, _), (b, _)| cmp_keys(a.as_ref(), b.as_ref()));
    if pairs
        .windows(2)
        .any(|w| w[0].0.as_ref() == w[1].0.as_ref())
    {
        tracing::debug!("Map contains duplicate keys");
        return Err(Error::DuplicateKey);
    }
    Ok(())
}

impl Value {
    /// The same logical value with all encoding metadata reset and map pairs
    /// in canonical order.
    pub fn canonicalize(&self) -> Result<Value, Error> {
        let max_depth = options::DEFAULT_MAX_DEPTH;
        let mut stack: Vec<Frame> = Vec::new();
        let mut next = self;
        loop {
            let mut done = loop {
                let mut entries = match next {
                    Value::UInt(n, _) => break Value::uint(*n),
                    Value::NInt(n, _) => break Value::NInt(*n, header::Width::Shortest),
                    Value::Float(f, _) => break Value::float(*f),
                    Value::Bytes(b, _) => break Value::bytes(b.as_slice()),
                    Value::Text(s, _) => break Value::text(s.as_str()),
                    Value::Simple(s) => break Value::Simple(*s),
                    Value::Tag(tag, inner, _) => {
                        enter(&stack, max_depth)?;
                        stack.push(Frame::Tag(*tag));
                        next = &**inner;
                        continue;
                    }
                    Value::Array(items, _) => Entries::Array {
                        items: Vec::with_capacity(items.len()),
                        rest: items.iter(),
                    },
                    Value::Map(pairs, _) => Entries::Map {
                        pairs: Vec::with_capacity(pairs.len()),
                        rest: pairs.iter(),
                        key: None,
                        value: None,
                    },
                };
                enter(&stack, max_depth)?;
                match entries.next_child() {
                    Some(child) => {
                        stack.push(Frame::Entries(entries));
                        next = child;
                    }
                    None => break entries.close(max_depth - stack.len() as u32 - 1)?,
                }
            };

            // Climb back up while aggregates complete
            loop {
                match stack.pop() {
                    None => return Ok(done),
                    Some(Frame::Tag(tag)) => done = Value::tag(tag, done),
                    Some(Frame::Entries(mut entries)) => {
                        entries.accept(done);
                        match entries.next_child() {
                            Some(child) => {
                                stack.push(Frame::Entries(entries));
                                next = child;
                                break;
                            }
                            None => done = entries.close(max_depth - stack.len() as u32 - 1)?,
                        }
                    }
                }
            }
        }
    }
}

fn enter(stack: &[Frame<'_>], max_depth: u32) -> Result<(), Error> {
    if stack.len() >= max_depth as usize {
        return Err(Error::DepthExceeded(max_depth));
    }
    Ok(())
}

/// An open level of [`Value::canonicalize`].
enum Frame<'v> {
    Tag(u64),
    Entries(Entries<'v>),
}

/// An aggregate being rebuilt: the items done so far and those still to
/// visit.
enum Entries<'v> {
    Array {
        items: Vec<Value>,
        rest: core::slice::Iter<'v, Value>,
    },
    Map {
        pairs: Vec<(Value, Value)>,
        rest: core::slice::Iter<'v, (Value, Value)>,
        key: Option<Value>,
        value: Option<&'v Value>,
    },
}

impl<'v> Entries<'v> {
    fn accept(&mut self, item: Value) {
        match self {
            Entries::Array { items, .. } => items.push(item),
            Entries::Map { pairs, key, .. } => match key.take() {
                Some(k) => pairs.push((k, item)),
                None => *key = Some(item),
            },
        }
    }

    fn next_child(&mut self) -> Option<&'v Value> {
        match self {
            Entries::Array { rest, .. } => rest.next(),
            Entries::Map {
                rest, key, value, ..
            } => {
                if key.is_some() {
                    value.take()
                } else {
                    rest.next().map(|(k, v)| {
                        *value = Some(v);
                        k
                    })
                }
            }
        }
    }

    /// Finish the aggregate. Map keys are encoded with `key_depth` levels
    /// of nesting left, to sort them.
    fn close(self, key_depth: u32) -> Result<Value, Error> {
        match self {
            Entries::Array { items, .. } => Ok(Value::array(items)),
            Entries::Map { pairs, .. } => {
                let opts = Options::canonical().with_max_depth(key_depth);
                let mut sorted = pairs
                    .into_iter()
                    .map(|(k, v)| Ok((encode::encode(&k, &opts)?, (k, v))))
                    .collect::<Result<Vec<_>, Error>>()?;
                sort_pairs(&mut sorted)?;
                Ok(Value::map(sorted.into_iter().map(|(_, pair)| pair)))
            }
        }
    }
}

/// Check that `data` holds exactly one canonically encoded item.
pub fn check(data: &[u8], options: &Options) -> Result<(), Error> {
    let (_, len) = decode::decode(data, &options.with_canonical(true))?;
    if len < data.len() {
        return Err(Error::TrailingData(data.len() - len));
    }
    Ok(())
}
