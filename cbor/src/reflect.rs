/*!
Record mappings: the field list of a struct, derived with `#[derive(Cbor)]`
and memoized once per type in a process-wide registry.
*/

use super::*;
use crate::error::CaptureFieldErr;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{LazyLock, PoisonError, RwLock},
};
use tracing::{debug, trace};

/// A struct whose fields map to CBOR map entries or array items.
///
/// Implemented by `#[derive(Cbor)]` on structs with named fields.
pub trait Record: Sized + 'static {
    /// Accumulates decoded field values until the record is complete.
    type Partial: Default;

    /// Build the field list. Called at most once per type by [`mapping`],
    /// so it must not depend on any other mapping.
    fn field_mapping() -> FieldMapping<Self>;

    /// Assemble the record, filling absent fields with their defaults.
    fn finish(partial: Self::Partial) -> Result<Self, Error>;
}

pub type EncodeFn<T> = fn(&T, &Options) -> Result<Value, Error>;
pub type DecodeFn<T> = fn(&mut <T as Record>::Partial, Value, &Options) -> Result<(), Error>;

pub struct Field<T: Record> {
    pub name: &'static str,
    pub encode: EncodeFn<T>,
    pub decode: DecodeFn<T>,
}

/// The fields of a record type, in declaration order.
pub struct FieldMapping<T: Record> {
    fields: Vec<Field<T>>,
}

impl<T: Record> FieldMapping<T> {
    pub fn new(fields: Vec<Field<T>>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

type Registry = HashMap<TypeId, &'static (dyn Any + Send + Sync)>;

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(Default::default);

fn downcast<T: Record>(entry: &'static (dyn Any + Send + Sync)) -> &'static FieldMapping<T> {
    entry
        .downcast_ref::<FieldMapping<T>>()
        .expect("registry entries are keyed by the TypeId of their record")
}

/// The field mapping of `T`, built on first use.
///
/// Concurrent first uses may each build a mapping, but only the first to
/// take the write lock stores it; everyone gets that one.
pub fn mapping<T: Record>() -> &'static FieldMapping<T> {
    let id = TypeId::of::<T>();
    if let Some(entry) = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return downcast(*entry);
    }

    // Built outside the lock
    let built = T::field_mapping();

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    let entry = registry.entry(id).or_insert_with(|| {
        debug!(
            "Registered field mapping for {} ({} fields)",
            core::any::type_name::<T>(),
            built.len()
        );
        let leaked: &'static (dyn Any + Send + Sync) = Box::leak(Box::new(built));
        leaked
    });
    downcast(*entry)
}

/// Encode a record as a map keyed by field name, or as an array in
/// declaration order when `positional_records` is set.
pub fn encode_record<T: Record>(record: &T, options: &Options) -> Result<Value, Error> {
    let fields = mapping::<T>().fields();
    if options.positional_records {
        Ok(Value::array(
            fields
                .iter()
                .map(|f| (f.encode)(record, options).map_field_err(f.name))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    } else {
        Ok(Value::map(
            fields
                .iter()
                .map(|f| {
                    Ok((
                        Value::text(f.name),
                        (f.encode)(record, options).map_field_err(f.name)?,
                    ))
                })
                .collect::<Result<Vec<_>, Error>>()?,
        ))
    }
}

/// Decode a record from a map keyed by field name or an array in
/// declaration order.
pub fn decode_record<T: Record>(value: Value, options: &Options) -> Result<T, Error> {
    let mapping = mapping::<T>();
    let mut partial = T::Partial::default();
    let mut seen = vec![false; mapping.len()];

    let mut set = |idx: usize, value: Value| {
        let field = &mapping.fields()[idx];
        if seen[idx] {
            trace!("Field '{}' appears more than once", field.name);
            return Err(Error::DuplicateKey);
        }
        seen[idx] = true;
        (field.decode)(&mut partial, value, options).map_field_err(field.name)
    };

    match value {
        Value::Map(pairs, _) => {
            for (k, v) in pairs {
                match k.as_str().and_then(|name| mapping.position(name)) {
                    Some(idx) => set(idx, v)?,
                    None => unknown_field(options, || match k.as_str() {
                        Some(name) => name.to_string(),
                        None => k.to_string(),
                    })?,
                }
            }
        }
        Value::Array(items, _) => {
            for (idx, v) in items.into_iter().enumerate() {
                if idx < mapping.len() {
                    set(idx, v)?;
                } else {
                    unknown_field(options, || format!("#{idx}"))?;
                }
            }
        }
        v => {
            return Err(Error::TypeMismatch {
                expected: "map or array",
                found: v.type_name(),
            });
        }
    }
    T::finish(partial)
}

fn unknown_field<F>(options: &Options, name: F) -> Result<(), Error>
where
    F: FnOnce() -> String,
{
    let name = name();
    match options.unknown_fields {
        UnknownFields::Ignore => {
            trace!("Ignoring unknown field '{name}'");
            Ok(())
        }
        UnknownFields::Error => {
            debug!("Unknown field '{name}'");
            Err(Error::UnknownField(name))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: Option<i32>,
    }

    #[derive(Default)]
    struct PointPartial {
        x: Option<i32>,
        y: Option<Option<i32>>,
    }

    impl Record for Point {
        type Partial = PointPartial;

        fn field_mapping() -> FieldMapping<Self> {
            FieldMapping::new(vec![
                Field::<Point> {
                    name: "x",
                    encode: |p, o| p.x.to_cbor(o),
                    decode: |p, v, o| {
                        p.x = Some(FromCbor::from_cbor(v, o)?);
                        Ok(())
                    },
                },
                Field::<Point> {
                    name: "y",
                    encode: |p, o| p.y.to_cbor(o),
                    decode: |p, v, o| {
                        p.y = Some(FromCbor::from_cbor(v, o)?);
                        Ok(())
                    },
                },
            ])
        }

        fn finish(partial: Self::Partial) -> Result<Self, Error> {
            Ok(Self {
                x: match partial.x {
                    Some(x) => x,
                    None => FromCbor::missing("x")?,
                },
                y: match partial.y {
                    Some(y) => y,
                    None => FromCbor::missing("y")?,
                },
            })
        }
    }

    #[test]
    fn mapping_is_memoized() {
        let a = mapping::<Point>() as *const FieldMapping<Point>;
        let b = mapping::<Point>() as *const FieldMapping<Point>;
        assert_eq!(a, b);
        assert_eq!(mapping::<Point>().position("y"), Some(1));
    }

    #[test]
    fn hand_written_record() {
        let opts = Options::default();
        let p = Point { x: -3, y: None };
        let v = encode_record(&p, &opts).unwrap();
        assert_eq!(
            v,
            Value::map([
                (Value::text("x"), Value::int(-3)),
                (Value::text("y"), Value::null()),
            ])
        );
        assert_eq!(decode_record::<Point>(v, &opts), Ok(p));

        let missing_y = Value::map([(Value::text("x"), Value::uint(1))]);
        assert_eq!(
            decode_record::<Point>(missing_y, &opts),
            Ok(Point { x: 1, y: None })
        );

        let positional = encode_record(
            &Point { x: 1, y: Some(2) },
            &opts.with_positional_records(true),
        )
        .unwrap();
        assert_eq!(positional, Value::array([Value::uint(1), Value::uint(2)]));
        assert_eq!(
            decode_record::<Point>(positional, &opts),
            Ok(Point { x: 1, y: Some(2) })
        );
    }

    #[test]
    fn field_errors() {
        let opts = Options::default();
        let dup = Value::map([
            (Value::text("x"), Value::uint(1)),
            (Value::text("x"), Value::uint(2)),
        ]);
        assert_eq!(decode_record::<Point>(dup, &opts), Err(Error::DuplicateKey));

        let bad = Value::map([(Value::text("x"), Value::text("no"))]);
        assert_eq!(
            decode_record::<Point>(bad, &opts),
            Err(Error::InvalidField {
                field: "x",
                source: Box::new(Error::TypeMismatch {
                    expected: "integer",
                    found: "text string"
                })
            })
        );

        let extra = Value::map([
            (Value::text("x"), Value::uint(1)),
            (Value::uint(7), Value::uint(2)),
        ]);
        assert!(decode_record::<Point>(extra.clone(), &opts).is_ok());
        assert_eq!(
            decode_record::<Point>(extra, &opts.with_unknown_fields(UnknownFields::Error)),
            Err(Error::UnknownField("7".into()))
        );

        assert_eq!(
            decode_record::<Point>(Value::uint(1), &opts),
            Err(Error::TypeMismatch {
                expected: "map or array",
                found: "unsigned integer"
            })
        );
    }
}
