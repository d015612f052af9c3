use super::*;
use alloc::vec::Vec;
use crate::encode::*;
use hex_literal::hex;

fn emit<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    encode_as(value, &Options::default()).unwrap()
}

fn emit_canonical<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    encode_as(value, &Options::canonical()).unwrap()
}

fn emit_tagged<T>(value: &T, tag: u64) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::default();
    e.emit_tagged(tag, value).unwrap();
    e.build()
}

#[test]
fn rfc_tests() {
    // RFC 8949, Appendix A:
    // https://www.rfc-editor.org/rfc/rfc8949.html#section-appendix.a

    assert_eq!(emit(&0), hex!("00"));
    assert_eq!(emit(&1), hex!("01"));
    assert_eq!(emit(&10), hex!("0a"));
    assert_eq!(emit(&23), hex!("17"));
    assert_eq!(emit(&24), hex!("1818"));
    assert_eq!(emit(&25), hex!("1819"));
    assert_eq!(emit(&100), hex!("1864"));
    assert_eq!(emit(&1000), hex!("1903e8"));
    assert_eq!(emit(&1000000), hex!("1a000f4240"));
    assert_eq!(emit(&1000000000000u64), hex!("1b000000e8d4a51000"));
    assert_eq!(emit(&18446744073709551615u64), hex!("1bffffffffffffffff"));
    assert_eq!(
        emit(&18446744073709551616u128),
        hex!("c249010000000000000000")
    );
    assert_eq!(
        emit(&-18446744073709551616i128),
        hex!("3bffffffffffffffff")
    );
    assert_eq!(
        emit(&-18446744073709551617i128),
        hex!("c349010000000000000000")
    );
    assert_eq!(emit(&-1), hex!("20"));
    assert_eq!(emit(&-10), hex!("29"));
    assert_eq!(emit(&-100), hex!("3863"));
    assert_eq!(emit(&-1000), hex!("3903e7"));
    assert_eq!(emit(&0.0), hex!("f90000"));
    assert_eq!(emit(&-0.0), hex!("f98000"));
    assert_eq!(emit(&1.0), hex!("f93c00"));
    assert_eq!(emit(&1.1), hex!("fb3ff199999999999a"));
    assert_eq!(emit(&1.5), hex!("f93e00"));
    assert_eq!(emit(&65504.0), hex!("f97bff"));
    assert_eq!(emit(&100000.0), hex!("fa47c35000"));
    assert_eq!(emit(&3.4028234663852886e+38), hex!("fa7f7fffff"));
    assert_eq!(emit(&1.0e+300), hex!("fb7e37e43c8800759c"));
    assert_eq!(emit(&5.960464477539063e-8), hex!("f90001"));
    assert_eq!(emit(&0.00006103515625), hex!("f90400"));
    assert_eq!(emit(&-4.0), hex!("f9c400"));
    assert_eq!(emit(&-4.1), hex!("fbc010666666666666"));
    assert_eq!(emit(&half::f16::INFINITY), hex!("f97c00"));
    assert_eq!(emit(&half::f16::NAN), hex!("f97e00"));
    assert_eq!(emit(&half::f16::NEG_INFINITY), hex!("f9fc00"));

    // Wider NaNs and infinities shrink to half precision
    assert_eq!(emit(&f32::NAN), hex!("f97e00"));
    assert_eq!(emit(&f64::NAN), hex!("f97e00"));
    assert_eq!(emit(&f32::INFINITY), hex!("f97c00"));
    assert_eq!(emit(&f32::NEG_INFINITY), hex!("f9fc00"));
    assert_eq!(emit(&f64::INFINITY), hex!("f97c00"));
    assert_eq!(emit(&f64::NEG_INFINITY), hex!("f9fc00"));

    assert_eq!(emit(&false), hex!("f4"));
    assert_eq!(emit(&true), hex!("f5"));
    assert_eq!(emit(&None::<i32>), hex!("f6"));
    assert_eq!(emit(&Value::null()), hex!("f6"));
    assert_eq!(emit(&Value::undefined()), hex!("f7"));
    assert_eq!(emit(&Value::Simple(Simple(16))), hex!("f0"));
    assert_eq!(emit(&Value::Simple(Simple(255))), hex!("f8ff"));
    assert_eq!(
        emit_tagged("2013-03-21T20:04:00Z", 0),
        hex!("c074323031332d30332d32315432303a30343a30305a")
    );
    assert_eq!(emit_tagged(&1363896240, 1), hex!("c11a514b67b0"));
    assert_eq!(emit_tagged(&1363896240.5, 1), hex!("c1fb41d452d9ec200000"));
    assert_eq!(
        emit_tagged(&hex!("01020304"), 23),
        hex!("d74401020304")
    );
    assert_eq!(
        emit_tagged(&hex!("6449455446"), 24),
        hex!("d818456449455446")
    );
    assert_eq!(
        emit_tagged("http://www.example.com", 32),
        hex!("d82076687474703a2f2f7777772e6578616d706c652e636f6d")
    );
    assert_eq!(emit(&ByteBuf::default()), hex!("40"));
    assert_eq!(emit(&hex!("01020304")), hex!("4401020304"));
    assert_eq!(emit(""), hex!("60"));
    assert_eq!(emit("a"), hex!("6161"));
    assert_eq!(emit("IETF"), hex!("6449455446"));
    assert_eq!(emit("\"\\"), hex!("62225c"));
    assert_eq!(emit("\u{00fc}"), hex!("62c3bc"));
    assert_eq!(emit("\u{6c34}"), hex!("63e6b0b4"));
    assert_eq!(
        emit("\u{10151}" /* surrogate pair: \u{d800}\u{dd51} */,),
        hex!("64f0908591")
    );

    let opts = Options::default();
    assert_eq!(emit_array(Some(0), &opts, |_| Ok(())).unwrap(), hex!("80"));
    assert_eq!(emit::<[u16]>(&[]), hex!("80"));
    assert_eq!(
        emit_array(Some(3), &opts, |a| {
            a.emit(&1)?;
            a.emit(&2)?;
            a.emit(&3)
        })
        .unwrap(),
        hex!("83010203")
    );
    assert_eq!(emit(&(1, 2, 3)), hex!("83010203"));
    assert_eq!(emit(&[1, 2, 3][..]), hex!("83010203"));
    assert_eq!(
        emit_array(Some(3), &opts, |a| {
            a.emit(&1)?;
            a.emit_array(Some(2), |a| {
                a.emit(&2)?;
                a.emit(&3)
            })?;
            a.emit_array(Some(2), |a| {
                a.emit(&4)?;
                a.emit(&5)
            })
        })
        .unwrap(),
        hex!("8301820203820405")
    );
    assert_eq!(emit(&(1, &(2, 3), &(4, 5))), hex!("8301820203820405"));
    assert_eq!(emit(&(1, &[2, 3][..], &(4, 5))), hex!("8301820203820405"));
    assert_eq!(
        emit_array(Some(25), &opts, |a| {
            for i in 1..=25 {
                a.emit(&i)?;
            }
            Ok(())
        })
        .unwrap(),
        hex!("98190102030405060708090a0b0c0d0e0f101112131415161718181819")
    );
    assert_eq!(
        emit(&(1..=25).collect::<Vec<u8>>()),
        hex!("98190102030405060708090a0b0c0d0e0f101112131415161718181819")
    );

    assert_eq!(emit_map(Some(0), &opts, |_| Ok(())).unwrap(), hex!("a0"));
    assert_eq!(
        emit_map(Some(2), &opts, |m| {
            m.emit(&1)?;
            m.emit(&2)?;
            m.emit(&3)?;
            m.emit(&4)
        })
        .unwrap(),
        hex!("a201020304")
    );
    assert_eq!(
        emit_map(Some(2), &opts, |m| {
            m.emit("a")?;
            m.emit(&1)?;
            m.emit("b")?;
            m.emit_array(Some(2), |a| {
                a.emit(&2)?;
                a.emit(&3)
            })
        })
        .unwrap(),
        hex!("a26161016162820203")
    );
    assert_eq!(
        emit_array(Some(2), &opts, |a| {
            a.emit("a")?;
            a.emit_map(Some(1), |m| {
                m.emit("b")?;
                m.emit("c")
            })
        })
        .unwrap(),
        hex!("826161a161626163")
    );
    assert_eq!(
        emit(&Value::map([
            (Value::text("a"), Value::text("A")),
            (Value::text("b"), Value::text("B")),
            (Value::text("c"), Value::text("C")),
            (Value::text("d"), Value::text("D")),
            (Value::text("e"), Value::text("E")),
        ])),
        hex!("a56161614161626142616361436164614461656145")
    );
    assert_eq!(
        emit_byte_stream(&opts, |s| {
            s.emit(&hex!("0102"))?;
            s.emit(&hex!("030405"))
        })
        .unwrap(),
        hex!("5f42010243030405ff")
    );
    assert_eq!(
        emit_text_stream(&opts, |s| {
            s.emit("strea")?;
            s.emit("ming")
        })
        .unwrap(),
        hex!("7f657374726561646d696e67ff")
    );
    assert_eq!(emit_array(None, &opts, |_| Ok(())).unwrap(), hex!("9fff"));
    assert_eq!(
        emit_array(None, &opts, |a| {
            a.emit(&1)?;
            a.emit_array(Some(2), |a| {
                a.emit(&2)?;
                a.emit(&3)
            })?;
            a.emit_array(None, |a| {
                a.emit(&4)?;
                a.emit(&5)
            })
        })
        .unwrap(),
        hex!("9f018202039f0405ffff")
    );
    assert_eq!(
        emit_array(None, &opts, |a| {
            a.emit(&1)?;
            a.emit(&(2, 3))?;
            a.emit(&[4, 5][..])
        })
        .unwrap(),
        hex!("9f01820203820405ff")
    );
    assert_eq!(
        emit_array(Some(3), &opts, |a| {
            a.emit(&1)?;
            a.emit(&(2, 3))?;
            a.emit_array(None, |a| {
                a.emit(&4)?;
                a.emit(&5)
            })
        })
        .unwrap(),
        hex!("83018202039f0405ff")
    );
    assert_eq!(
        emit_array(Some(3), &opts, |a| {
            a.emit(&1)?;
            a.emit_array(None, |a| {
                a.emit(&2)?;
                a.emit(&3)
            })?;
            a.emit(&(4, 5))
        })
        .unwrap(),
        hex!("83019f0203ff820405")
    );
    assert_eq!(
        emit_array(None, &opts, |a| {
            for i in 1..=25 {
                a.emit(&i)?;
            }
            Ok(())
        })
        .unwrap(),
        hex!("9f0102030405060708090a0b0c0d0e0f101112131415161718181819ff")
    );
    assert_eq!(
        emit_map(None, &opts, |m| {
            m.emit("a")?;
            m.emit(&1)?;
            m.emit("b")?;
            m.emit_array(None, |a| {
                a.emit(&2)?;
                a.emit(&3)
            })
        })
        .unwrap(),
        hex!("bf61610161629f0203ffff")
    );
    assert_eq!(
        emit_array(Some(2), &opts, |a| {
            a.emit("a")?;
            a.emit_map(None, |m| {
                m.emit("b")?;
                m.emit("c")
            })
        })
        .unwrap(),
        hex!("826161bf61626163ff")
    );
    assert_eq!(
        emit_map(None, &opts, |m| {
            m.emit("Fun")?;
            m.emit(&true)?;
            m.emit("Amt")?;
            m.emit(&-2)
        })
        .unwrap(),
        hex!("bf6346756ef563416d7421ff")
    );
}

#[test]
fn canonical_floats() {
    assert_eq!(emit_canonical(&1.5), hex!("f93e00"));
    assert_eq!(emit_canonical(&(1.0 / 3.0)), hex!("fb3fd5555555555555"));
    assert_eq!(
        emit_canonical(&Value::Float(1.5, FloatWidth::Double)),
        hex!("f93e00")
    );
    assert_eq!(
        emit_canonical(&Value::Float(f64::NAN, FloatWidth::Double)),
        hex!("f97e00")
    );

    // Faithful mode keeps the recorded width when it is lossless
    assert_eq!(
        emit(&Value::Float(1.5, FloatWidth::Double)),
        hex!("fb3ff8000000000000")
    );
    assert_eq!(
        emit(&Value::Float(1.5, FloatWidth::Single)),
        hex!("fa3fc00000")
    );
    assert_eq!(
        emit(&Value::Float(100000.0, FloatWidth::Half)),
        hex!("fa47c35000")
    );
}

#[test]
fn canonical_maps() {
    let map = Value::map([
        (Value::text("b"), Value::uint(1)),
        (Value::text("a"), Value::uint(2)),
    ]);
    assert_eq!(emit(&map), hex!("a2616201616102"));
    assert_eq!(emit_canonical(&map), hex!("a2616102616201"));

    // Shorter encoded keys sort first
    let map = Value::map([
        (Value::text("aa"), Value::uint(1)),
        (Value::text("z"), Value::uint(2)),
        (Value::uint(100), Value::uint(3)),
        (Value::uint(10), Value::uint(4)),
        (Value::int(-1), Value::uint(5)),
    ]);
    assert_eq!(
        emit_canonical(&map),
        hex!("a50a042005186403617a0262616101")
    );

    let dup = Value::map([
        (Value::text("a"), Value::uint(1)),
        (Value::text("a"), Value::uint(2)),
    ]);
    assert_eq!(
        encode(&dup, &Options::canonical()),
        Err(Error::DuplicateKey)
    );
    // Duplicates are only rejected in canonical mode
    assert_eq!(emit(&dup), hex!("a2616101616102"));

    // Arrays keep their order
    assert_eq!(
        emit_canonical(&Value::array([Value::uint(2), Value::uint(1)])),
        hex!("820201")
    );
}

#[test]
fn canonical_streams() {
    let opts = Options::canonical();
    assert_eq!(
        emit_map(Some(2), &opts, |m| {
            m.emit("b")?;
            m.emit(&1)?;
            m.emit("a")?;
            m.emit_array(Some(1), |a| a.emit(&2))
        })
        .unwrap(),
        hex!("a261618102616201")
    );
    assert_eq!(
        emit_map(Some(2), &opts, |m| {
            m.emit("a")?;
            m.emit(&1)?;
            m.emit("a")?;
            m.emit(&2)
        }),
        Err(Error::DuplicateKey)
    );
    assert_eq!(
        emit_array(None, &opts, |_| Ok(())),
        Err(Error::IndefiniteLength)
    );
    assert_eq!(
        emit_text_stream(&opts, |s| s.emit("a")),
        Err(Error::IndefiniteLength)
    );
    assert_eq!(
        emit_array(Some(1), &opts, |a| a.emit_byte_stream(|s| s.emit(&[1u8]))),
        Err(Error::IndefiniteLength)
    );
}

#[test]
fn faithful_metadata() {
    assert_eq!(emit(&Value::UInt(1, Width::Eight)), hex!("1b0000000000000001"));
    assert_eq!(emit_canonical(&Value::UInt(1, Width::Eight)), hex!("01"));
    assert_eq!(emit(&Value::NInt(0, Width::Two)), hex!("390000"));
    assert_eq!(
        emit(&Value::Text("ab".into(), Length::Indefinite)),
        hex!("7f626162ff")
    );
    assert_eq!(
        emit(&Value::Bytes(Vec::new(), Length::Indefinite)),
        hex!("5fff")
    );
    assert_eq!(
        emit_canonical(&Value::Text("ab".into(), Length::Indefinite)),
        hex!("626162")
    );
    assert_eq!(
        emit(&Value::Array(
            alloc::vec![Value::uint(1)],
            Length::Definite(Width::One)
        )),
        hex!("980101")
    );
    assert_eq!(
        emit(&Value::Tag(1, alloc::boxed::Box::new(Value::uint(0)), Width::Two)),
        hex!("d9000100")
    );
}

#[test]
fn sequence_counts() {
    let opts = Options::default();
    assert_eq!(
        emit_array(Some(2), &opts, |a| {
            a.emit(&1)?;
            a.emit(&2)?;
            a.emit(&3)
        }),
        Err(Error::LengthMismatch {
            declared: 2,
            actual: 3
        })
    );
    assert_eq!(
        emit_array(Some(2), &opts, |a| a.emit(&1)),
        Err(Error::LengthMismatch {
            declared: 2,
            actual: 1
        })
    );
    assert_eq!(
        emit_map(Some(1), &opts, |m| m.emit("key")),
        Err(Error::LengthMismatch {
            declared: 1,
            actual: 1
        })
    );

    // A pair count whose item count does not fit in usize
    let mut e = Encoder::new(opts);
    assert_eq!(
        e.emit_map(Some(usize::MAX), |_| Ok(())),
        Err(Error::OutOfRange("map length"))
    );
    assert_eq!(e.offset(), 0);
    assert_eq!(
        emit_map(Some(usize::MAX / 2 + 1), &opts, |_| Ok(())),
        Err(Error::OutOfRange("map length"))
    );
}

#[test]
fn invalid_simple_values() {
    for code in 24..=31 {
        assert_eq!(
            encode(&Value::Simple(Simple(code)), &Options::default()),
            Err(Error::InvalidSimpleValue(code))
        );
    }
}

#[test]
fn output_limit() {
    let v = Value::bytes([0u8; 10]);
    assert_eq!(
        encode(&v, &Options::default().with_max_output_len(5)),
        Err(Error::BufferOverflow(5))
    );
    assert_eq!(
        encode(&v, &Options::default().with_max_output_len(11))
            .unwrap()
            .len(),
        11
    );
}

#[test]
fn depth_guard() {
    let nested = |depth: usize| {
        let mut v = Value::uint(0);
        for _ in 0..depth {
            v = Value::array([v]);
        }
        v
    };
    assert!(encode(&nested(1024), &Options::default()).is_ok());
    assert_eq!(
        encode(&nested(1025), &Options::default()),
        Err(Error::DepthExceeded(1024))
    );
    assert_eq!(
        encode(
            &Value::tag(1, Value::tag(2, Value::uint(0))),
            &Options::default().with_max_depth(1)
        ),
        Err(Error::DepthExceeded(1))
    );
}

#[test]
fn canonical_idempotence() {
    let v = Value::Map(
        alloc::vec![
            (
                Value::Text("zz".into(), Length::Indefinite),
                Value::Float(2.5, FloatWidth::Double),
            ),
            (
                Value::UInt(7, Width::Four),
                Value::Array(
                    alloc::vec![Value::from(-18446744073709551617i128), Value::null()],
                    Length::Indefinite,
                ),
            ),
            (Value::bytes([1u8, 2]), Value::tag(32, Value::text("x"))),
        ],
        Length::Indefinite,
    );
    let opts = Options::canonical();
    let first = encode(&v, &opts).unwrap();
    let (decoded, len) = decode(&first, &opts).unwrap();
    assert_eq!(len, first.len());
    assert_eq!(decoded, v);
    assert_eq!(encode(&decoded, &opts).unwrap(), first);
    assert_eq!(encode(&v.canonicalize().unwrap(), &Options::default()).unwrap(), first);
}
