#![no_main]

use canopy_cbor::{Options, canonical, decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((value, _)) = decode(data, &Options::default()) else {
        return;
    };

    // Faithful re-encoding decodes to the same value
    let faithful = encode(&value, &Options::default()).expect("decoded values re-encode");
    let (again, len) = decode(&faithful, &Options::default()).expect("re-encoded data decodes");
    assert_eq!(len, faithful.len());
    assert_eq!(value, again);

    // Canonical encoding passes the canonical check and is a fixed point
    let Ok(canonical_value) = value.canonicalize() else {
        return;
    };
    let encoded = encode(&canonical_value, &Options::canonical()).expect("canonical encode");
    canonical::check(&encoded, &Options::default()).expect("canonical output is canonical");
    let (reparsed, _) = decode(&encoded, &Options::canonical()).expect("canonical decode");
    assert_eq!(
        encode(&reparsed, &Options::canonical()).expect("canonical re-encode"),
        encoded
    );
});
