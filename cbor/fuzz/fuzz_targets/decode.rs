#![no_main]

use canopy_cbor::{Options, decode::parse_sequence};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(items) = parse_sequence(data, &Options::default()) {
        for item in items {
            _ = format!("{item:?} {item}");
        }
    }
    _ = canopy_cbor::decode(data, &Options::canonical());
});
