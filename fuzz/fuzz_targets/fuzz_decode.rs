#![no_main]
use ighw_rs::Codec;
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes must decode or fail with an error, never panic.
fuzz_target!(|data: &[u8]| {
    let _ = Codec::new().decode(data);
});
