#![no_main]
use ighw_rs::Codec;
use libfuzzer_sys::fuzz_target;

// Whatever decodes must encode, and the result must decode again.
fuzz_target!(|data: &[u8]| {
    let codec = Codec::new();
    let Ok((level, _)) = codec.decode(data) else {
        return;
    };
    let (bytes, _) = codec.encode(&level).expect("decoded level failed to encode");
    codec.decode(&bytes).expect("encoded level failed to decode");
});
