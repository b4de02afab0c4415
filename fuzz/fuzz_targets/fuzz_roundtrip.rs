#![no_main]

use libfuzzer_sys::fuzz_target;
use zstream::{decode_all, encode_all};

fuzz_target!(|data: &[u8]| {
    // Skip very large inputs to avoid OOM
    if data.len() > 1_000_000 {
        return;
    }

    for level in [1, 3, 9] {
        let compressed = encode_all(data, level).expect("encode failed");
        let decompressed = decode_all(&compressed).expect("decode failed");
        assert_eq!(data, &decompressed[..], "level {} roundtrip failed", level);
    }
});
