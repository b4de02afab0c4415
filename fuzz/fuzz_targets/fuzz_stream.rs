#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::{Read, Write};
use zstream::{decode_all, ZstdStream};

fuzz_target!(|data: &[u8]| {
    // Skip very large inputs
    if data.len() < 2 || data.len() > 1_000_000 {
        return;
    }

    // The first byte picks the write and read sizes
    let piece = (data[0] as usize % 64) + 1;
    let payload = &data[1..];

    let mut writer = ZstdStream::encoder(Vec::new(), 3).expect("open failed");
    for (i, chunk) in payload.chunks(piece).enumerate() {
        writer.write_all(chunk).expect("write failed");
        if i % 7 == 3 {
            writer.flush().expect("flush failed");
        }
    }
    let compressed = writer.finish().expect("close failed");
    assert_eq!(decode_all(&compressed).expect("decode failed"), payload);

    let mut reader = ZstdStream::decoder(&compressed[..]).expect("open failed");
    let mut decompressed = Vec::new();
    let mut buf = vec![0u8; piece];
    loop {
        let n = reader.read(&mut buf).expect("read failed");
        if n == 0 {
            break;
        }
        decompressed.extend_from_slice(&buf[..n]);
    }
    assert_eq!(decompressed, payload);

    // Reading arbitrary data as a stream must not panic either
    let mut reader = ZstdStream::decoder(data).expect("open failed");
    let mut sink = Vec::new();
    let _ = reader.read_to_end(&mut sink);
});
