// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::{
    decode_all, encode_all, max_compression_level, version, Error, Mode, StreamOptions,
    ZstdStream,
};

fn roundtrip(data: &[u8], level: i32) -> Result<(), String> {
    let mut encoder =
        ZstdStream::encoder(Vec::new(), level).map_err(|e| format!("open error: {}", e))?;
    encoder
        .write_all(data)
        .map_err(|e| format!("write error: {}", e))?;
    let compressed = encoder
        .finish()
        .map_err(|e| format!("close error: {}", e))?;

    let mut decoder =
        ZstdStream::decoder(&compressed[..]).map_err(|e| format!("open error: {}", e))?;
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| format!("read error: {}", e))?;

    if decoded != data {
        return Err(format!(
            "roundtrip mismatch at level {}: original len={}, decoded len={}",
            level,
            data.len(),
            decoded.len()
        ));
    }
    Ok(())
}

fn pseudo_random(len: usize, seed: u64) -> Vec<u8> {
    // Simple LCG for reproducible data
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 32) as u8
        })
        .collect()
}

fn expect_adapter_error(err: &io::Error) -> &Error {
    Error::downcast_io(err).expect("io::Error should carry an adapter error")
}

#[test]
fn test_hello_roundtrip() {
    let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
    encoder.write_all(b"hello").unwrap();
    encoder.flush().unwrap();
    let compressed = encoder.finish().unwrap();
    assert!(!compressed.is_empty());

    let mut decoder = ZstdStream::decoder(&compressed[..]).unwrap();
    let mut byte = [0u8; 1];
    assert_eq!(decoder.read(&mut byte).unwrap(), 1);
    assert_eq!(&byte, b"h");

    let mut rest = Vec::new();
    decoder.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"ello");
}

#[test]
fn test_empty() {
    roundtrip(&[], 3).unwrap();
}

#[test]
fn test_levels() {
    let data = b"compressible text compressible text compressible text ".repeat(100);
    for level in [1, 3, 9, 19] {
        roundtrip(&data, level).unwrap();
    }
    roundtrip(&data, -5).unwrap();
}

#[test]
fn test_random_data() {
    for (len, seed) in [(1, 1), (100, 2), (65_537, 3), (300_000, 4)] {
        roundtrip(&pseudo_random(len, seed), 3).unwrap();
    }
}

#[test]
fn test_close_is_idempotent() {
    let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
    encoder.write_all(b"payload").unwrap();
    encoder.close().unwrap();
    assert!(encoder.is_closed());
    encoder.close().unwrap();

    let mut decoder = ZstdStream::decoder(&b""[..]).unwrap();
    decoder.close().unwrap();
    decoder.close().unwrap();
}

#[test]
fn test_leave_open_keeps_inner() {
    let options = StreamOptions::default().leave_open(true);
    let mut encoder = ZstdStream::encoder_with_options(Vec::new(), options).unwrap();
    encoder.write_all(b"kept").unwrap();
    encoder.close().unwrap();

    let compressed = encoder.get_ref().unwrap().clone();
    assert_eq!(decode_all(&compressed).unwrap(), b"kept");
    assert!(encoder.into_inner().is_some());
}

#[test]
fn test_close_releases_inner() {
    let mut sink = Vec::new();
    {
        let mut encoder = ZstdStream::encoder(&mut sink, 3).unwrap();
        encoder.write_all(b"released").unwrap();
        encoder.close().unwrap();
        assert!(encoder.get_ref().is_none());
        assert!(encoder.into_inner().is_none());
    }
    assert_eq!(decode_all(&sink).unwrap(), b"released");
}

#[test]
fn test_unsupported_operations() {
    let mut stream = ZstdStream::new(Cursor::new(Vec::new()), Mode::Compress).unwrap();
    assert!(!stream.can_seek());

    let err = stream.seek(SeekFrom::Start(0)).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    assert!(matches!(stream.len(), Err(Error::Unsupported(_))));
    assert!(matches!(stream.set_len(10), Err(Error::Unsupported(_))));
    assert!(matches!(stream.position(), Err(Error::Unsupported(_))));

    let mut buf = [0u8; 16];
    let err = stream.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    assert!(matches!(
        expect_adapter_error(&err),
        Error::Unsupported(_)
    ));
}

#[test]
fn test_write_in_decode_mode_leaves_inner_untouched() {
    let compressed = encode_all(b"untouched", 3).unwrap();
    let mut stream =
        ZstdStream::new(Cursor::new(compressed.clone()), Mode::Decompress).unwrap();

    let err = stream.write(b"nope").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::Unsupported);

    let inner = stream.get_ref().unwrap();
    assert_eq!(inner.position(), 0);
    assert_eq!(inner.get_ref(), &compressed);

    let mut plain = Vec::new();
    stream.read_to_end(&mut plain).unwrap();
    assert_eq!(plain, b"untouched");
}

#[test]
fn test_capabilities() {
    let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
    assert_eq!(encoder.mode(), Mode::Compress);
    assert!(encoder.can_write());
    assert!(!encoder.can_read());
    assert!(!encoder.leave_open());
    encoder.close().unwrap();
    assert!(!encoder.can_write());

    let decoder = ZstdStream::decoder(&b""[..]).unwrap();
    assert_eq!(decoder.mode(), Mode::Decompress);
    assert!(decoder.can_read());
    assert!(!decoder.can_write());
}

#[test]
fn test_corrupt_input() {
    let mut decoder = ZstdStream::decoder(&b"this is not a zstd frame at all"[..]).unwrap();
    let mut out = Vec::new();
    let err = decoder.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    match expect_adapter_error(&err) {
        Error::Codec { code, message } => {
            assert!(code.is_some());
            assert!(!message.is_empty());
        }
        other => panic!("expected codec error, got {:?}", other),
    }
}

#[test]
fn test_io_after_close() {
    let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
    encoder.close().unwrap();
    let err = encoder.write(b"late").unwrap_err();
    assert!(matches!(expect_adapter_error(&err), Error::Closed));
    let err = encoder.flush().unwrap_err();
    assert!(matches!(expect_adapter_error(&err), Error::Closed));

    let compressed = encode_all(b"abc", 3).unwrap();
    let mut decoder = ZstdStream::decoder(&compressed[..]).unwrap();
    decoder.close().unwrap();
    let err = decoder.read(&mut [0u8; 4]).unwrap_err();
    assert!(matches!(expect_adapter_error(&err), Error::Closed));
}

#[test]
fn test_multiple_frames() {
    let parts: [&[u8]; 4] = [b"alpha ", b"beta ", b"", b"gamma"];
    let mut stream = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        stream.extend(encode_all(part, i as i32 + 1).unwrap());
    }

    let mut decoder = ZstdStream::decoder(&stream[..]).unwrap();
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"alpha beta gamma");
}

#[test]
fn test_checksum_option() {
    let data = b"checksummed content ".repeat(64);
    let plain = encode_all(&data, 3).unwrap();

    let options = StreamOptions::default().checksum(true);
    let mut encoder = ZstdStream::encoder_with_options(Vec::new(), options).unwrap();
    encoder.write_all(&data).unwrap();
    let mut checked = encoder.finish().unwrap();

    // The content checksum is a 4-byte frame trailer
    assert_eq!(checked.len(), plain.len() + 4);
    assert_eq!(decode_all(&checked).unwrap(), data);

    let last = checked.len() - 1;
    checked[last] ^= 0xff;
    let err = decode_all(&checked).unwrap_err();
    assert!(matches!(err, Error::Codec { .. }));
}

#[test]
fn test_level_change_after_first_write_is_ignored() {
    let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
    encoder.set_compression_level(1);
    assert_eq!(encoder.compression_level(), 1);

    encoder.write_all(b"level fixed by the first write").unwrap();
    encoder.set_compression_level(19);
    assert_eq!(encoder.compression_level(), 1);

    let compressed = encoder.finish().unwrap();
    assert_eq!(compressed, encode_all(b"level fixed by the first write", 1).unwrap());
}

#[test]
fn test_finish_returns_inner_for_decoder() {
    let compressed = encode_all(b"xyz", 3).unwrap();
    let mut source = &compressed[..];
    let mut decoder = ZstdStream::decoder(&mut source).unwrap();
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    let rest = decoder.finish().unwrap();
    assert!(rest.is_empty());
}

#[test]
fn test_drop_without_close_leaves_frame_open() {
    let mut sink = Vec::new();
    {
        let mut encoder = ZstdStream::encoder(&mut sink, 3).unwrap();
        encoder.write_all(&pseudo_random(400_000, 7)).unwrap();
    }

    // Disposal releases the session but does not terminate the frame
    let mut decoder = ZstdStream::decoder(&sink[..]).unwrap();
    let mut out = Vec::new();
    let err = decoder.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn test_static_properties() {
    let v = version();
    assert!(v.major >= 1);
    assert_eq!(ZstdStream::<Vec<u8>>::version(), v);
    assert!(max_compression_level() >= 19);
    assert_eq!(
        ZstdStream::<Vec<u8>>::max_compression_level(),
        max_compression_level()
    );
}
