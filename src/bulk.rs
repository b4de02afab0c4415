// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Whole-stream helpers built on [`ZstdStream`]

use std::io::{self, Read, Write};

use crate::error::Result;
use crate::stream::ZstdStream;

/// Compress everything from `reader` into `writer` as one zstd frame.
/// Returns the number of plaintext bytes read.
pub fn compress<R, W>(mut reader: R, writer: W, level: i32) -> Result<u64>
where
    R: Read,
    W: Write,
{
    let mut encoder = ZstdStream::encoder(writer, level)?;
    let copied = io::copy(&mut reader, &mut encoder)?;
    encoder.close()?;
    Ok(copied)
}

/// Decompress every frame from `reader` into `writer`.
/// Returns the number of plaintext bytes written.
pub fn decompress<R, W>(reader: R, mut writer: W) -> Result<u64>
where
    R: Read,
    W: Write,
{
    let mut decoder = ZstdStream::decoder(reader)?;
    let copied = io::copy(&mut decoder, &mut writer)?;
    decoder.close()?;
    Ok(copied)
}

/// Compress a buffer into a single zstd frame
///
/// # Example
///
/// ```
/// let compressed = zstream::encode_all(b"hello", 3).unwrap();
/// assert_eq!(zstream::decode_all(&compressed).unwrap(), b"hello");
/// ```
pub fn encode_all(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut encoder = ZstdStream::encoder(Vec::new(), level)?;
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a buffer holding one or more zstd frames
pub fn decode_all(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZstdStream::decoder(data)?;
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
