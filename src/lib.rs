// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! # zstream
//!
//! A byte-stream adapter over a chunked streaming compression engine.
//! Wrap any `Read` to decompress from it, or any `Write` to compress into it.
//! The default engine is libzstd.
//!
//! zstream provides:
//! - `Read`/`Write` adapters that stream through fixed-size staging buffers
//! - Explicit close that terminates the frame and reports failures
//! - Flush points that make everything written so far decodable
//! - Pooled staging buffers shared across streams
//!
//! ## Stream Example
//!
//! ```rust
//! use std::io::{Read, Write};
//! use zstream::ZstdStream;
//!
//! let data = b"Hello, World! This is a test of zstd streaming.";
//!
//! let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
//! encoder.write_all(data).unwrap();
//! let compressed = encoder.finish().unwrap();
//!
//! let mut decoder = ZstdStream::decoder(&compressed[..]).unwrap();
//! let mut decompressed = Vec::new();
//! decoder.read_to_end(&mut decompressed).unwrap();
//! assert_eq!(data, &decompressed[..]);
//! ```

mod bulk;
mod constants;
mod engine;
mod error;
mod pool;
mod reader;
mod session;
mod stream;
mod writer;
mod zstd;

pub use bulk::{compress, decode_all, decompress, encode_all};
pub use constants::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_POOLED, FILE_EXTENSION, MAX_STALLED_CALLS,
};
pub use engine::{Engine, ErrorCode, InDescriptor, Mode, OutDescriptor, Status, Version};
pub use error::{Error, Result};
pub use pool::{BufferPool, PoolConfig, PoolStats, PooledBuffer};
pub use stream::{CodecStream, StreamOptions, ZstdStream};
pub use zstd::ZstdEngine;

/// Version of the linked libzstd
pub fn version() -> Version {
    ZstdEngine::version()
}

/// Highest compression level libzstd accepts
pub fn max_compression_level() -> i32 {
    ZstdEngine::max_level()
}

#[cfg(test)]
mod tests;
