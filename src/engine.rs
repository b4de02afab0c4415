// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Boundary to the native streaming codec
//!
//! An [`Engine`] is one codec session. It only ever sees borrowed views of
//! the caller's memory, wrapped in [`InDescriptor`] and [`OutDescriptor`],
//! and reports how far it got by advancing their positions. Those borrows
//! last for exactly one call, so nothing the engine touches can move or be
//! freed while it runs.

use std::fmt;

use crate::constants::DEFAULT_COMPRESSION_LEVEL;

/// Direction a session runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Plaintext is written in, compressed bytes go to the inner stream
    Compress,
    /// Compressed bytes come from the inner stream, plaintext is read out
    Decompress,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Compress => write!(f, "compress"),
            Mode::Decompress => write!(f, "decompress"),
        }
    }
}

/// Engine-specific error code
pub type ErrorCode = usize;

/// Outcome of one engine call.
///
/// `Ok` carries the engine's progress hint (for flush and end: bytes still
/// pending, zero once drained). `Err` means the engine flagged the code as
/// an error.
pub type Status = std::result::Result<usize, ErrorCode>;

/// Input side of a transfer: bytes offered to the engine and how many it took
#[derive(Debug)]
pub struct InDescriptor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> InDescriptor<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        InDescriptor { src, pos: 0 }
    }

    /// An input with nothing in it, used once the source is exhausted
    pub fn empty() -> Self {
        InDescriptor { src: &[], pos: 0 }
    }

    /// Bytes consumed so far
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        &self.src[self.pos..]
    }

    /// Mark `n` more bytes as consumed
    ///
    /// # Panics
    /// Panics if that would move past the end of the input
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.src.len() - self.pos, "input advanced past end");
        self.pos += n;
    }
}

/// Output side of a transfer: space offered to the engine and how much it filled
#[derive(Debug)]
pub struct OutDescriptor<'a> {
    dst: &'a mut [u8],
    pos: usize,
}

impl<'a> OutDescriptor<'a> {
    pub fn new(dst: &'a mut [u8]) -> Self {
        OutDescriptor { dst, pos: 0 }
    }

    /// Bytes produced so far
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn capacity(&self) -> usize {
        self.dst.len()
    }

    /// The produced bytes
    pub fn written(&self) -> &[u8] {
        &self.dst[..self.pos]
    }

    /// Space the engine may still fill
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.dst[self.pos..]
    }

    /// Mark `n` more bytes as produced
    ///
    /// # Panics
    /// Panics if that would move past the end of the buffer
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.dst.len() - self.pos, "output advanced past end");
        self.pos += n;
    }
}

/// Library version of a linked engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Decode zstd-style packed versions (`major * 10000 + minor * 100 + patch`)
    pub fn from_number(number: u32) -> Self {
        Version {
            major: number / 10_000,
            minor: (number / 100) % 100,
            patch: number % 100,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A streaming codec session.
///
/// Dropping the value destroys the native session. Chunk operations are
/// only called once [`Engine::init`] has succeeded, and only those matching
/// the mode the session was created for.
pub trait Engine: Sized {
    /// Create a session for `mode`, or `None` if the engine could not allocate one
    fn create(mode: Mode) -> Option<Self>;

    /// Input size the engine prefers per call in `mode`
    fn input_chunk_size(mode: Mode) -> usize;

    /// Output size the engine prefers per call in `mode`
    fn output_chunk_size(mode: Mode) -> usize;

    /// Start (or restart) the session; `level` only matters when compressing
    fn init(&mut self, level: i32) -> Status;

    /// Ask the compressor to append a content checksum to each frame
    fn enable_checksum(&mut self) -> Status {
        Ok(0)
    }

    fn compress_chunk(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Status;

    fn decompress_chunk(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Status;

    /// Emit buffered compressed data; returns bytes still pending
    fn flush_chunk(&mut self, output: &mut OutDescriptor<'_>) -> Status;

    /// Emit buffered data and terminate the frame; returns bytes still pending
    fn end_chunk(&mut self, output: &mut OutDescriptor<'_>) -> Status;

    /// Human-readable diagnostic for an error code
    fn error_message(code: ErrorCode) -> String;

    fn version() -> Version;

    fn min_level() -> i32;

    fn max_level() -> i32;

    fn default_level() -> i32 {
        DEFAULT_COMPRESSION_LEVEL
    }
}
