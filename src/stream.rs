// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The byte-stream adapter

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use crate::constants::DEFAULT_COMPRESSION_LEVEL;
use crate::engine::{Engine, Mode, Version};
use crate::error::{Error, Result};
use crate::pool::{BufferPool, PooledBuffer};
use crate::reader::Cursor;
use crate::session::Session;
use crate::writer::finish_frame;
use crate::zstd::ZstdEngine;

/// Options fixed when a stream is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Keep the inner stream alive when the adapter is closed
    pub leave_open: bool,
    /// Compression level; ignored when decompressing
    pub level: i32,
    /// Append a content checksum to each compressed frame
    pub checksum: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            leave_open: false,
            level: DEFAULT_COMPRESSION_LEVEL,
            checksum: false,
        }
    }
}

impl StreamOptions {
    pub fn leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }
}

/// Terminates the frame on close; only set for streams that can write
type DrainFn<S, E> = fn(&mut CodecStream<S, E>) -> Result<()>;

/// CodecStream adapts a chunked streaming codec to `Read` and `Write`.
///
/// In [`Mode::Decompress`] the stream pulls compressed bytes from the inner
/// reader and hands out plaintext through `Read`. In [`Mode::Compress`]
/// plaintext goes in through `Write` and compressed bytes are written to
/// the inner writer as soon as the engine produces them.
///
/// Call [`close`](CodecStream::close) (or [`finish`](CodecStream::finish))
/// to end a compressed frame. Dropping an encoder without closing it
/// releases the session but leaves the frame unterminated.
///
/// # Example
///
/// ```
/// use std::io::{Read, Write};
/// use zstream::ZstdStream;
///
/// let mut encoder = ZstdStream::encoder(Vec::new(), 3).unwrap();
/// encoder.write_all(b"Hello, World!").unwrap();
/// let compressed = encoder.finish().unwrap();
///
/// let mut decoder = ZstdStream::decoder(&compressed[..]).unwrap();
/// let mut plain = Vec::new();
/// decoder.read_to_end(&mut plain).unwrap();
/// assert_eq!(plain, b"Hello, World!");
/// ```
pub struct CodecStream<S, E: Engine = ZstdEngine> {
    pub(crate) inner: Option<S>,
    pub(crate) mode: Mode,
    pub(crate) options: StreamOptions,
    pub(crate) session: Option<Session<E>>,
    pub(crate) staging: Option<PooledBuffer<'static>>,
    pub(crate) cursor: Cursor,
    drain: Option<DrainFn<S, E>>,
    closed: bool,
    disposed: bool,
}

/// CodecStream over libzstd
pub type ZstdStream<S> = CodecStream<S, ZstdEngine>;

impl<S, E: Engine> CodecStream<S, E> {
    fn open(
        inner: S,
        mode: Mode,
        options: StreamOptions,
        drain: Option<DrainFn<S, E>>,
    ) -> Result<Self> {
        let session = Session::<E>::create(mode)?;
        let staging = BufferPool::shared().rent(session.staging_len());
        debug!(%mode, leave_open = options.leave_open, "opened stream");

        Ok(CodecStream {
            inner: Some(inner),
            mode,
            options,
            session: Some(session),
            staging: Some(staging),
            cursor: Cursor::default(),
            drain,
            closed: false,
            disposed: false,
        })
    }

    /// The mode the stream was opened in
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn can_read(&self) -> bool {
        self.mode == Mode::Decompress && !self.is_closed()
    }

    pub fn can_write(&self) -> bool {
        self.mode == Mode::Compress && !self.is_closed()
    }

    /// Compressed streams are never seekable
    pub fn can_seek(&self) -> bool {
        false
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.disposed
    }

    pub fn leave_open(&self) -> bool {
        self.options.leave_open
    }

    pub fn compression_level(&self) -> i32 {
        self.options.level
    }

    /// Change the compression level. Only takes effect before the first write;
    /// the level is validated when the session is initialized. Once the
    /// session has started the call is ignored and
    /// [`compression_level`](Self::compression_level) keeps reporting the
    /// level in use.
    pub fn set_compression_level(&mut self, level: i32) {
        if self.session.as_ref().is_some_and(|s| s.is_initialized()) {
            warn!(
                level,
                active = self.options.level,
                "compression level changed after the session started; ignored"
            );
            return;
        }
        self.options.level = level;
    }

    /// Length is unknown for a compressed stream
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Result<u64> {
        Err(Error::Unsupported("length"))
    }

    pub fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::Unsupported("set length"))
    }

    pub fn position(&self) -> Result<u64> {
        Err(Error::Unsupported("position"))
    }

    /// Reference to the inner stream, `None` once closing released it
    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.inner.as_mut()
    }

    /// Tear the adapter down without closing the frame and hand back the inner stream
    pub fn into_inner(mut self) -> Option<S> {
        let inner = self.inner.take();
        self.dispose();
        inner
    }

    /// Version of the engine this stream type is linked against
    pub fn version() -> Version {
        E::version()
    }

    /// Highest compression level the engine accepts
    pub fn max_compression_level() -> i32 {
        E::max_level()
    }

    /// Gracefully close the stream.
    ///
    /// When compressing, pending data is flushed, the frame is terminated
    /// and the inner writer is flushed. The session is always released, even
    /// if that sequence fails, and the inner stream is dropped unless the
    /// stream was opened with `leave_open`. Any error from the drain is
    /// returned after teardown. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        let drained = match (self.mode, self.drain) {
            (Mode::Compress, Some(drain)) => drain(self),
            _ => Ok(()),
        };

        self.closed = true;
        self.teardown();
        if !self.options.leave_open {
            drop(self.inner.take());
        }

        match &drained {
            Ok(()) => debug!(mode = %self.mode, "closed stream"),
            Err(e) => warn!(mode = %self.mode, error = %e, "stream closed after a failed drain"),
        }
        drained
    }

    /// Close the stream and return the inner stream regardless of `leave_open`
    pub fn finish(mut self) -> Result<S> {
        self.options.leave_open = true;
        self.close()?;
        self.inner.take().ok_or(Error::Closed)
    }

    /// Release the session and staging buffer. Safe to call repeatedly.
    fn teardown(&mut self) {
        self.session = None;
        self.staging = None;
    }

    /// Best-effort cleanup for a stream that was never closed
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if self.closed {
            return;
        }

        let started = self.session.as_ref().is_some_and(|s| s.is_initialized());
        if self.mode == Mode::Compress && started {
            warn!("encoder dropped without close; frame left unterminated");
        }
        self.closed = true;
        self.teardown();
        if !self.options.leave_open {
            drop(self.inner.take());
        }
        debug!(mode = %self.mode, "disposed stream");
    }

    /// Fail unless the stream is open and in `mode`
    pub(crate) fn require(&self, mode: Mode, operation: &'static str) -> Result<()> {
        if self.mode != mode {
            return Err(Error::Unsupported(operation));
        }
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl<S: Write, E: Engine> CodecStream<S, E> {
    /// Open a compressing stream at `level`
    pub fn encoder(inner: S, level: i32) -> Result<Self> {
        Self::encoder_with_options(inner, StreamOptions::default().level(level))
    }

    pub fn encoder_with_options(inner: S, options: StreamOptions) -> Result<Self> {
        Self::open(inner, Mode::Compress, options, Some(finish_frame::<S, E>))
    }
}

impl<S: Read, E: Engine> CodecStream<S, E> {
    /// Open a decompressing stream
    pub fn decoder(inner: S) -> Result<Self> {
        Self::decoder_with_options(inner, StreamOptions::default())
    }

    pub fn decoder_with_options(inner: S, options: StreamOptions) -> Result<Self> {
        Self::open(inner, Mode::Decompress, options, None)
    }
}

impl<S: Read + Write, E: Engine> CodecStream<S, E> {
    /// Open a stream in either mode over a bidirectional inner stream
    pub fn new(inner: S, mode: Mode) -> Result<Self> {
        Self::with_options(inner, mode, StreamOptions::default())
    }

    pub fn with_options(inner: S, mode: Mode, options: StreamOptions) -> Result<Self> {
        match mode {
            Mode::Compress => Self::encoder_with_options(inner, options),
            Mode::Decompress => Self::decoder_with_options(inner, options),
        }
    }
}

impl<S, E: Engine> Seek for CodecStream<S, E> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(Error::Unsupported("seek").into())
    }
}

impl<S, E: Engine> Drop for CodecStream<S, E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
