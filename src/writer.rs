// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Encode pipeline and the flush/close drain

use std::io::{self, Write};

use crate::constants::MAX_STALLED_CALLS;
use crate::engine::{Engine, InDescriptor, Mode, OutDescriptor};
use crate::error::{Error, Result};
use crate::stream::CodecStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Flush,
    End,
}

impl<S: Write, E: Engine> CodecStream<S, E> {
    fn encode_from(&mut self, buf: &[u8]) -> Result<()> {
        self.require(Mode::Compress, "write in decompress mode")?;
        if buf.is_empty() {
            return Ok(());
        }

        let CodecStream {
            inner,
            options,
            session,
            staging,
            ..
        } = self;
        let (Some(inner), Some(session), Some(staging)) =
            (inner.as_mut(), session.as_mut(), staging.as_mut())
        else {
            return Err(Error::Closed);
        };
        session.ensure_initialized(options.level, options.checksum)?;
        let chunk = session.input_chunk();

        let mut consumed_total = 0;
        let mut stalls = 0;
        while consumed_total < buf.len() {
            let end = buf.len().min(consumed_total + chunk);
            let mut input = InDescriptor::new(&buf[consumed_total..end]);
            let mut output = OutDescriptor::new(&mut staging[..]);
            session.compress(&mut output, &mut input)?;
            let (consumed, produced) = (input.pos(), output.pos());

            if produced > 0 {
                inner.write_all(&staging[..produced])?;
            }

            if consumed == 0 && produced == 0 {
                stalls += 1;
                if stalls > MAX_STALLED_CALLS {
                    return Err(Error::Stalled(stalls));
                }
            } else {
                stalls = 0;
            }
            consumed_total += consumed;
        }

        Ok(())
    }

    /// Call flush-chunk or end-chunk until the engine reports nothing pending,
    /// writing every piece to the inner stream as it comes out
    fn drain(&mut self, phase: Drain) -> Result<()> {
        let CodecStream {
            inner,
            session,
            staging,
            ..
        } = self;
        let (Some(inner), Some(session), Some(staging)) =
            (inner.as_mut(), session.as_mut(), staging.as_mut())
        else {
            return Err(Error::Closed);
        };

        let mut stalls = 0;
        loop {
            let mut output = OutDescriptor::new(&mut staging[..]);
            let pending = match phase {
                Drain::Flush => session.flush(&mut output)?,
                Drain::End => session.end(&mut output)?,
            };
            let produced = output.pos();

            if produced > 0 {
                inner.write_all(&staging[..produced])?;
            }
            if pending == 0 {
                return Ok(());
            }

            if produced == 0 {
                stalls += 1;
                if stalls > MAX_STALLED_CALLS {
                    return Err(Error::Stalled(stalls));
                }
            } else {
                stalls = 0;
            }
        }
    }

    fn flush_frame(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.mode != Mode::Compress {
            return Ok(());
        }

        // Nothing was ever written: no frame to flush yet
        if self.session.as_ref().is_some_and(|s| s.is_initialized()) {
            self.drain(Drain::Flush)?;
        }
        match self.inner.as_mut() {
            Some(inner) => Ok(inner.flush()?),
            None => Err(Error::Closed),
        }
    }
}

/// Flush pending data, terminate the frame and flush the inner writer.
///
/// Runs as the first half of `close` for compressing streams. A stream that
/// never saw a write is initialized here so it still emits an empty frame.
pub(crate) fn finish_frame<S: Write, E: Engine>(stream: &mut CodecStream<S, E>) -> Result<()> {
    let level = stream.options.level;
    let checksum = stream.options.checksum;
    match stream.session.as_mut() {
        Some(session) => session.ensure_initialized(level, checksum)?,
        None => return Err(Error::Closed),
    }

    stream.drain(Drain::Flush)?;
    stream.drain(Drain::End)?;
    match stream.inner.as_mut() {
        Some(inner) => Ok(inner.flush()?),
        None => Err(Error::Closed),
    }
}

impl<S: Write, E: Engine> Write for CodecStream<S, E> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encode_from(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_frame()?)
    }
}
