// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decode pipeline: pull compressed bytes, hand out plaintext

use std::io::{self, Read};

use tracing::trace;

use crate::constants::MAX_STALLED_CALLS;
use crate::engine::{Engine, InDescriptor, Mode, OutDescriptor};
use crate::error::{Error, Result};
use crate::stream::CodecStream;

/// Bookkeeping for the staged compressed input.
///
/// `position <= size` always holds; bytes in `position..size` are staged
/// but not yet consumed by the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub position: usize,
    pub size: usize,
    /// The source returned zero bytes
    pub exhausted: bool,
    /// Staged input was just loaded; drain the engine before reading more
    pub skip_refill: bool,
    /// Input of an unfinished frame has been consumed
    pub frame_open: bool,
}

impl Cursor {
    fn unconsumed(&self) -> usize {
        self.size - self.position
    }
}

impl<S: Read, E: Engine> CodecStream<S, E> {
    fn decode_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require(Mode::Decompress, "read in compress mode")?;
        if buf.is_empty() {
            return Ok(0);
        }

        let CodecStream {
            inner,
            options,
            session,
            staging,
            cursor,
            ..
        } = self;
        let (Some(inner), Some(session), Some(staging)) =
            (inner.as_mut(), session.as_mut(), staging.as_mut())
        else {
            return Err(Error::Closed);
        };
        session.ensure_initialized(options.level, options.checksum)?;
        let refill_len = session.input_chunk().min(staging.len());

        let mut produced_total = 0;
        let mut stalls = 0;
        while produced_total < buf.len() {
            if cursor.unconsumed() == 0 && !cursor.exhausted && !cursor.skip_refill {
                let n = inner.read(&mut staging[..refill_len])?;
                trace!(bytes = n, "refilled staging buffer");
                *cursor = Cursor {
                    position: 0,
                    size: n,
                    exhausted: n == 0,
                    skip_refill: true,
                    frame_open: cursor.frame_open,
                };
            }

            let mut input = if cursor.unconsumed() == 0 {
                InDescriptor::empty()
            } else {
                InDescriptor::new(&staging[cursor.position..cursor.size])
            };
            let mut output = OutDescriptor::new(&mut buf[produced_total..]);
            let hint = session.decompress(&mut output, &mut input)?;
            let (consumed, produced) = (input.pos(), output.pos());

            if hint == 0 {
                cursor.frame_open = false;
            } else if consumed > 0 {
                cursor.frame_open = true;
            }

            if consumed == 0 && produced == 0 && !input.is_empty() {
                stalls += 1;
                if stalls > MAX_STALLED_CALLS {
                    return Err(Error::Stalled(stalls));
                }
            } else {
                stalls = 0;
            }

            if produced == 0 {
                if cursor.exhausted {
                    // Hand out what we have; the next read reports the truncation
                    if cursor.frame_open && produced_total == 0 {
                        return Err(Error::UnexpectedEof);
                    }
                    break;
                }
                cursor.skip_refill = false;
            }

            produced_total += produced;
            cursor.position += consumed;
        }

        Ok(produced_total)
    }
}

impl<S: Read, E: Engine> Read for CodecStream<S, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.decode_into(buf)?)
    }
}
