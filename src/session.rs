// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use tracing::{debug, trace};

use crate::engine::{Engine, InDescriptor, Mode, OutDescriptor};
use crate::error::{check, Error, Result};

/// An engine session plus the facts the pipelines need about it.
///
/// Initialization is deferred until the first chunk operation so the
/// compression level can still change after construction. Dropping the
/// session destroys the engine handle.
pub(crate) struct Session<E: Engine> {
    engine: E,
    mode: Mode,
    input_chunk: usize,
    output_chunk: usize,
    initialized: bool,
}

impl<E: Engine> Session<E> {
    pub(crate) fn create(mode: Mode) -> Result<Self> {
        let engine = E::create(mode)
            .ok_or_else(|| Error::codec(None, format!("failed to create {} session", mode)))?;
        let session = Session {
            engine,
            mode,
            input_chunk: E::input_chunk_size(mode).max(1),
            output_chunk: E::output_chunk_size(mode).max(1),
            initialized: false,
        };
        debug!(
            %mode,
            input_chunk = session.input_chunk,
            output_chunk = session.output_chunk,
            "created codec session"
        );
        Ok(session)
    }

    pub(crate) fn input_chunk(&self) -> usize {
        self.input_chunk
    }

    /// Length of the staging buffer: input staging when decoding, output
    /// staging when encoding
    pub(crate) fn staging_len(&self) -> usize {
        match self.mode {
            Mode::Compress => self.output_chunk,
            Mode::Decompress => self.input_chunk,
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Prime the session on first use. Never re-enters once it succeeded.
    pub(crate) fn ensure_initialized(&mut self, level: i32, checksum: bool) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if self.mode == Mode::Compress {
            let (min, max) = (E::min_level(), E::max_level());
            if !(min..=max).contains(&level) {
                return Err(Error::InvalidArgument(format!(
                    "compression level {} outside {}..={}",
                    level, min, max
                )));
            }
        }

        check::<E>(self.engine.init(level))?;
        if self.mode == Mode::Compress && checksum {
            check::<E>(self.engine.enable_checksum())?;
        }
        self.initialized = true;
        debug!(mode = %self.mode, level, "initialized codec session");
        Ok(())
    }

    pub(crate) fn compress(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Result<usize> {
        let hint = check::<E>(self.engine.compress_chunk(output, input))?;
        trace!(consumed = input.pos(), produced = output.pos(), "compress chunk");
        Ok(hint)
    }

    pub(crate) fn decompress(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Result<usize> {
        let hint = check::<E>(self.engine.decompress_chunk(output, input))?;
        trace!(
            consumed = input.pos(),
            produced = output.pos(),
            hint,
            "decompress chunk"
        );
        Ok(hint)
    }

    /// One flush-chunk call; returns bytes still pending
    pub(crate) fn flush(&mut self, output: &mut OutDescriptor<'_>) -> Result<usize> {
        let pending = check::<E>(self.engine.flush_chunk(output))?;
        trace!(produced = output.pos(), pending, "flush chunk");
        Ok(pending)
    }

    /// One end-chunk call; returns bytes still pending
    pub(crate) fn end(&mut self, output: &mut OutDescriptor<'_>) -> Result<usize> {
        let pending = check::<E>(self.engine.end_chunk(output))?;
        trace!(produced = output.pos(), pending, "end chunk");
        Ok(pending)
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        debug!(mode = %self.mode, "destroyed codec session");
    }
}
