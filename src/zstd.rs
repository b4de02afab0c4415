// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! libzstd streaming sessions via `zstd-safe`

use zstd_safe::{CCtx, CParameter, DCtx, InBuffer, OutBuffer, SafeResult};

use crate::engine::{Engine, ErrorCode, InDescriptor, Mode, OutDescriptor, Status, Version};

// ZSTD_error_stage_wrong, encoded the way libzstd returns error codes
const STAGE_WRONG: ErrorCode = 0usize.wrapping_sub(60);

enum Context {
    Compress(CCtx<'static>),
    Decompress(DCtx<'static>),
}

/// A libzstd compression or decompression stream
pub struct ZstdEngine {
    ctx: Context,
}

/// Run one zstd call over the descriptors, carrying its progress back into them
fn transfer<F>(output: &mut OutDescriptor<'_>, input: &mut InDescriptor<'_>, call: F) -> Status
where
    F: FnOnce(&mut OutBuffer<'_, [u8]>, &mut InBuffer<'_>) -> SafeResult,
{
    let mut src = InBuffer::around(input.remaining());
    let mut dst = OutBuffer::around(output.spare_mut());
    let status = call(&mut dst, &mut src);
    let (consumed, produced) = (src.pos(), dst.pos());
    input.advance(consumed);
    output.advance(produced);
    status
}

fn drain<F>(output: &mut OutDescriptor<'_>, call: F) -> Status
where
    F: FnOnce(&mut OutBuffer<'_, [u8]>) -> SafeResult,
{
    let mut dst = OutBuffer::around(output.spare_mut());
    let status = call(&mut dst);
    let produced = dst.pos();
    output.advance(produced);
    status
}

impl Engine for ZstdEngine {
    fn create(mode: Mode) -> Option<Self> {
        let ctx = match mode {
            Mode::Compress => Context::Compress(CCtx::try_create()?),
            Mode::Decompress => Context::Decompress(DCtx::try_create()?),
        };
        Some(ZstdEngine { ctx })
    }

    fn input_chunk_size(mode: Mode) -> usize {
        match mode {
            Mode::Compress => CCtx::in_size(),
            Mode::Decompress => DCtx::in_size(),
        }
    }

    fn output_chunk_size(mode: Mode) -> usize {
        match mode {
            Mode::Compress => CCtx::out_size(),
            Mode::Decompress => DCtx::out_size(),
        }
    }

    fn init(&mut self, level: i32) -> Status {
        match &mut self.ctx {
            Context::Compress(cctx) => cctx.init(level),
            Context::Decompress(dctx) => dctx.init(),
        }
    }

    fn enable_checksum(&mut self) -> Status {
        match &mut self.ctx {
            Context::Compress(cctx) => cctx.set_parameter(CParameter::ChecksumFlag(true)),
            Context::Decompress(_) => Err(STAGE_WRONG),
        }
    }

    fn compress_chunk(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Status {
        match &mut self.ctx {
            Context::Compress(cctx) => {
                transfer(output, input, |dst, src| cctx.compress_stream(dst, src))
            }
            Context::Decompress(_) => Err(STAGE_WRONG),
        }
    }

    fn decompress_chunk(
        &mut self,
        output: &mut OutDescriptor<'_>,
        input: &mut InDescriptor<'_>,
    ) -> Status {
        match &mut self.ctx {
            Context::Decompress(dctx) => {
                transfer(output, input, |dst, src| dctx.decompress_stream(dst, src))
            }
            Context::Compress(_) => Err(STAGE_WRONG),
        }
    }

    fn flush_chunk(&mut self, output: &mut OutDescriptor<'_>) -> Status {
        match &mut self.ctx {
            Context::Compress(cctx) => drain(output, |dst| cctx.flush_stream(dst)),
            Context::Decompress(_) => Err(STAGE_WRONG),
        }
    }

    fn end_chunk(&mut self, output: &mut OutDescriptor<'_>) -> Status {
        match &mut self.ctx {
            Context::Compress(cctx) => drain(output, |dst| cctx.end_stream(dst)),
            Context::Decompress(_) => Err(STAGE_WRONG),
        }
    }

    fn error_message(code: ErrorCode) -> String {
        zstd_safe::get_error_name(code).to_string()
    }

    fn version() -> Version {
        Version::from_number(zstd_safe::version_number())
    }

    fn min_level() -> i32 {
        zstd_safe::min_c_level()
    }

    fn max_level() -> i32 {
        zstd_safe::max_c_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes_are_reported() {
        assert!(ZstdEngine::input_chunk_size(Mode::Compress) > 0);
        assert!(ZstdEngine::output_chunk_size(Mode::Compress) > 0);
        assert!(ZstdEngine::input_chunk_size(Mode::Decompress) > 0);
        assert!(ZstdEngine::output_chunk_size(Mode::Decompress) > 0);
    }

    #[test]
    fn test_version_and_levels() {
        assert!(ZstdEngine::version().major >= 1);
        assert!(ZstdEngine::max_level() >= 19);
        assert!(ZstdEngine::min_level() < 0);
    }

    #[test]
    fn test_wrong_direction_is_an_error() {
        let mut engine = ZstdEngine::create(Mode::Decompress).unwrap();
        engine.init(0).unwrap();
        let mut buf = [0u8; 64];
        let mut output = OutDescriptor::new(&mut buf);
        let code = engine.flush_chunk(&mut output).unwrap_err();
        assert!(!ZstdEngine::error_message(code).is_empty());
    }

    #[test]
    fn test_single_frame_by_hand() {
        let mut enc = ZstdEngine::create(Mode::Compress).unwrap();
        enc.init(3).unwrap();
        let mut frame = vec![0u8; 256];
        let mut output = OutDescriptor::new(&mut frame);
        let mut input = InDescriptor::new(b"hello hello hello");
        enc.compress_chunk(&mut output, &mut input).unwrap();
        assert_eq!(input.pos(), 17);
        while enc.end_chunk(&mut output).unwrap() != 0 {}
        let len = output.pos();
        frame.truncate(len);

        let mut dec = ZstdEngine::create(Mode::Decompress).unwrap();
        dec.init(0).unwrap();
        let mut plain = [0u8; 64];
        let mut output = OutDescriptor::new(&mut plain);
        let mut input = InDescriptor::new(&frame);
        let hint = dec.decompress_chunk(&mut output, &mut input).unwrap();
        assert_eq!(hint, 0);
        assert_eq!(output.written(), b"hello hello hello");
    }
}
