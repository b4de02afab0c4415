// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Compression level used when none is given (zstd's own default)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Consecutive engine calls allowed to make no progress before giving up
pub const MAX_STALLED_CALLS: usize = 16;

/// Buffers of one length kept by a pool once returned
pub const DEFAULT_MAX_POOLED: usize = 16;

/// Conventional file extension for zstd frames
pub const FILE_EXTENSION: &str = "zst";
