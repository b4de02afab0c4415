// Copyright 2024 Karpeles Lab Inc.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io;

use thiserror::Error;

use crate::engine::{Engine, ErrorCode, Status};

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the streaming adapter
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument is out of range
    #[error("zstream: invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not available on this stream
    #[error("zstream: unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The engine reported an error code
    #[error("zstream: codec failure: {message}")]
    Codec {
        /// Engine error code, absent when the engine could not even be created
        code: Option<ErrorCode>,
        /// Engine diagnostic for the code
        message: String,
    },

    /// The underlying stream failed
    #[error(transparent)]
    Io(io::Error),

    /// The stream was already closed
    #[error("zstream: stream is closed")]
    Closed,

    /// The compressed source ended inside a frame
    #[error("zstream: compressed stream ended mid-frame")]
    UnexpectedEof,

    /// The engine stopped making progress
    #[error("zstream: engine made no progress after {0} calls")]
    Stalled(usize),
}

impl Error {
    pub(crate) fn codec(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Error::Codec {
            code,
            message: message.into(),
        }
    }

    /// The `io::ErrorKind` this error maps to when surfaced through `Read`/`Write`
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            Error::Unsupported(_) => io::ErrorKind::Unsupported,
            Error::Codec { .. } => io::ErrorKind::InvalidData,
            Error::Io(e) => e.kind(),
            Error::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            Error::Closed | Error::Stalled(_) => io::ErrorKind::Other,
        }
    }

    /// Recover the adapter error carried by an `io::Error` returned from `Read`/`Write`
    pub fn downcast_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

/// Adapter errors that went out through `Read`/`Write` come back unwrapped;
/// anything else is an underlying stream failure.
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(adapter)) => *adapter,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(io::Error::from(kind)),
        }
    }
}

/// Turn an engine status into its progress value, or a codec error carrying
/// the engine's diagnostic for the code.
pub(crate) fn check<E: Engine>(status: Status) -> Result<usize> {
    status.map_err(|code| Error::codec(Some(code), E::error_message(code)))
}
