//! Common error types for SealStream.

use std::io;

use thiserror::Error;

/// Top-level error type for SealStream operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes than a full header were available.
    #[error("Truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    /// The header version byte is not the one this decoder accepts.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// A KDF cost parameter exceeds its configured maximum.
    #[error("KDF parameters out of range: {0}")]
    ParamsOutOfRange(String),

    /// The source ended before a complete header or trailer was read.
    #[error("Unexpected end of stream")]
    UnexpectedEnd,

    /// The source kept returning zero bytes without signaling end-of-stream.
    #[error("No progress: source returned no data too many times in a row")]
    NoProgress,

    /// The authentication tag did not match.
    ///
    /// `len` is the number of plaintext bytes the failing call still wrote
    /// into the caller's buffer. They must be discarded along with
    /// everything delivered before.
    #[error("Bad checksum")]
    BadChecksum { len: usize },

    /// Operation attempted after the stream was closed.
    #[error("Stream already closed")]
    StreamClosed,

    /// The password supplier failed.
    #[error("Password retrieval failed: {0}")]
    Password(#[source] io::Error),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Recover an [`Error`] that was carried through an [`io::Error`].
    ///
    /// Errors that did not originate here become [`Error::Io`].
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(ours)) => *ours,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(kind.into()),
        }
    }

    /// Whether this error means the data failed authentication.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::BadChecksum { .. })
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::Io(err) => err.kind(),
            Error::UnexpectedEnd | Error::TruncatedHeader { .. } => io::ErrorKind::UnexpectedEof,
            Error::UnsupportedVersion(_)
            | Error::ParamsOutOfRange(_)
            | Error::BadChecksum { .. } => io::ErrorKind::InvalidData,
            Error::InvalidInput(_) => io::ErrorKind::InvalidInput,
            Error::NoProgress
            | Error::StreamClosed
            | Error::Password(_)
            | Error::Crypto(_)
            | Error::Serialization(_) => io::ErrorKind::Other,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
