//! Pull-based byte sources.
//!
//! [`std::io::Read`] folds end-of-stream into `Ok(0)`, which leaves no way
//! to express a read that made no progress but is not the end. [`Source`]
//! keeps the two apart so stalls can be counted and bounded.

use std::io::{self, Read};

use crate::{Error, Result};

/// Upper bound on consecutive zero-byte reads before giving up.
pub const MAX_CONSECUTIVE_EMPTY_READS: usize = 100;

/// Outcome of a single pull: how many bytes landed and whether the
/// source is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Number of bytes written to the front of the buffer.
    pub len: usize,
    /// Set once the end of the stream has been observed.
    pub eof: bool,
}

impl Chunk {
    /// A chunk of `len` bytes with more data possibly to follow.
    pub const fn data(len: usize) -> Self {
        Self { len, eof: false }
    }

    /// A final chunk of `len` bytes.
    pub const fn end(len: usize) -> Self {
        Self { len, eof: true }
    }
}

/// A pull-based byte source of unknown length.
pub trait Source {
    /// Read up to `buf.len()` bytes into the front of `buf`.
    ///
    /// A chunk with `len == 0` and `eof == false` is a stall: the source
    /// had nothing to offer yet. End-of-stream is final: once a chunk with
    /// `eof` has been returned, every later pull returns `Chunk::end(0)`.
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Chunk>;
}

impl<S: Source + ?Sized> Source for &mut S {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
        (**self).pull(buf)
    }
}

/// Adapts any [`Read`] into a [`Source`].
///
/// `Ok(0)` on a non-empty buffer is end-of-stream; `Interrupted` is
/// reported as a stall.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source for ReadSource<R> {
    fn pull(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
        if buf.is_empty() {
            return Ok(Chunk::data(0));
        }
        match self.inner.read(buf) {
            Ok(0) => Ok(Chunk::end(0)),
            Ok(n) => Ok(Chunk::data(n)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Chunk::data(0)),
            Err(e) => Err(e),
        }
    }
}

/// Pull from `src` until at least one byte arrives or the stream ends.
///
/// Fails with [`Error::NoProgress`] after [`MAX_CONSECUTIVE_EMPTY_READS`]
/// stalls in a row.
pub fn pull_some<S: Source + ?Sized>(src: &mut S, buf: &mut [u8]) -> Result<Chunk> {
    if buf.is_empty() {
        return Ok(Chunk::data(0));
    }
    let mut stalls = 0;
    loop {
        let chunk = src.pull(buf)?;
        if chunk.len > 0 || chunk.eof {
            return Ok(chunk);
        }
        stalls += 1;
        if stalls >= MAX_CONSECUTIVE_EMPTY_READS {
            return Err(Error::NoProgress);
        }
    }
}

/// Fill `buf` completely from `src`.
///
/// Returns `Ok(true)` if the stream ended exactly at the end of `buf`.
/// A stream that ends before `buf` is full fails with
/// [`Error::UnexpectedEnd`].
pub fn pull_exact<S: Source + ?Sized>(src: &mut S, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let chunk = pull_some(src, &mut buf[filled..])?;
        filled += chunk.len;
        if chunk.eof {
            if filled < buf.len() {
                return Err(Error::UnexpectedEnd);
            }
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serves `data` in pieces of at most `step` bytes, stalling `stalls`
    /// times before every piece.
    pub(crate) struct Trickle {
        pub data: Vec<u8>,
        pub pos: usize,
        pub step: usize,
        pub stalls: usize,
        pub pending: usize,
    }

    impl Trickle {
        pub fn new(data: &[u8], step: usize, stalls: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                step,
                stalls,
                pending: stalls,
            }
        }
    }

    impl Source for Trickle {
        fn pull(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
            if self.pending > 0 {
                self.pending -= 1;
                return Ok(Chunk::data(0));
            }
            self.pending = self.stalls;
            let rest = &self.data[self.pos..];
            if rest.is_empty() {
                return Ok(Chunk::end(0));
            }
            let n = rest.len().min(buf.len()).min(self.step);
            buf[..n].copy_from_slice(&rest[..n]);
            self.pos += n;
            Ok(Chunk::data(n))
        }
    }

    #[test]
    fn test_read_source_reports_eof() {
        let mut src = ReadSource::new(&b"abc"[..]);
        let mut buf = [0u8; 8];

        assert_eq!(src.pull(&mut buf).unwrap(), Chunk::data(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(src.pull(&mut buf).unwrap(), Chunk::end(0));
    }

    #[test]
    fn test_pull_exact_across_stalls() {
        let mut src = Trickle::new(b"hello world", 3, 5);
        let mut buf = [0u8; 11];

        let ended = pull_exact(&mut src, &mut buf).unwrap();
        assert!(!ended);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn test_pull_exact_short_stream() {
        let mut src = ReadSource::new(&b"short"[..]);
        let mut buf = [0u8; 10];

        assert!(matches!(
            pull_exact(&mut src, &mut buf),
            Err(Error::UnexpectedEnd)
        ));
    }

    #[test]
    fn test_pull_some_gives_up_on_stalls() {
        let mut src = Trickle::new(b"never", 1, usize::MAX);
        let mut buf = [0u8; 4];

        assert!(matches!(pull_some(&mut src, &mut buf), Err(Error::NoProgress)));
    }

    #[test]
    fn test_pull_some_tolerates_stalls_below_bound() {
        let mut src = Trickle::new(b"x", 1, MAX_CONSECUTIVE_EMPTY_READS - 1);
        let mut buf = [0u8; 4];

        assert_eq!(pull_some(&mut src, &mut buf).unwrap(), Chunk::data(1));
    }
}
