//! Footer extraction for streams with a trailing fixed-size record.
//!
//! A [`FooterReader`] delivers everything from its source except the last
//! `N` bytes. Those are held back in a window that can be inspected at any
//! time through [`FooterReader::footer`]; once the source has reported
//! end-of-stream the window is exactly the stream's final `N` bytes.
//!
//! Memory use is fixed at two `N`-byte buffers regardless of how large the
//! caller's reads are.

use crate::source::{pull_exact, pull_some, Chunk, Source};
use crate::Result;

/// Reader that holds back the trailing `N` bytes of a stream.
pub struct FooterReader<S> {
    inner: S,
    /// Most recent bytes not yet released, oldest first.
    window: Box<[u8]>,
    /// Copy of the previous window used during rotation.
    spare: Box<[u8]>,
    /// How much of `window` has been filled while priming.
    filled: usize,
    eof: bool,
}

impl<S: Source> FooterReader<S> {
    /// Wrap `inner`, holding back `footer_len` bytes.
    pub fn new(inner: S, footer_len: usize) -> Self {
        Self {
            inner,
            window: vec![0u8; footer_len].into_boxed_slice(),
            spare: vec![0u8; footer_len].into_boxed_slice(),
            filled: 0,
            eof: false,
        }
    }

    /// Read bytes that are not part of the trailing footer.
    ///
    /// The first call primes the window with `N` bytes from the source; a
    /// source shorter than that fails with
    /// [`Error::UnexpectedEnd`](crate::Error::UnexpectedEnd). After that,
    /// every call that does not hit end-of-stream releases at least one
    /// byte. Calling again after end-of-stream or after an error is safe.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<Chunk> {
        if self.eof {
            return Ok(Chunk::end(0));
        }

        if self.filled < self.window.len() && self.prime()? {
            self.eof = true;
            return Ok(Chunk::end(0));
        }

        let chunk = pull_some(&mut self.inner, buf)?;
        self.rotate(&mut buf[..chunk.len]);
        if chunk.eof {
            self.eof = true;
        }
        Ok(chunk)
    }

    /// The most recently read bytes that have not been released.
    ///
    /// Shorter than `N` only while priming is incomplete. Only the value
    /// observed after end-of-stream is the real footer.
    pub fn footer(&self) -> &[u8] {
        &self.window[..self.filled]
    }

    /// Whether the source has reported end-of-stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Returns `true` if the stream ended exactly as the window filled up.
    fn prime(&mut self) -> Result<bool> {
        // Count what arrives so a failed prime still shows in the footer
        // and can be resumed.
        let mut counted = Counted {
            inner: &mut self.inner,
            count: 0,
        };
        let result = pull_exact(&mut counted, &mut self.window[self.filled..]);
        self.filled += counted.count;
        result
    }

    /// Release the oldest `buf.len()` bytes of `window ++ buf` into `buf`
    /// and keep the newest `N` in the window.
    fn rotate(&mut self, buf: &mut [u8]) {
        let n = buf.len();
        let f = self.window.len();
        if n == 0 || f == 0 {
            return;
        }
        let x = n.min(f);
        self.spare.copy_from_slice(&self.window);

        // New window: the tail of the old window followed by the newest
        // bytes of buf.
        self.window[f - x..].copy_from_slice(&buf[n - x..]);
        self.window[..f - x].copy_from_slice(&self.spare[x..]);

        // Released bytes: the head of the old window followed by the
        // oldest bytes of buf.
        buf.copy_within(..n - x, x);
        buf[..x].copy_from_slice(&self.spare[..x]);
    }
}

/// Counts bytes pulled through it.
struct Counted<'a, S> {
    inner: &'a mut S,
    count: usize,
}

impl<S: Source> Source for Counted<'_, S> {
    fn pull(&mut self, buf: &mut [u8]) -> std::io::Result<Chunk> {
        let chunk = self.inner.pull(buf)?;
        self.count += chunk.len;
        Ok(chunk)
    }
}
