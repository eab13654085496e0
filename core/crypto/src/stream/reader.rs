//! Pull-side stream state machine.

use std::io::{self, Read};
use std::mem;

use tracing::{debug, warn};

use super::{password_fn, Engine, PasswordFn};
use crate::auth::TAG_LEN;
use crate::header::{Header, Mode};
use crate::kdf::KdfLimits;
use sealstream_common::{Chunk, Error, FooterReader, ReadSource, Result, Source};

/// Buffer size used to authenticate the rest of a stream on close.
const DRAIN_BUF_LEN: usize = 8192;

enum State<S> {
    /// Header not read yet.
    Fresh(S),
    /// Keys derived; ciphertext is being released from the footer reader.
    HeaderRead { src: FooterReader<S>, engine: Engine },
    /// End of stream reached and the tag matched.
    Verified,
    /// End of stream reached and the tag did not match.
    Rejected,
    /// Opening or reading failed.
    Failed,
}

/// Decrypts a container pulled from a [`Source`].
///
/// The header is read lazily on the first [`pull`](Self::pull) or
/// [`close`](Self::close), which is also when the password supplier runs.
/// Plaintext is handed out as soon as it is decrypted, before the tag at
/// the end of the stream has been checked: a caller that sees
/// [`Error::BadChecksum`] must throw away everything it received.
pub struct Decryptor<S> {
    state: State<S>,
    password: Option<PasswordFn>,
    limits: KdfLimits,
    context: Vec<u8>,
    header: Option<Header>,
    delivered: u64,
}

impl<R: Read> Decryptor<ReadSource<R>> {
    /// Create a decryptor over any reader.
    pub fn new<F>(reader: R, password: F) -> Self
    where
        F: FnOnce() -> io::Result<Vec<u8>> + Send + 'static,
    {
        Self::from_source(ReadSource::new(reader), Box::new(password))
    }

    /// Create a decryptor for a password that is already in memory.
    pub fn with_password(reader: R, password: impl Into<Vec<u8>>) -> Self {
        Self::from_source(ReadSource::new(reader), password_fn(password))
    }
}

impl<S: Source> Decryptor<S> {
    /// Create a decryptor over a [`Source`], which unlike a reader can
    /// report a read that made no progress without ending the stream.
    pub fn from_source(src: S, password: PasswordFn) -> Self {
        Self {
            state: State::Fresh(src),
            password: Some(password),
            limits: KdfLimits::default(),
            context: Vec::new(),
            header: None,
            delivered: 0,
        }
    }

    /// Set the limits a header's KDF costs must fall within.
    pub fn with_limits(mut self, limits: KdfLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Context the stream was bound to when it was encrypted.
    pub fn with_context(mut self, context: impl Into<Vec<u8>>) -> Self {
        self.context = context.into();
        self
    }

    /// The header, once it has been read.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Whether the whole stream has been read and its tag matched.
    pub fn is_verified(&self) -> bool {
        matches!(self.state, State::Verified)
    }

    /// Decrypt the next chunk of plaintext into `buf`.
    ///
    /// Unless it ends the stream, a call with a non-empty `buf` returns at
    /// least one byte. The final chunk may carry data too.
    ///
    /// # Errors
    /// - Header errors ([`Error::UnexpectedEnd`], [`Error::UnsupportedVersion`],
    ///   [`Error::ParamsOutOfRange`]); the password is never requested
    /// - [`Error::BadChecksum`] at end-of-stream if the tag does not match.
    ///   `len` bytes of final plaintext were still written to `buf`
    /// - [`Error::StreamClosed`] after a failure or an early `close`
    /// - Source errors, passed through
    ///
    /// Every error ends the stream. Once the stream has ended, further
    /// calls repeat the outcome: an empty final chunk if it verified,
    /// `BadChecksum` with no data if it did not.
    pub fn pull(&mut self, buf: &mut [u8]) -> Result<Chunk> {
        match self.state {
            State::Fresh(_) => self.open()?,
            State::HeaderRead { .. } => {}
            State::Verified => return Ok(Chunk::end(0)),
            State::Rejected => return Err(Error::BadChecksum { len: 0 }),
            State::Failed => return Err(Error::StreamClosed),
        }
        let State::HeaderRead { src, engine } = &mut self.state else {
            return Err(Error::StreamClosed);
        };

        let chunk = match src.read(buf) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.state = State::Failed;
                return Err(e);
            }
        };
        let data = &mut buf[..chunk.len];
        engine.auth.update(data);
        engine.keystream.apply(data);
        self.delivered += chunk.len as u64;

        if chunk.eof {
            self.settle(chunk.len)?;
        }
        Ok(chunk)
    }

    /// Finish the stream without reading the rest of the plaintext.
    ///
    /// Remaining ciphertext is still pulled through the authenticator, so
    /// a successful `close` means the whole stream verified.
    ///
    /// # Errors
    /// Same as [`pull`](Self::pull). Once the stream has ended, `close`
    /// repeats the outcome: `Ok` only if it verified, `BadChecksum` if the
    /// tag did not match, `StreamClosed` after any other failure.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Fresh(_) => self.open()?,
            State::HeaderRead { .. } => {}
            State::Verified => return Ok(()),
            State::Rejected => return Err(Error::BadChecksum { len: 0 }),
            State::Failed => return Err(Error::StreamClosed),
        }

        let mut scratch = [0u8; DRAIN_BUF_LEN];
        loop {
            let State::HeaderRead { src, engine } = &mut self.state else {
                return Err(Error::StreamClosed);
            };
            match src.read(&mut scratch) {
                Ok(chunk) => {
                    engine.auth.update(&scratch[..chunk.len]);
                    if chunk.eof {
                        break;
                    }
                }
                Err(e) => {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        }
        self.settle(0)
    }

    /// Read the header and key the engine.
    fn open(&mut self) -> Result<()> {
        let State::Fresh(mut src) = mem::replace(&mut self.state, State::Failed) else {
            return Err(Error::StreamClosed);
        };

        let header = Header::read_from(&mut src, Mode::Streaming, &self.limits)?;
        debug!(
            time_cost = header.kdf_params().time_cost,
            memory_cost = header.kdf_params().memory_cost,
            parallelism = header.kdf_params().parallelism,
            "Read stream header"
        );

        let password = self.password.take().ok_or(Error::StreamClosed)?;
        let engine = Engine::start(password, &header, &self.context)?;

        self.header = Some(header);
        self.state = State::HeaderRead {
            src: FooterReader::new(src, TAG_LEN),
            engine,
        };
        Ok(())
    }

    /// Compare the computed tag with the footer at end-of-stream.
    ///
    /// `len` is the size of the final chunk already in the caller's buffer.
    fn settle(&mut self, len: usize) -> Result<()> {
        let State::HeaderRead { src, engine } = mem::replace(&mut self.state, State::Failed) else {
            return Err(Error::StreamClosed);
        };

        if engine.auth.verify(src.footer()) {
            debug!(bytes = self.delivered, "Stream verified");
            self.state = State::Verified;
            Ok(())
        } else {
            warn!(bytes = self.delivered, "Stream failed authentication");
            self.state = State::Rejected;
            Err(Error::BadChecksum { len })
        }
    }
}

impl<S: Source> Read for Decryptor<S> {
    /// A tag mismatch that arrives with final data returns the data first;
    /// the error follows on the next call.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pull(buf) {
            Ok(chunk) => Ok(chunk.len),
            Err(Error::BadChecksum { len }) if len > 0 => Ok(len),
            Err(e) => Err(e.into()),
        }
    }
}
