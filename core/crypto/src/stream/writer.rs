//! Push-side stream state machine.

use std::io::{self, Write};
use std::mem;

use tracing::debug;

use super::{password_fn, Engine, PasswordFn};
use crate::header::{Header, Mode};
use crate::kdf::{KdfLimits, KdfParams};
use sealstream_common::{Error, Result};

enum State {
    /// Nothing written yet.
    Fresh,
    /// Header is in the sink; ciphertext may follow.
    HeaderWritten(Engine),
    /// Tag written and sink flushed.
    Closed,
    /// Starting or writing failed; the sink holds an unusable prefix.
    Failed,
}

/// Encrypts plaintext pushed into it and writes the container to a sink.
///
/// The header is emitted lazily on the first [`push`](Self::push) or
/// [`close`](Self::close), which is also when the password supplier runs.
/// The stream is only complete once `close` has written the tag.
///
/// # Example
/// ```no_run
/// use sealstream_crypto::Encryptor;
///
/// let mut enc = Encryptor::with_password(Vec::new(), "correct horse");
/// enc.push(b"hello")?;
/// let container = enc.finish()?;
/// # Ok::<(), sealstream_crypto::Error>(())
/// ```
pub struct Encryptor<W: Write> {
    sink: W,
    state: State,
    password: Option<PasswordFn>,
    params: KdfParams,
    limits: KdfLimits,
    context: Vec<u8>,
    header: Option<Header>,
    scratch: Vec<u8>,
    written: u64,
}

impl<W: Write> Encryptor<W> {
    /// Create an encryptor that asks `password` for the password when the
    /// header is emitted.
    pub fn new<F>(sink: W, password: F) -> Self
    where
        F: FnOnce() -> io::Result<Vec<u8>> + Send + 'static,
    {
        Self::with_supplier(sink, Box::new(password))
    }

    /// Create an encryptor for a password that is already in memory.
    pub fn with_password(sink: W, password: impl Into<Vec<u8>>) -> Self {
        Self::with_supplier(sink, password_fn(password))
    }

    pub(crate) fn with_supplier(sink: W, password: PasswordFn) -> Self {
        Self {
            sink,
            state: State::Fresh,
            password: Some(password),
            params: KdfParams::default(),
            limits: KdfLimits::default(),
            context: Vec::new(),
            header: None,
            scratch: Vec::new(),
            written: 0,
        }
    }

    /// Set the KDF costs written into the header.
    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    /// Set the limits the KDF costs are checked against.
    pub fn with_limits(mut self, limits: KdfLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Bind `context` into the tag. It is not written to the sink; the
    /// decryptor must be given the same bytes.
    pub fn with_context(mut self, context: impl Into<Vec<u8>>) -> Self {
        self.context = context.into();
        self
    }

    /// The header, once it has been emitted.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Encrypt `plaintext` and write it to the sink.
    ///
    /// Returns the number of bytes consumed, which is always all of them.
    /// An empty push still emits the header.
    ///
    /// # Errors
    /// - [`Error::StreamClosed`] after `close` or after an earlier failure
    /// - [`Error::ParamsOutOfRange`] if the configured costs exceed the
    ///   limits; the password is never requested in that case
    /// - Password, KDF and sink errors, all of which end the stream
    pub fn push(&mut self, plaintext: &[u8]) -> Result<usize> {
        self.start()?;
        let State::HeaderWritten(engine) = &mut self.state else {
            return Err(Error::StreamClosed);
        };
        if plaintext.is_empty() {
            return Ok(0);
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(plaintext);
        engine.keystream.apply(&mut self.scratch);
        engine.auth.update(&self.scratch);

        if let Err(e) = self.sink.write_all(&self.scratch) {
            self.state = State::Failed;
            return Err(e.into());
        }
        self.written += plaintext.len() as u64;
        Ok(plaintext.len())
    }

    /// Write the tag and flush the sink.
    ///
    /// Emits the header first if nothing was pushed. Calling `close` again
    /// after it succeeded does nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            State::Closed => return Ok(()),
            State::Failed => return Err(Error::StreamClosed),
            State::Fresh | State::HeaderWritten(_) => {}
        }
        self.start()?;

        let State::HeaderWritten(engine) = mem::replace(&mut self.state, State::Failed) else {
            return Err(Error::StreamClosed);
        };
        let tag = engine.auth.tag();
        drop(engine);

        self.sink.write_all(&tag)?;
        self.sink.flush()?;
        self.state = State::Closed;

        debug!(bytes = self.written, "Closed encrypted stream");
        Ok(())
    }

    /// Close the stream and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        Ok(self.sink)
    }

    /// Emit the header and key the engine, once.
    fn start(&mut self) -> Result<()> {
        match self.state {
            State::Fresh => {}
            State::HeaderWritten(_) => return Ok(()),
            State::Closed | State::Failed => return Err(Error::StreamClosed),
        }
        // Anything that goes wrong from here on ends the stream.
        self.state = State::Failed;

        let header = Header::new(Mode::Streaming, &self.params, &self.limits)?;
        let password = self.password.take().ok_or(Error::StreamClosed)?;
        let engine = Engine::start(password, &header, &self.context)?;
        self.sink.write_all(&header.encode())?;

        debug!("Wrote stream header");
        self.header = Some(header);
        self.state = State::HeaderWritten(engine);
        Ok(())
    }
}

impl<W: Write> Write for Encryptor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf).map_err(io::Error::from)
    }

    /// Flushes the sink without closing the stream.
    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
