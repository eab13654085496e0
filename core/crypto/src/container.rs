//! One entry point for both container modes.

use std::io::{Read, Write};

use crate::aead;
use crate::auth::TAG_LEN;
use crate::config::ContainerConfig;
use crate::header::{Mode, HEADER_LEN};
use crate::stream::{password_fn, Decryptor, Encryptor, PasswordFn};
use sealstream_common::{Error, ReadSource, Result};

/// Encrypts and decrypts containers according to a [`ContainerConfig`].
///
/// Whole-buffer operations work in either mode. Streaming handles are
/// only available in streaming mode, since sealed containers have to be
/// held in memory to be authenticated.
#[derive(Debug, Clone)]
pub struct Container {
    config: ContainerConfig,
}

impl Container {
    /// # Errors
    /// - [`Error::ParamsOutOfRange`] if the configured costs exceed the
    ///   configured limits
    pub fn new(config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Encrypt a whole buffer.
    pub fn encrypt(&self, password: &[u8], plaintext: &[u8], context: &[u8]) -> Result<Vec<u8>> {
        match self.config.mode {
            Mode::Sealed => aead::seal(
                password,
                plaintext,
                context,
                &self.config.kdf,
                &self.config.limits,
            ),
            Mode::Streaming => {
                let sink = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
                let mut enc = self
                    .encryptor(sink, password_fn(password))?
                    .with_context(context);
                enc.push(plaintext)?;
                enc.finish()
            }
        }
    }

    /// Decrypt a whole buffer. Nothing is returned unless it authenticates.
    pub fn decrypt(&self, password: &[u8], data: &[u8], context: &[u8]) -> Result<Vec<u8>> {
        match self.config.mode {
            Mode::Sealed => aead::open(password, data, context, &self.config.limits),
            Mode::Streaming => {
                let mut dec = self
                    .decryptor(data, password_fn(password))?
                    .with_context(context);

                // Plaintext is never longer than the container, so the
                // buffer always has room left until the end arrives.
                let mut out = vec![0u8; data.len()];
                let mut filled = 0;
                loop {
                    let chunk = dec.pull(&mut out[filled..])?;
                    filled += chunk.len;
                    if chunk.eof {
                        break;
                    }
                }
                out.truncate(filled);
                Ok(out)
            }
        }
    }

    /// Streaming encryptor writing to `sink`.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] in sealed mode
    pub fn encryptor<W: Write>(&self, sink: W, password: PasswordFn) -> Result<Encryptor<W>> {
        self.require_streaming()?;
        Ok(Encryptor::with_supplier(sink, password)
            .with_params(self.config.kdf)
            .with_limits(self.config.limits))
    }

    /// Streaming decryptor reading from `reader`.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] in sealed mode
    pub fn decryptor<R: Read>(
        &self,
        reader: R,
        password: PasswordFn,
    ) -> Result<Decryptor<ReadSource<R>>> {
        self.require_streaming()?;
        Ok(Decryptor::from_source(ReadSource::new(reader), password).with_limits(self.config.limits))
    }

    fn require_streaming(&self) -> Result<()> {
        match self.config.mode {
            Mode::Streaming => Ok(()),
            Mode::Sealed => Err(Error::InvalidInput(
                "sealed containers have no streaming interface".to_string(),
            )),
        }
    }
}
