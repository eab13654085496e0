//! Fixed-size container header.
//!
//! Every container starts with a 42-byte header that carries everything
//! needed to re-derive its keys: the KDF costs, a random salt and a random
//! IV. All integers are big-endian.
//!
//! ```text
//! offset  size  field
//!      0     1  version
//!      1     1  kdf parallelism
//!      2     4  kdf time cost
//!      6     4  kdf memory cost (KiB)
//!     10    16  salt
//!     26    16  iv
//! ```
//!
//! The version byte also records which mode wrote the container, so a
//! sealed container is never mistaken for a streaming one.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::kdf::{KdfLimits, KdfParams};
use sealstream_common::source::pull_exact;
use sealstream_common::{Error, Result, Source};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// IV length in bytes.
pub const IV_LEN: usize = 16;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 1 + 1 + 4 + 4 + SALT_LEN + IV_LEN;

const SALT_OFFSET: usize = 10;
const IV_OFFSET: usize = SALT_OFFSET + SALT_LEN;

/// Container mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// AES-256-CTR body followed by a BLAKE2b tag.
    #[default]
    Streaming,
    /// XChaCha20-Poly1305 over the whole body.
    Sealed,
}

impl Mode {
    /// Version byte written for this mode.
    pub const fn version(self) -> u8 {
        match self {
            Mode::Streaming => 0,
            Mode::Sealed => 1,
        }
    }

    /// Mode for a version byte, if it is one we know.
    pub const fn from_version(version: u8) -> Option<Self> {
        match version {
            0 => Some(Mode::Streaming),
            1 => Some(Mode::Sealed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Streaming => "streaming",
            Mode::Sealed => "sealed",
        }
    }
}

/// Decoded container header.
///
/// Immutable once built; the random fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    mode: Mode,
    kdf: KdfParams,
    salt: [u8; SALT_LEN],
    iv: [u8; IV_LEN],
}

impl Header {
    /// Create a fresh header with a random salt and IV from the OS.
    ///
    /// # Errors
    /// - Returns [`Error::ParamsOutOfRange`] if `params` exceed `limits`
    pub fn new(mode: Mode, params: &KdfParams, limits: &KdfLimits) -> Result<Self> {
        Self::generate(mode, params, limits, &mut OsRng)
    }

    /// Create a fresh header drawing the salt and IV from `rng`.
    ///
    /// Limits are checked before any randomness is consumed.
    pub fn generate<R: RngCore + CryptoRng>(
        mode: Mode,
        params: &KdfParams,
        limits: &KdfLimits,
        rng: &mut R,
    ) -> Result<Self> {
        limits.check(params)?;

        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        Ok(Self {
            mode,
            kdf: *params,
            salt,
            iv,
        })
    }

    /// Serialize to the fixed wire layout.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.mode.version();
        out[1] = self.kdf.parallelism;
        out[2..6].copy_from_slice(&self.kdf.time_cost.to_be_bytes());
        out[6..10].copy_from_slice(&self.kdf.memory_cost.to_be_bytes());
        out[SALT_OFFSET..IV_OFFSET].copy_from_slice(&self.salt);
        out[IV_OFFSET..].copy_from_slice(&self.iv);
        out
    }

    /// Decode a header written in `mode`, checking its costs against
    /// `limits`.
    ///
    /// Only the first [`HEADER_LEN`] bytes are looked at.
    ///
    /// # Errors
    /// Checked in this order:
    /// - [`Error::TruncatedHeader`] if fewer than [`HEADER_LEN`] bytes
    /// - [`Error::UnsupportedVersion`] if the version byte is not `mode`'s
    /// - [`Error::ParamsOutOfRange`] if a cost exceeds its limit
    pub fn decode(bytes: &[u8], mode: Mode, limits: &KdfLimits) -> Result<Self> {
        let header = Self::parse(bytes)?;
        if header.mode != mode {
            return Err(Error::UnsupportedVersion(header.mode.version()));
        }
        limits.check(&header.kdf)?;
        Ok(header)
    }

    /// Decode a header of either mode without checking its costs.
    ///
    /// For inspecting untrusted containers; never feed the result to the
    /// KDF without checking it first.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::TruncatedHeader {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let mode = Mode::from_version(bytes[0]).ok_or(Error::UnsupportedVersion(bytes[0]))?;

        let mut time = [0u8; 4];
        let mut memory = [0u8; 4];
        time.copy_from_slice(&bytes[2..6]);
        memory.copy_from_slice(&bytes[6..10]);

        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        salt.copy_from_slice(&bytes[SALT_OFFSET..IV_OFFSET]);
        iv.copy_from_slice(&bytes[IV_OFFSET..HEADER_LEN]);

        Ok(Self {
            mode,
            kdf: KdfParams {
                time_cost: u32::from_be_bytes(time),
                memory_cost: u32::from_be_bytes(memory),
                parallelism: bytes[1],
            },
            salt,
            iv,
        })
    }

    /// Read and decode a header from the front of `src`.
    ///
    /// A container always carries a tag after its header, so a source that
    /// ends with the header is rejected without looking at it.
    ///
    /// # Errors
    /// - [`Error::UnexpectedEnd`] if the source ends at or before the end
    ///   of the header
    /// - Anything [`Header::decode`] returns
    pub fn read_from<S: Source + ?Sized>(src: &mut S, mode: Mode, limits: &KdfLimits) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        if pull_exact(src, &mut buf)? {
            return Err(Error::UnexpectedEnd);
        }
        Self::decode(&buf, mode, limits)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn version(&self) -> u8 {
        self.mode.version()
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}
