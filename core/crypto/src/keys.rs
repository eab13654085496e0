//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of each derived key in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the key schedule output: cipher key followed by MAC key.
pub const KEY_MATERIAL_LENGTH: usize = 2 * KEY_LENGTH;

/// Keys derived from a password for one stream.
///
/// The cipher key and the authentication key are the two independent
/// halves of a single KDF output. Both are wiped when this value drops,
/// so it should be dropped as soon as the cipher and authenticator have
/// been keyed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    cipher_key: [u8; KEY_LENGTH],
    auth_key: [u8; KEY_LENGTH],
}

impl KeyMaterial {
    /// Create key material from raw keys.
    pub fn from_bytes(cipher_key: [u8; KEY_LENGTH], auth_key: [u8; KEY_LENGTH]) -> Self {
        Self {
            cipher_key,
            auth_key,
        }
    }

    /// Split a key schedule output into cipher and authentication keys.
    pub(crate) fn split(okm: &[u8; KEY_MATERIAL_LENGTH]) -> Self {
        let mut keys = Self::from_bytes([0u8; KEY_LENGTH], [0u8; KEY_LENGTH]);
        keys.cipher_key.copy_from_slice(&okm[..KEY_LENGTH]);
        keys.auth_key.copy_from_slice(&okm[KEY_LENGTH..]);
        keys
    }

    /// Key for the stream cipher or AEAD.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn cipher_key(&self) -> &[u8; KEY_LENGTH] {
        &self.cipher_key
    }

    /// Key for the stream authenticator.
    pub fn auth_key(&self) -> &[u8; KEY_LENGTH] {
        &self.auth_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}
