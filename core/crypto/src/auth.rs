//! Incremental stream authenticator.
//!
//! A keyed BLAKE2b over the header, the bound context and every ciphertext
//! chunk in order. The tag can be computed at any point without disturbing
//! the running state.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::Blake2bMac;
use subtle::ConstantTimeEq;

use crate::keys::KEY_LENGTH;
use sealstream_common::{Error, Result};

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 32;

/// Personalization string separating this MAC from other BLAKE2b uses.
const PERSONAL: &[u8] = b"sealstream.auth";

#[derive(Clone)]
pub struct Authenticator {
    mac: Blake2bMac<U32>,
}

impl Authenticator {
    /// Key a fresh authenticator.
    ///
    /// # Errors
    /// - Returns error if BLAKE2b rejects the key length (cannot happen for
    ///   a 32-byte key)
    pub fn new(key: &[u8; KEY_LENGTH]) -> Result<Self> {
        let mac = Blake2bMac::<U32>::new_with_salt_and_personal(key, &[], PERSONAL)
            .map_err(|e| Error::Crypto(format!("Invalid authentication key: {}", e)))?;
        Ok(Self { mac })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Absorb a length-prefixed field, so adjacent fields cannot be
    /// shifted into one another.
    pub fn update_framed(&mut self, data: &[u8]) {
        self.mac.update(&(data.len() as u64).to_be_bytes());
        self.mac.update(data);
    }

    /// Tag over everything absorbed so far. Side-effect free.
    pub fn tag(&self) -> [u8; TAG_LEN] {
        let out = self.mac.clone().finalize().into_bytes();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&out);
        tag
    }

    /// Compare the current tag with `expected` in constant time.
    pub fn verify(&self, expected: &[u8]) -> bool {
        let tag = self.tag();
        tag[..].ct_eq(expected).into()
    }
}
