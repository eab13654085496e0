//! Counter-mode keystream.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::header::IV_LEN;
use crate::keys::KEY_LENGTH;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// AES-256-CTR keystream seeded from the cipher key and the header IV.
///
/// Encryption and decryption are the same operation. The cipher state is
/// zeroized on drop.
pub struct Keystream {
    cipher: Aes256Ctr,
}

impl Keystream {
    pub fn new(key: &[u8; KEY_LENGTH], iv: &[u8; IV_LEN]) -> Self {
        Self {
            cipher: Aes256Ctr::new(key.into(), iv.into()),
        }
    }

    /// XOR the next `buf.len()` keystream bytes into `buf`.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}
