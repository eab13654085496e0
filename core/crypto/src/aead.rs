//! Sealed mode: whole-message authenticated encryption.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity in a
//! single pass when the whole message fits in memory. A sealed container
//! is the usual 42-byte header (version 1) followed by the ciphertext and
//! its 16-byte Poly1305 tag. The header and the caller's context are the
//! associated data, so neither can be altered without detection.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use tracing::{debug, warn};

use crate::header::{Header, Mode, HEADER_LEN, IV_LEN};
use crate::kdf::{derive_keys, KdfLimits, KdfParams};
use sealstream_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under a password in one shot.
///
/// # Postconditions
/// - Returns header || ciphertext || tag
/// - The output is `HEADER_LEN + plaintext.len() + TAG_SIZE` bytes
///
/// # Errors
/// - Returns [`Error::ParamsOutOfRange`] if `params` exceed `limits`
/// - Returns error if Argon2 rejects the parameters
///
/// # Security
/// - Fresh random salt per call, hence a fresh key; the nonce is the
///   header IV extended with zero bytes
/// - Derived keys are zeroized before returning
pub fn seal(
    password: &[u8],
    plaintext: &[u8],
    context: &[u8],
    params: &KdfParams,
    limits: &KdfLimits,
) -> Result<Vec<u8>> {
    let header = Header::new(Mode::Sealed, params, limits)?;
    let cipher = keyed_cipher(password, &header)?;
    let encoded = header.encode();

    let ciphertext = cipher
        .encrypt(
            &nonce(&header),
            Payload {
                msg: plaintext,
                aad: &associated_data(&encoded, context),
            },
        )
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    result.extend_from_slice(&encoded);
    result.extend_from_slice(&ciphertext);

    debug!(bytes = plaintext.len(), "Sealed container");
    Ok(result)
}

/// Decrypt a sealed container.
///
/// # Errors
/// - Header errors, checked before the password is used
/// - [`Error::UnexpectedEnd`] if the body is shorter than the tag
/// - [`Error::BadChecksum`] if authentication fails (wrong password,
///   wrong context, or tampered data)
///
/// # Security
/// - Authenticates before decrypting; nothing is returned on failure
pub fn open(password: &[u8], data: &[u8], context: &[u8], limits: &KdfLimits) -> Result<Vec<u8>> {
    let header = Header::decode(data, Mode::Sealed, limits)?;
    let body = &data[HEADER_LEN..];
    if body.len() < TAG_SIZE {
        return Err(Error::UnexpectedEnd);
    }

    let cipher = keyed_cipher(password, &header)?;
    let plaintext = cipher
        .decrypt(
            &nonce(&header),
            Payload {
                msg: body,
                aad: &associated_data(&data[..HEADER_LEN], context),
            },
        )
        .map_err(|_| {
            warn!("Sealed container failed authentication");
            Error::BadChecksum { len: 0 }
        })?;

    debug!(bytes = plaintext.len(), "Opened sealed container");
    Ok(plaintext)
}

fn keyed_cipher(password: &[u8], header: &Header) -> Result<XChaCha20Poly1305> {
    let keys = derive_keys(password, header.salt(), header.kdf_params())?;
    Ok(XChaCha20Poly1305::new(GenericArray::from_slice(
        keys.cipher_key(),
    )))
}

fn nonce(header: &Header) -> XNonce {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..IV_LEN].copy_from_slice(header.iv());
    XNonce::clone_from_slice(&nonce)
}

fn associated_data(header: &[u8], context: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(header.len() + context.len());
    aad.extend_from_slice(header);
    aad.extend_from_slice(context);
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams {
            time_cost: 1,
            memory_cost: 64,
            parallelism: 1,
        }
    }

    fn sealed(plaintext: &[u8], context: &[u8]) -> Vec<u8> {
        seal(b"pw", plaintext, context, &fast(), &KdfLimits::default()).unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let data = sealed(b"Hello, World!", b"");
        assert_eq!(data.len(), HEADER_LEN + 13 + TAG_SIZE);
        assert_eq!(data[0], 1);

        let plaintext = open(b"pw", &data, b"", &KdfLimits::default()).unwrap();
        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn test_empty_plaintext() {
        let data = sealed(b"", b"");
        assert_eq!(data.len(), HEADER_LEN + TAG_SIZE);
        assert!(open(b"pw", &data, b"", &KdfLimits::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_wrong_password() {
        let data = sealed(b"secret", b"");
        let result = open(b"other", &data, b"", &KdfLimits::default());
        assert!(matches!(result, Err(Error::BadChecksum { len: 0 })));
    }

    #[test]
    fn test_tampered_header_and_body() {
        let data = sealed(b"secret data", b"");
        for index in [12, 30, HEADER_LEN, data.len() - 1] {
            let mut bad = data.clone();
            bad[index] ^= 0x01;
            let result = open(b"pw", &bad, b"", &KdfLimits::default());
            assert!(
                matches!(result, Err(Error::BadChecksum { .. })),
                "flip at {} not detected",
                index
            );
        }
    }

    #[test]
    fn test_context_binding() {
        let data = sealed(b"secret", b"ctx-1");
        assert!(open(b"pw", &data, b"ctx-1", &KdfLimits::default()).is_ok());
        assert!(matches!(
            open(b"pw", &data, b"ctx-2", &KdfLimits::default()),
            Err(Error::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_body_shorter_than_tag() {
        let data = sealed(b"secret", b"");
        let result = open(b"pw", &data[..HEADER_LEN + TAG_SIZE - 1], b"", &KdfLimits::default());
        assert!(matches!(result, Err(Error::UnexpectedEnd)));
    }

    #[test]
    fn test_streaming_header_rejected() {
        let mut data = sealed(b"secret", b"");
        data[0] = Mode::Streaming.version();
        let result = open(b"pw", &data, b"", &KdfLimits::default());
        assert!(matches!(result, Err(Error::UnsupportedVersion(0))));
    }

    #[test]
    fn test_limits_checked_on_open() {
        let data = sealed(b"secret", b"");
        let strict = KdfLimits {
            memory_max: 8,
            ..KdfLimits::default()
        };
        let result = open(b"pw", &data, b"", &strict);
        assert!(matches!(result, Err(Error::ParamsOutOfRange(_))));
    }
}
