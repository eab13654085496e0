//! Streaming encryption for data of unknown length.
//!
//! A stream is the header, the AES-256-CTR ciphertext and a trailing
//! 32-byte BLAKE2b tag over everything before it. [`Encryptor`] pushes
//! plaintext into a sink; [`Decryptor`] pulls plaintext out of a source,
//! holding back the last 32 bytes until end-of-stream reveals them as the
//! tag. Neither ever buffers more than one caller-sized chunk.
//!
//! # Security Guarantees
//! - The password is requested at most once and wiped after the KDF runs
//! - Derived keys are wiped as soon as the cipher and MAC are keyed
//! - Plaintext delivered before a [`BadChecksum`] must be discarded
//!
//! [`BadChecksum`]: sealstream_common::Error::BadChecksum

mod reader;
mod writer;

pub use reader::Decryptor;
pub use writer::Encryptor;

use std::io;

use tracing::debug;
use zeroize::Zeroizing;

use crate::auth::Authenticator;
use crate::cipher::Keystream;
use crate::header::Header;
use crate::kdf::derive_keys;
use sealstream_common::{Error, Result};

/// Supplies the password for one stream. Called at most once.
pub type PasswordFn = Box<dyn FnOnce() -> io::Result<Vec<u8>> + Send>;

/// Wrap fixed password bytes as a [`PasswordFn`].
///
/// The captured copy is wiped when the supplier is dropped or consumed.
pub fn password_fn(password: impl Into<Vec<u8>>) -> PasswordFn {
    let password = Zeroizing::new(password.into());
    Box::new(move || Ok(password.to_vec()))
}

/// Keyed cipher and authenticator for one stream.
pub(crate) struct Engine {
    pub(crate) keystream: Keystream,
    pub(crate) auth: Authenticator,
}

impl Engine {
    /// Run the key schedule for `header` and key both primitives.
    ///
    /// The authenticator has absorbed the header and the length-prefixed
    /// context when this returns.
    ///
    /// # Errors
    /// - [`Error::Password`] if the supplier fails
    /// - [`Error::Crypto`] if Argon2 rejects the header's costs
    ///
    /// # Security
    /// - The password and the derived keys are wiped on every path
    pub(crate) fn start(password: PasswordFn, header: &Header, context: &[u8]) -> Result<Self> {
        let password = Zeroizing::new(password().map_err(Error::Password)?);
        let keys = derive_keys(&password, header.salt(), header.kdf_params())?;
        drop(password);

        let keystream = Keystream::new(keys.cipher_key(), header.iv());
        let mut auth = Authenticator::new(keys.auth_key())?;
        drop(keys);

        auth.update(&header.encode());
        auth.update_framed(context);

        let params = header.kdf_params();
        debug!(
            time_cost = params.time_cost,
            memory_cost = params.memory_cost,
            parallelism = params.parallelism,
            context_len = context.len(),
            "Derived stream keys"
        );
        Ok(Self { keystream, auth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{KdfLimits, KdfParams};
    use crate::{HEADER_LEN, TAG_LEN};
    use proptest::prelude::*;
    use sealstream_common::source::{Chunk, Source};
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    pub(crate) fn fast() -> KdfParams {
        KdfParams {
            time_cost: 1,
            memory_cost: 64,
            parallelism: 1,
        }
    }

    fn seal_stream(password: &[u8], plaintext: &[u8], context: &[u8]) -> Vec<u8> {
        let mut enc = Encryptor::with_password(Vec::new(), password)
            .with_params(fast())
            .with_context(context);
        enc.push(plaintext).unwrap();
        enc.finish().unwrap()
    }

    fn open_stream(password: &[u8], data: &[u8], context: &[u8]) -> Result<Vec<u8>> {
        let mut dec = Decryptor::with_password(data, password).with_context(context);
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match dec.pull(&mut buf) {
                Ok(chunk) => {
                    out.extend_from_slice(&buf[..chunk.len]);
                    if chunk.eof {
                        return Ok(out);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Serves `data` one byte at a time with a stall before every byte.
    struct Stutter<'a> {
        data: &'a [u8],
        stall: bool,
    }

    impl Source for Stutter<'_> {
        fn pull(&mut self, buf: &mut [u8]) -> io::Result<Chunk> {
            self.stall = !self.stall;
            if self.stall {
                return Ok(Chunk::data(0));
            }
            match self.data.split_first() {
                Some((&b, rest)) => {
                    buf[0] = b;
                    self.data = rest;
                    Ok(Chunk::data(1))
                }
                None => Ok(Chunk::end(0)),
            }
        }
    }

    #[test]
    fn test_round_trip() {
        let data = seal_stream(b"hunter2", b"streaming plaintext", b"");
        assert_eq!(data.len(), HEADER_LEN + 19 + TAG_LEN);
        assert_eq!(data[0], 0);

        let plain = open_stream(b"hunter2", &data, b"").unwrap();
        assert_eq!(plain, b"streaming plaintext");
    }

    #[test]
    fn test_empty_plaintext() {
        let data = seal_stream(b"pw", b"", b"");
        assert_eq!(data.len(), HEADER_LEN + TAG_LEN);

        let plain = open_stream(b"pw", &data, b"").unwrap();
        assert!(plain.is_empty());
    }

    #[test]
    fn test_ciphertext_hides_plaintext() {
        let data = seal_stream(b"pw", b"aaaaaaaaaaaaaaaa", b"");
        assert_ne!(&data[HEADER_LEN..HEADER_LEN + 16], b"aaaaaaaaaaaaaaaa");
    }

    #[test]
    fn test_same_input_different_output() {
        let a = seal_stream(b"pw", b"same", b"");
        let b = seal_stream(b"pw", b"same", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password() {
        let data = seal_stream(b"right", b"secret", b"");
        let result = open_stream(b"wrong", &data, b"");
        assert!(matches!(result, Err(Error::BadChecksum { .. })));
    }

    #[test]
    fn test_tamper_every_region() {
        let data = seal_stream(b"pw", b"some ciphertext bytes", b"");
        let body = HEADER_LEN;
        let tag = data.len() - TAG_LEN;

        // Salt, IV, ciphertext and tag. Cost fields are covered by
        // test_tamper_header_costs.
        for index in [10, 30, body, body + 5, tag - 1, tag, data.len() - 1] {
            let mut bad = data.clone();
            bad[index] ^= 0x01;
            let result = open_stream(b"pw", &bad, b"");
            assert!(
                matches!(result, Err(Error::BadChecksum { .. })),
                "flip at {} not detected",
                index
            );
        }
    }

    #[test]
    fn test_tamper_header_costs() {
        let data = seal_stream(b"pw", b"payload", b"");

        // Time cost 1 becomes 3: still within limits, so the KDF runs with
        // different costs and the tag no longer matches.
        let mut bad = data.clone();
        bad[5] ^= 0x02;
        assert!(matches!(
            open_stream(b"pw", &bad, b""),
            Err(Error::BadChecksum { .. })
        ));

        let mut bad = data;
        bad[0] = 5;
        assert!(matches!(
            open_stream(b"pw", &bad, b""),
            Err(Error::UnsupportedVersion(5))
        ));
    }

    #[test]
    fn test_truncated_tag() {
        let data = seal_stream(b"pw", b"payload", b"");
        let result = open_stream(b"pw", &data[..data.len() - 1], b"");
        assert!(matches!(result, Err(Error::BadChecksum { .. })));
    }

    #[test]
    fn test_truncated_inside_header() {
        let data = seal_stream(b"pw", b"payload", b"");
        let result = open_stream(b"pw", &data[..20], b"");
        assert!(matches!(result, Err(Error::UnexpectedEnd)));
    }

    #[test]
    fn test_header_without_tag() {
        let data = seal_stream(b"pw", b"", b"");
        let result = open_stream(b"pw", &data[..HEADER_LEN + 10], b"");
        assert!(matches!(result, Err(Error::UnexpectedEnd)));
    }

    #[test]
    fn test_context_binding() {
        let data = seal_stream(b"pw", b"payload", b"file-a");

        assert_eq!(open_stream(b"pw", &data, b"file-a").unwrap(), b"payload");
        assert!(matches!(
            open_stream(b"pw", &data, b"file-b"),
            Err(Error::BadChecksum { .. })
        ));
        assert!(matches!(
            open_stream(b"pw", &data, b""),
            Err(Error::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_out_of_range_header_never_asks_for_password() {
        let mut data = seal_stream(b"pw", b"payload", b"");
        data[6..10].copy_from_slice(&u32::MAX.to_be_bytes());

        let asked = Arc::new(AtomicBool::new(false));
        let flag = asked.clone();
        let mut dec = Decryptor::new(&data[..], move || {
            flag.store(true, Ordering::SeqCst);
            Ok(b"pw".to_vec())
        });

        let mut buf = [0u8; 16];
        assert!(matches!(
            dec.pull(&mut buf),
            Err(Error::ParamsOutOfRange(_))
        ));
        assert!(!asked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_out_of_range_params_never_ask_for_password() {
        let asked = Arc::new(AtomicBool::new(false));
        let flag = asked.clone();
        let mut enc = Encryptor::new(Vec::new(), move || {
            flag.store(true, Ordering::SeqCst);
            Ok(b"pw".to_vec())
        })
        .with_params(KdfParams {
            time_cost: 11,
            ..fast()
        });

        assert!(matches!(enc.push(b"x"), Err(Error::ParamsOutOfRange(_))));
        assert!(!asked.load(Ordering::SeqCst));
        assert!(enc.get_ref().is_empty());
    }

    #[test]
    fn test_password_supplier_error() {
        let data = seal_stream(b"pw", b"payload", b"");
        let mut dec = Decryptor::new(&data[..], || {
            Err(io::Error::new(io::ErrorKind::NotFound, "no keyring"))
        });

        let mut buf = [0u8; 16];
        assert!(matches!(dec.pull(&mut buf), Err(Error::Password(_))));
        assert!(matches!(dec.pull(&mut buf), Err(Error::StreamClosed)));
    }

    #[test]
    fn test_stalling_source() {
        let data = seal_stream(b"pw", b"trickled through a slow source", b"");
        let src = Stutter {
            data: &data,
            stall: false,
        };
        let mut dec = Decryptor::from_source(src, password_fn("pw"));

        let mut out = Vec::new();
        let mut buf = [0u8; 5];
        loop {
            let chunk = dec.pull(&mut buf).unwrap();
            out.extend_from_slice(&buf[..chunk.len]);
            if chunk.eof {
                break;
            }
        }
        assert_eq!(out, b"trickled through a slow source");
    }

    #[test]
    fn test_io_adapters() {
        let mut enc = Encryptor::with_password(Vec::new(), "pw").with_params(fast());
        enc.write_all(b"written through ").unwrap();
        enc.write_all(b"std::io").unwrap();
        enc.flush().unwrap();
        let data = enc.finish().unwrap();

        let mut dec = Decryptor::with_password(&data[..], "pw");
        let mut out = String::new();
        dec.read_to_string(&mut out).unwrap();
        assert_eq!(out, "written through std::io");
    }

    #[test]
    fn test_io_read_reports_tamper() {
        let mut data = seal_stream(b"pw", b"payload", b"");
        let last = data.len() - 1;
        data[last] ^= 0x80;

        let mut dec = Decryptor::with_password(&data[..], "pw");
        let mut out = Vec::new();
        let err = dec.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(Error::from_io(err).is_auth_failure());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_round_trip(
            password in proptest::collection::vec(any::<u8>(), 0..24),
            plaintext in proptest::collection::vec(any::<u8>(), 0..600),
            push in 1usize..100,
            pull in 1usize..100,
        ) {
            let mut enc = Encryptor::with_password(Vec::new(), password.clone())
                .with_params(fast())
                .with_limits(KdfLimits::default());
            for piece in plaintext.chunks(push) {
                enc.push(piece).unwrap();
            }
            let data = enc.finish().unwrap();
            prop_assert_eq!(data.len(), HEADER_LEN + plaintext.len() + TAG_LEN);

            let mut dec = Decryptor::with_password(&data[..], password);
            let mut out = Vec::new();
            let mut buf = vec![0u8; pull];
            loop {
                let chunk = dec.pull(&mut buf).unwrap();
                out.extend_from_slice(&buf[..chunk.len]);
                if chunk.eof {
                    break;
                }
            }
            prop_assert_eq!(out, plaintext);
        }

        #[test]
        fn prop_any_bit_flip_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 1..200),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut data = seal_stream(b"pw", &plaintext, b"");
            // Salt onward; the cost fields and version byte fail earlier.
            let index = 10 + position.index(data.len() - 10);
            data[index] ^= 1 << bit;

            let result = open_stream(b"pw", &data, b"");
            prop_assert!(
                matches!(result, Err(Error::BadChecksum { .. })),
                "flip of bit {} at {} not detected",
                bit,
                index
            );
        }
    }
}
