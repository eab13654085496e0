//! Password-based authenticated encryption containers for SealStream.
//!
//! This module provides:
//! - A fixed 42-byte header codec with bounds on KDF costs
//! - Key derivation using Argon2id
//! - Streaming encryption (AES-256-CTR with a trailing BLAKE2b tag) for data
//!   of unknown length
//! - Sealed, whole-message encryption using XChaCha20-Poly1305
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod container;
pub mod header;
pub mod kdf;
pub mod keys;
pub mod stream;

pub use auth::{Authenticator, TAG_LEN};
pub use config::ContainerConfig;
pub use container::Container;
pub use header::{Header, Mode, HEADER_LEN};
pub use kdf::{derive_keys, KdfLimits, KdfParams};
pub use keys::KeyMaterial;
pub use stream::{password_fn, Decryptor, Encryptor, PasswordFn};

pub use sealstream_common::{Error, Result};
