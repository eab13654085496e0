//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. One run
//! produces the cipher key and the authentication key together.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::keys::{KeyMaterial, KEY_MATERIAL_LENGTH};
use sealstream_common::{Error, Result};

/// Parameters for Argon2id key derivation.
///
/// These travel in every header, so their widths match the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of iterations.
    pub time_cost: u32,
    /// Memory cost in KiB (e.g., 16384 = 16 MiB).
    pub memory_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u8,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    pub fn interactive() -> Self {
        Self {
            time_cost: 3,
            memory_cost: 16 * 1024, // 16 MiB
            parallelism: 8,
        }
    }

    /// Create moderate parameters for constrained devices.
    pub fn moderate() -> Self {
        Self {
            time_cost: 3,
            memory_cost: 32 * 1024, // 32 MiB
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Sits exactly at the default memory limit.
    pub fn sensitive() -> Self {
        Self {
            time_cost: 4,
            memory_cost: 64 * 1024, // 64 MiB
            parallelism: 4,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "interactive" => Some(Self::interactive()),
            "moderate" => Some(Self::moderate()),
            "sensitive" => Some(Self::sensitive()),
            _ => None,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Upper bounds on KDF cost parameters.
///
/// Checked both before encrypting and before running the KDF on a header
/// read from untrusted input, so a hostile header cannot make the reader
/// spend unbounded time or memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfLimits {
    /// Maximum number of iterations.
    pub time_max: u32,
    /// Maximum memory cost in KiB.
    pub memory_max: u32,
    /// Maximum degree of parallelism.
    pub parallelism_max: u8,
}

impl Default for KdfLimits {
    fn default() -> Self {
        Self {
            time_max: 10,
            memory_max: 64 * 1024, // 64 MiB
            parallelism_max: 64,
        }
    }
}

impl KdfLimits {
    /// Check `params` against these limits.
    ///
    /// # Errors
    /// - Returns [`Error::ParamsOutOfRange`] naming the first parameter
    ///   that exceeds its maximum
    pub fn check(&self, params: &KdfParams) -> Result<()> {
        if params.time_cost > self.time_max {
            return Err(Error::ParamsOutOfRange(format!(
                "time cost {} exceeds maximum {}",
                params.time_cost, self.time_max
            )));
        }
        if params.memory_cost > self.memory_max {
            return Err(Error::ParamsOutOfRange(format!(
                "memory cost {} KiB exceeds maximum {} KiB",
                params.memory_cost, self.memory_max
            )));
        }
        if params.parallelism > self.parallelism_max {
            return Err(Error::ParamsOutOfRange(format!(
                "parallelism {} exceeds maximum {}",
                params.parallelism, self.parallelism_max
            )));
        }
        Ok(())
    }
}

/// Derive the cipher and authentication keys from a password and salt.
///
/// # Preconditions
/// - `params` should already have been checked against [`KdfLimits`]
///
/// # Postconditions
/// - Returns key material whose two halves come from one Argon2id run
/// - The derived keys are deterministic given the same inputs
///
/// # Errors
/// - Returns error if Argon2id rejects the parameters (for example zero
///   iterations, or less than 8 KiB of memory per lane)
///
/// # Security
/// - Password is not stored or logged
/// - The intermediate output buffer is zeroized after the split
pub fn derive_keys(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<KeyMaterial> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        u32::from(params.parallelism),
        Some(KEY_MATERIAL_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut okm = Zeroizing::new([0u8; KEY_MATERIAL_LENGTH]);
    argon2
        .hash_password_into(password, salt, &mut okm[..])
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(KeyMaterial::split(&okm))
}
