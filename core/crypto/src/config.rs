//! Container configuration.
//!
//! Loaded from JSON; every field falls back to its default when omitted,
//! so `{}` is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::header::Mode;
use crate::kdf::{KdfLimits, KdfParams};
use sealstream_common::{Error, Result};

/// How containers are written and what they are allowed to cost to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Streaming or sealed.
    pub mode: Mode,
    /// KDF costs used when encrypting.
    pub kdf: KdfParams,
    /// Upper bounds on KDF costs, enforced on both sides.
    pub limits: KdfLimits,
}

impl ContainerConfig {
    /// Default configuration in `mode`.
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// - [`Error::Serialization`] if the JSON is malformed
    /// - [`Error::ParamsOutOfRange`] if the KDF costs exceed the limits
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check that the KDF costs fall within the limits.
    pub fn validate(&self) -> Result<()> {
        self.limits.check(&self.kdf)
    }
}
