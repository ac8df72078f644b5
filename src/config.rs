//! Tunable work factors and key-file location.
//!
//! Everything has a default, so an empty TOML file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// MIN_PBKDF2_ITERATIONS is the floor for the password derivation work factor
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;
/// MAX_PBKDF2_ITERATIONS caps the work factor a config or stored record can demand
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;
/// MIN_SALT_LENGTH is 16 bytes
pub const MIN_SALT_LENGTH: usize = 16;
/// Derived key lengths outside this range are rejected (in bytes, not bits)
pub const DERIVED_KEY_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 16..=1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub password: HashParams,
    #[serde(default)]
    pub seal: SealParams,
    #[serde(default)]
    pub keys: KeyFileConfig,
}

/// PBKDF2-HMAC-SHA512 parameters for the account password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,
    /// Length of the derived key in bytes
    #[serde(default = "default_key_len")]
    pub key_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            salt_len: default_salt_len(),
            key_len: default_key_len(),
        }
    }
}

impl HashParams {
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_PBKDF2_ITERATIONS {
            return Err(Error::malformed(format!(
                "pbkdf2 iterations must be at least {MIN_PBKDF2_ITERATIONS}"
            )));
        }
        if self.iterations > MAX_PBKDF2_ITERATIONS {
            return Err(Error::malformed(format!(
                "pbkdf2 iterations must be at most {MAX_PBKDF2_ITERATIONS}"
            )));
        }
        if self.salt_len < MIN_SALT_LENGTH {
            return Err(Error::malformed(format!(
                "salt must be at least {MIN_SALT_LENGTH} bytes"
            )));
        }
        if !DERIVED_KEY_LENGTH_RANGE.contains(&self.key_len) {
            return Err(Error::malformed("derived key length out of range"));
        }
        Ok(())
    }
}

fn default_iterations() -> u32 { MIN_PBKDF2_ITERATIONS }
fn default_salt_len() -> usize { MIN_SALT_LENGTH }
fn default_key_len() -> usize { 64 }

/// Argon2id parameters for the passphrase that seals the private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealParams {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_seal_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for SealParams {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_seal_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl SealParams {
    pub fn validate(&self) -> Result<()> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map(|_| ())
            .map_err(|e| Error::malformed(format!("invalid argon2 parameters: {e}")))
    }
}

// 64 MB, same as the identity pem encryption elsewhere
fn default_memory_kib() -> u32 { 65536 }
fn default_seal_iterations() -> u32 { 3 }
fn default_parallelism() -> u32 { 1 }

/// Where the Identity Agent keeps its key files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFileConfig {
    /// Identifier the key files are saved under (`<id>.key`, `<id>.pub`)
    #[serde(default = "default_key_id")]
    pub id: String,
    #[serde(default = "default_key_dir")]
    pub dir: PathBuf,
}

impl Default for KeyFileConfig {
    fn default() -> Self {
        Self {
            id: default_key_id(),
            dir: default_key_dir(),
        }
    }
}

fn default_key_id() -> String { "client_private".to_string() }
fn default_key_dir() -> PathBuf { PathBuf::from(".") }

impl Config {
    /// Load from a TOML file, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.password.validate()?;
        self.seal.validate()
    }
}

/* ------------------------------------------------------------------------- */

// TESTS
