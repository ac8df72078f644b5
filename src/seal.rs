//! Passphrase sealing for the private key at rest.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id over the passphrase and a per-seal salt, then HKDF-SHA256 with a
//!   fixed context label so the Argon2 output is never used directly as a cipher key
//! - **Encryption**: ChaCha20-Poly1305, fresh nonce per seal
//!
//! The sealed blob is a small versioned JSON document with hex fields. Nothing in it is secret
//! without the passphrase.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::SealParams;
use crate::errors::{CryptoOp, Error, Result};

/// SEAL_VERSION is bumped whenever the blob layout or derivation changes
pub const SEAL_VERSION: u32 = 1;
/// SALT_LENGTH is 16 bytes
pub const SALT_LENGTH: usize = 16;
/// NONCE_LENGTH is 12 bytes (ChaCha20-Poly1305)
pub const NONCE_LENGTH: usize = 12;
/// KEY_CONTEXT_BYTES binds the derived cipher key to this use and blob version
const KEY_CONTEXT_BYTES: &[u8] = b"trustseal:private-key-seal:v1";

/// SealedKey is the encrypted private key as persisted by the key-file store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub version: u32,
    pub kdf: SealParams,
    /// hex
    pub salt: String,
    /// hex
    pub nonce: String,
    /// hex, includes the 16-byte auth tag
    pub ciphertext: String,
}

impl SealedKey {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|_| Error::CryptoOperationFailed(CryptoOp::Seal))
    }

    /// A blob that does not parse is a corrupt key, which the caller sees as an unlock failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<SealedKey> {
        serde_json::from_slice(bytes).map_err(|_| Error::KeyUnlockFailed)
    }
}

/// derive_cipher_key stretches the passphrase with Argon2id and expands it with HKDF
fn derive_cipher_key(
    passphrase: &str,
    salt: &[u8],
    params: &SealParams,
) -> Option<Zeroizing<[u8; 32]>> {
    let argon2_params =
        Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32)).ok()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
    let mut master = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut master[..])
        .ok()?;
    let kdf = Hkdf::<Sha256>::new(Some(salt), &master[..]);
    let mut key = Zeroizing::new([0u8; 32]);
    kdf.expand(KEY_CONTEXT_BYTES, &mut key[..]).ok()?;
    Some(key)
}

/// seal encrypts `secret` under a key derived from `passphrase`.
pub fn seal(secret: &[u8], passphrase: &str, params: &SealParams) -> Result<SealedKey> {
    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt)
        .and_then(|_| OsRng.try_fill_bytes(&mut nonce))
        .map_err(|_| Error::CryptoOperationFailed(CryptoOp::Seal))?;

    let key = derive_cipher_key(passphrase, &salt, params)
        .ok_or(Error::CryptoOperationFailed(CryptoOp::Seal))?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), secret)
        .map_err(|_| Error::CryptoOperationFailed(CryptoOp::Seal))?;

    Ok(SealedKey {
        version: SEAL_VERSION,
        kdf: *params,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    })
}

/// unseal recovers the secret. Every failure (wrong passphrase, tampered or truncated blob,
/// unknown version) is `KeyUnlockFailed`.
pub fn unseal(sealed: &SealedKey, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.version != SEAL_VERSION {
        return Err(Error::KeyUnlockFailed);
    }
    let salt = hex::decode(&sealed.salt).map_err(|_| Error::KeyUnlockFailed)?;
    let mut nonce = [0u8; NONCE_LENGTH];
    hex::decode_to_slice(&sealed.nonce, &mut nonce).map_err(|_| Error::KeyUnlockFailed)?;
    let ciphertext = hex::decode(&sealed.ciphertext).map_err(|_| Error::KeyUnlockFailed)?;

    let key = derive_cipher_key(passphrase, &salt, &sealed.kdf).ok_or(Error::KeyUnlockFailed)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| Error::KeyUnlockFailed)
}

/* ------------------------------------------------------------------------- */

// TESTS
