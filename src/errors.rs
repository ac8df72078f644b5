//! Error taxonomy shared by the Credential Authority and the Identity Agent.
//!
//! Every primitive error (PBKDF2, Argon2, AEAD, Ed25519, PKCS#8, serde) is converted into one of
//! these kinds before it leaves the crate. None of the messages carry password or key material.

use std::io;

use thiserror::Error;

/// The primitive that failed inside a [`Error::CryptoOperationFailed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CryptoOp {
    /// Password derivation or salt generation
    Hash,
    /// Keypair generation or encoding
    KeyGeneration,
    /// Sealing the private key under the passphrase
    Seal,
    /// Producing a signature
    Sign,
}

/// Errors that can occur during the protocol
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// `register` was called while an account already exists
    #[error("an account is already registered")]
    AlreadyRegistered,
    /// Bad password on `store`, or no account to authenticate against
    #[error("credentials invalid")]
    AuthenticationFailed,
    /// Wrong passphrase or corrupt key file on `sign`
    #[error("could not unlock key")]
    KeyUnlockFailed,
    /// Bad or missing signature, or no provisioned public key
    #[error("message not verified")]
    VerificationFailed,
    /// Unparseable wire form or request shape
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// An underlying hash/keygen/seal/sign primitive failed
    #[error("cryptographic operation failed: {0:?}")]
    CryptoOperationFailed(CryptoOp),
    /// The key-file store could not load or save an entry
    #[error("key store failure for {identifier}")]
    KeyStore {
        identifier: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Stable reason string reported to the caller on the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::AlreadyRegistered => "already-registered",
            Error::AuthenticationFailed => "unauthenticated",
            Error::KeyUnlockFailed => "key-unlock-failed",
            Error::VerificationFailed => "unverified",
            Error::MalformedInput(_) => "malformed-input",
            Error::CryptoOperationFailed(CryptoOp::Hash) => "hash-failure",
            Error::CryptoOperationFailed(CryptoOp::KeyGeneration) => "keygen-failure",
            Error::CryptoOperationFailed(CryptoOp::Seal) => "seal-failure",
            Error::CryptoOperationFailed(CryptoOp::Sign) => "sign-failure",
            Error::KeyStore { .. } => "key-store-failure",
        }
    }

    /// Whether the caller can recover by retrying with corrected input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::CryptoOperationFailed(_) | Error::KeyStore { .. })
    }

    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        Error::MalformedInput(what.into())
    }

    pub(crate) fn key_store(identifier: &str, source: io::Error) -> Self {
        Error::KeyStore {
            identifier: identifier.to_string(),
            source,
        }
    }
}

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/* ------------------------------------------------------------------------- */

// TESTS
