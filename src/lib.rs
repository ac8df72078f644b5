//! # Trustseal
//!
//! A minimal trust-establishment protocol between one client and one server. The client registers
//! with a password, uploads a public key once that password checks out, and afterwards proves
//! authorship of messages with signatures the server verifies against the stored key.
//!
//! ### Warnings and Disclaimers
//!
//! - There is exactly one account per server process, and it lives in memory only. A restart
//!   forgets it.
//! - There are no sessions, no replay protection and no rate limiting. Every request either
//!   re-authenticates with the password or relies on the stored public key alone.
//! - This library does NOT provide a transport. Requests and responses are plain byte payloads;
//!   carrying them over an encrypted, server-authenticated channel is the caller's job.
//!
//! ### Examples / API
//!
//! The server side owns a [`CredentialAuthority`]. The client first registers a password.
//!
//! ```rust
//! let authority = CredentialAuthority::new(HashParams::default());
//! authority.register("p@ss")?;
//! ```
//!
//! The client then generates a keypair. The private half is sealed under a passphrase and saved
//! to the key-file store; the public half goes to the server together with the password.
//!
//! ```rust
//! let agent = IdentityAgent::new(FileKeyStore::new("."), "client_private", SealParams::default());
//! let keypair = agent.generate_keypair("unlock")?;
//! authority.store("p@ss", &keypair.public_key)?;
//! ```
//!
//! Signing happens entirely on the client. The result is the wire form
//! `hex(payload)|hex(signature)`, which the server checks against the stored key.
//!
//! ```rust
//! let wire = agent.sign("unlock", b"hello")?;
//! authority.verify(&wire)?;
//! ```
//!
//! A transport only needs [`protocol::handle`], which takes a route (`/register`, `/store`,
//! `/verify`) and a JSON body and returns a [`protocol::Response`].
//!
//! ### Under the Hood
//!
//! - Passwords: PBKDF2-HMAC-SHA512, at least 100,000 iterations, 16-byte random salt, 64-byte
//!   derived key, constant-time comparison.
//! - Keys: Ed25519, public half as SPKI PEM. Signatures are over the SHA-256 digest of the payload.
//! - Private key at rest: PKCS#8 sealed with ChaCha20-Poly1305 under an Argon2id + HKDF key.
//!
//! Every primitive failure is turned into an [`Error`] with a stable [`Error::reason`] before it
//! leaves the crate. Wrong passphrases on signing are [`Error::KeyUnlockFailed`], never an
//! authentication error.

pub mod authority;
pub mod config;
pub mod errors;
pub mod messages;
pub mod password;
pub mod principal;
pub mod protocol;
pub mod seal;
pub mod store;

pub use authority::{AuthorityState, CredentialAuthority};
pub use config::{Config, HashParams, SealParams};
pub use errors::{CryptoOp, Error, Result};
pub use messages::SignedMessage;
pub use principal::{IdentityAgent, KeyPair};
pub use store::{FileKeyStore, KeyStore, MemoryKeyStore};
