//! The Identity Agent is the client-side principal. It owns the keypair, keeps the private half
//! sealed in the key-file store, and produces signed messages for the Credential Authority.
//!
//! Keys are Ed25519. The public half travels as SPKI PEM, the private half is PKCS#8 DER sealed
//! under the passphrase (see [`crate::seal`]). Signing is hash-then-sign: the SHA-256 digest of
//! the payload is what gets signed.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand_core::{OsRng, RngCore};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::SealParams;
use crate::errors::{CryptoOp, Error, Result};
use crate::messages::SignedMessage;
use crate::seal::{self, SealedKey};
use crate::store::KeyStore;

/// PRIVATE_SUFFIX names the sealed private key entry: "<id>.key"
const PRIVATE_SUFFIX: &str = ".key";
/// PUBLIC_SUFFIX names the cleartext public key entry: "<id>.pub"
const PUBLIC_SUFFIX: &str = ".pub";

/// KeyPair is what provisioning hands back: the public half in cleartext for the `store` request,
/// and the private half as it was persisted (sealed).
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public_key: String,
    pub sealed_private_key: SealedKey,
}

/// IdentityAgent binds a key-file store to one key identifier.
pub struct IdentityAgent<S: KeyStore> {
    store: S,
    key_id: String,
    seal_params: SealParams,
}

impl<S: KeyStore> IdentityAgent<S> {
    pub fn new(store: S, key_id: &str, seal_params: SealParams) -> Self {
        Self {
            store,
            key_id: key_id.to_string(),
            seal_params,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn private_entry(&self) -> String {
        self.key_id.clone() + PRIVATE_SUFFIX
    }

    fn public_entry(&self) -> String {
        self.key_id.clone() + PUBLIC_SUFFIX
    }

    /// generate_keypair creates a fresh keypair, seals the private half under `passphrase` and
    /// saves both halves. On any failure the store is left as it was before the call.
    pub fn generate_keypair(&self, passphrase: &str) -> Result<KeyPair> {
        // Fresh secret straight from the OS so an RNG failure surfaces instead of panicking
        let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        OsRng
            .try_fill_bytes(&mut secret[..])
            .map_err(|_| Error::CryptoOperationFailed(CryptoOp::KeyGeneration))?;
        let signing_key = SigningKey::from_bytes(&secret);

        // Encode both halves before anything touches the store
        let private_der = signing_key
            .to_pkcs8_der()
            .map_err(|_| Error::CryptoOperationFailed(CryptoOp::KeyGeneration))?;
        let public_key = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| Error::CryptoOperationFailed(CryptoOp::KeyGeneration))?;
        let sealed_private_key = seal::seal(private_der.as_bytes(), passphrase, &self.seal_params)?;
        let sealed_bytes = sealed_private_key.to_bytes()?;

        // Keep whatever private key was there so a failed public save can put it back
        let private_entry = self.private_entry();
        let previous = self.store.load(&private_entry).ok();
        self.store
            .save(&private_entry, &sealed_bytes)
            .map_err(|e| Error::key_store(&private_entry, e))?;
        let public_entry = self.public_entry();
        if let Err(e) = self.store.save(&public_entry, public_key.as_bytes()) {
            self.roll_back(&private_entry, previous.as_deref());
            return Err(Error::key_store(&public_entry, e));
        }

        info!(key_id = %self.key_id, "generated and sealed a new keypair");
        Ok(KeyPair {
            public_key,
            sealed_private_key,
        })
    }

    /// roll_back restores the previous private entry, or removes it if there was none
    fn roll_back(&self, private_entry: &str, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(bytes) => self.store.save(private_entry, bytes),
            None => self.store.remove(private_entry),
        };
        if let Err(e) = restored {
            warn!(key_id = %self.key_id, error = %e, "could not roll back private key entry");
        }
    }

    /// public_key reloads the saved public half (PEM).
    pub fn public_key(&self) -> Result<String> {
        let entry = self.public_entry();
        let bytes = self
            .store
            .load(&entry)
            .map_err(|e| Error::key_store(&entry, e))?;
        String::from_utf8(bytes).map_err(|_| Error::malformed("public key file is not text"))
    }

    /// unlock loads and decrypts the private key. The plaintext only lives for the caller's scope.
    fn unlock(&self, passphrase: &str) -> Result<SigningKey> {
        let entry = self.private_entry();
        let bytes = self
            .store
            .load(&entry)
            .map_err(|e| Error::key_store(&entry, e))?;
        let sealed = SealedKey::from_bytes(&bytes)?;
        let der = seal::unseal(&sealed, passphrase)?;
        SigningKey::from_pkcs8_der(&der).map_err(|_| Error::KeyUnlockFailed)
    }

    /// sign_message unlocks the key and signs the SHA-256 digest of `message`.
    pub fn sign_message(&self, passphrase: &str, message: &[u8]) -> Result<SignedMessage> {
        let signing_key = self.unlock(passphrase)?;
        let signature = signing_key
            .try_sign(&digest(message))
            .map_err(|_| Error::CryptoOperationFailed(CryptoOp::Sign))?;
        debug!(key_id = %self.key_id, len = message.len(), "signed message");
        Ok(SignedMessage::new(message, signature.to_bytes()))
    }

    /// sign is `sign_message` straight into the wire form.
    pub fn sign(&self, passphrase: &str, message: &[u8]) -> Result<String> {
        self.sign_message(passphrase, message).map(|signed| signed.to_wire())
    }
}

/// digest is the "hash" half of hash-then-sign
fn digest(payload: &[u8]) -> Output<Sha256> {
    Sha256::digest(payload)
}

/// parse_public_key reads an SPKI PEM Ed25519 public key.
pub fn parse_public_key(pem: &str) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem.trim())
        .map_err(|_| Error::malformed("public key is not an Ed25519 SPKI PEM"))
}

/// verify_signature checks a signed message against `public_key`. Malformed signatures and
/// mismatches are both just `false`.
pub fn verify_signature(public_key: &VerifyingKey, message: &SignedMessage) -> bool {
    let Ok(signature) = Signature::from_slice(&message.signature) else {
        return false;
    };
    public_key
        .verify_strict(&digest(&message.payload), &signature)
        .is_ok()
}

/* ------------------------------------------------------------------------- */

// TESTS
