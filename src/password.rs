//! Salted, deliberately slow password derivation for the account credential.
//!
//! PBKDF2-HMAC-SHA512 with a fresh random salt per call. The stored record keeps the iteration
//! count next to the salt so the work factor can be raised without invalidating old records.

use std::fmt;
use std::str::FromStr;

use pbkdf2::pbkdf2_hmac;
use rand_core::{OsRng, RngCore};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::{
    HashParams, DERIVED_KEY_LENGTH_RANGE, MAX_PBKDF2_ITERATIONS, MIN_PBKDF2_ITERATIONS,
    MIN_SALT_LENGTH,
};
use crate::errors::{CryptoOp, Error, Result};

/// RECORD_DELIMITER separates the fields of the textual record: "<iterations>|<hex-salt>|<hex-key>"
const RECORD_DELIMITER: char = '|';

/// Credential is the opaque `(salt, derivedKey)` record stored for the account.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    iterations: u32,
    salt: Vec<u8>,
    derived_key: Vec<u8>,
}

impl Credential {
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn derived_key(&self) -> &[u8] {
        &self.derived_key
    }

    /// A record we would never have produced ourselves is treated as unusable.
    fn is_well_formed(&self) -> bool {
        (MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&self.iterations)
            && self.salt.len() >= MIN_SALT_LENGTH
            && DERIVED_KEY_LENGTH_RANGE.contains(&self.derived_key.len())
    }
}

// The derived key never shows up in logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("iterations", &self.iterations)
            .field("salt", &hex::encode(&self.salt))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.iterations,
            hex::encode(&self.salt),
            hex::encode(&self.derived_key),
            d = RECORD_DELIMITER
        )
    }
}

impl FromStr for Credential {
    type Err = Error;

    fn from_str(record: &str) -> Result<Self> {
        let parts = record.split(RECORD_DELIMITER).collect::<Vec<&str>>();
        if parts.len() != 3 {
            return Err(Error::malformed("credential record is not 3 parts"));
        }
        let iterations = parts[0]
            .parse::<u32>()
            .map_err(|_| Error::malformed("credential iteration count"))?;
        let salt = hex::decode(parts[1]).map_err(|_| Error::malformed("credential salt"))?;
        let derived_key = hex::decode(parts[2]).map_err(|_| Error::malformed("credential key"))?;
        Ok(Credential { iterations, salt, derived_key })
    }
}

/// hash derives a new credential from the password under a fresh salt.
pub fn hash(password: &str, params: &HashParams) -> Result<Credential> {
    params
        .validate()
        .map_err(|_| Error::CryptoOperationFailed(CryptoOp::Hash))?;
    let mut salt = vec![0u8; params.salt_len];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|_| Error::CryptoOperationFailed(CryptoOp::Hash))?;
    let mut derived_key = vec![0u8; params.key_len];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), &salt, params.iterations, &mut derived_key);
    Ok(Credential {
        iterations: params.iterations,
        salt,
        derived_key,
    })
}

/// verify recomputes the derivation with the stored salt and compares in constant time.
///
/// A malformed record is a failed verification, never an error.
pub fn verify(password: &str, credential: &Credential) -> bool {
    if !credential.is_well_formed() {
        tracing::warn!("refusing to verify against a malformed credential record");
        return false;
    }
    let mut candidate = Zeroizing::new(vec![0u8; credential.derived_key.len()]);
    pbkdf2_hmac::<Sha512>(
        password.as_bytes(),
        &credential.salt,
        credential.iterations,
        &mut candidate,
    );
    candidate.as_slice().ct_eq(credential.derived_key.as_slice()).into()
}

/// verify_record is `verify` over the textual record form.
pub fn verify_record(password: &str, record: &str) -> bool {
    match record.parse::<Credential>() {
        Ok(credential) => verify(password, &credential),
        Err(_) => false,
    }
}

/* ------------------------------------------------------------------------- */

// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hash_then_verify() {
        let params = HashParams::default();
        let credential = hash("correct-horse-battery-staple", &params).unwrap();
        assert_eq!(credential.salt().len(), 16);
        assert_eq!(credential.derived_key().len(), 64);
        assert!(verify("correct-horse-battery-staple", &credential));
        assert!(!verify("wrong-password", &credential));
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let params = HashParams::default();
        let first = hash("p@ss", &params).unwrap();
        let second = hash("p@ss", &params).unwrap();
        assert_ne!(first.salt(), second.salt());
        assert_ne!(first, second);
        assert!(verify("p@ss", &first));
        assert!(verify("p@ss", &second));
    }

    #[test]
    fn record_text_form() {
        let credential = hash("p@ss", &HashParams::default()).unwrap();
        let record = credential.to_string();
        assert_eq!(record.matches('|').count(), 2);
        assert!(record.starts_with("100000|"));
        let parsed: Credential = record.parse().unwrap();
        assert_eq!(parsed, credential);
        assert!(verify_record("p@ss", &record));
    }

    #[test]
    fn malformed_records_fail_verification() {
        assert!(!verify_record("p@ss", ""));
        assert!(!verify_record("p@ss", "not-a-record"));
        assert!(!verify_record("p@ss", "100000|zz|00"));
        // well-formed hex, but a work factor we would never produce
        let salt = "00".repeat(16);
        let key = "00".repeat(64);
        assert!(!verify_record("p@ss", &format!("1|{salt}|{key}")));
        // empty derived key must not compare equal to an empty candidate
        assert!(!verify_record("p@ss", &format!("100000|{salt}|")));
    }

    #[test]
    fn oversized_work_factor_is_refused_without_deriving() {
        let salt = "00".repeat(16);
        let key = "00".repeat(64);
        let started = std::time::Instant::now();
        assert!(!verify_record("p@ss", &format!("{}|{salt}|{key}", u32::MAX)));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn weak_params_are_a_hash_failure() {
        let params = HashParams { iterations: 10, ..HashParams::default() };
        let result = hash("p@ss", &params);
        assert!(matches!(result, Err(Error::CryptoOperationFailed(CryptoOp::Hash))));
    }

    #[test]
    fn debug_hides_derived_key() {
        let credential = hash("p@ss", &HashParams::default()).unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains(&hex::encode(credential.derived_key())));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))] // each case derives three times
        #[test]
        fn only_the_original_password_verifies(p in ".{0,32}", q in ".{0,32}") {
            prop_assume!(p != q);
            let credential = hash(&p, &HashParams::default()).unwrap();
            prop_assert!(verify(&p, &credential));
            prop_assert!(!verify(&q, &credential));
        }
    }
}
