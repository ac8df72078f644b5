//! The Credential Authority holds the one account record and answers `register`, `store` and
//! `verify`.
//!
//! The account lives behind a single mutex that is held for the whole of each operation,
//! password derivation included. All fallible work happens before the record is touched and the
//! transition is a single assignment, so no half-applied state is ever visible to the next
//! request.

use std::sync::{Mutex, MutexGuard};

use ed25519_dalek::VerifyingKey;
use tracing::{debug, info, warn};

use crate::config::HashParams;
use crate::errors::{Error, Result};
use crate::messages::SignedMessage;
use crate::password::{self, Credential};
use crate::principal::{parse_public_key, verify_signature};

/// AuthorityState is where the account is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuthorityState {
    Unregistered,
    Registered,
    KeyProvisioned,
}

/// Account is the sole server-side record. The password hash never changes after registration;
/// the public key is only ever set right after the password checked out.
#[derive(Debug)]
pub(crate) struct Account {
    password_hash: Credential,
    public_key: Option<VerifyingKey>,
}

#[derive(Debug, Default)]
pub struct CredentialAuthority {
    params: HashParams,
    account: Mutex<Option<Account>>,
}

impl CredentialAuthority {
    pub fn new(params: HashParams) -> Self {
        Self {
            params,
            account: Mutex::new(None),
        }
    }

    // Every transition commits with one assignment, so a poisoned lock still guards a whole state
    fn account(&self) -> MutexGuard<'_, Option<Account>> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> AuthorityState {
        match self.account().as_ref() {
            None => AuthorityState::Unregistered,
            Some(Account { public_key: None, .. }) => AuthorityState::Registered,
            Some(Account { public_key: Some(_), .. }) => AuthorityState::KeyProvisioned,
        }
    }

    /// register creates the account. Only valid while no account exists.
    pub fn register(&self, password: &str) -> Result<()> {
        let mut account = self.account();
        if account.is_some() {
            warn!("registration refused: an account already exists");
            return Err(Error::AlreadyRegistered);
        }
        let password_hash = password::hash(password, &self.params)?;
        *account = Some(Account {
            password_hash,
            public_key: None,
        });
        info!("account registered");
        Ok(())
    }

    /// store re-authenticates with the password and then sets (or replaces) the public key.
    pub fn store(&self, password: &str, public_key: &str) -> Result<()> {
        let mut guard = self.account();
        let Some(account) = guard.as_mut() else {
            warn!("public key refused: no account registered");
            return Err(Error::AuthenticationFailed);
        };
        if !password::verify(password, &account.password_hash) {
            warn!("public key refused: credentials invalid");
            return Err(Error::AuthenticationFailed);
        }
        let public_key = parse_public_key(public_key)?;
        let replaced = account.public_key.replace(public_key).is_some();
        info!(replaced, "public key stored");
        Ok(())
    }

    /// verify checks a wire-form signed message against the stored public key. Anything short of
    /// a valid signature, malformed input and a missing key included, is `VerificationFailed`.
    pub fn verify(&self, wire: &str) -> Result<()> {
        let public_key = match self.account().as_ref().and_then(|a| a.public_key) {
            Some(key) => key,
            None => {
                debug!("verification failed: no public key provisioned");
                return Err(Error::VerificationFailed);
            }
        };
        let message = match SignedMessage::from_wire(wire) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "verification failed: unparseable signed message");
                return Err(Error::VerificationFailed);
            }
        };
        if verify_signature(&public_key, &message) {
            info!(len = message.payload.len(), "message verified");
            Ok(())
        } else {
            debug!("verification failed: signature mismatch");
            Err(Error::VerificationFailed)
        }
    }
}

/* ------------------------------------------------------------------------- */

// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CryptoOp;
    use crate::principal::tests::agent;

    fn authority() -> CredentialAuthority {
        CredentialAuthority::new(HashParams::default())
    }

    /// flip_signature_char changes one hex digit in the signature half of a wire form
    fn flip_signature_char(wire: &str) -> String {
        let mut flipped = wire.to_string();
        let idx = flipped.len() - 1;
        let replacement = if flipped.ends_with('a') { "b" } else { "a" };
        flipped.replace_range(idx.., replacement);
        flipped
    }

    #[test]
    fn starts_unregistered() {
        assert_eq!(authority().state(), AuthorityState::Unregistered);
    }

    #[test]
    fn second_register_fails_and_keeps_first_credential() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        let first = authority.account().as_ref().unwrap().password_hash.clone();

        let result = authority.register("other");
        assert!(matches!(result, Err(Error::AlreadyRegistered)));
        let account = authority.account();
        let current = &account.as_ref().unwrap().password_hash;
        assert_eq!(current, &first);
        assert!(password::verify("p@ss", current));
    }

    #[test]
    fn failed_hash_leaves_authority_unregistered() {
        let authority = CredentialAuthority::new(HashParams { iterations: 10, ..HashParams::default() });
        let err = authority.register("p@ss").unwrap_err();
        assert!(matches!(err, Error::CryptoOperationFailed(CryptoOp::Hash)));
        assert_eq!(err.reason(), "hash-failure");
        assert_eq!(authority.state(), AuthorityState::Unregistered);
    }

    #[test]
    fn store_before_register_is_unauthenticated() {
        let authority = authority();
        let keypair = agent().generate_keypair("unlock").unwrap();
        let result = authority.store("p@ss", &keypair.public_key);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
        assert_eq!(authority.state(), AuthorityState::Unregistered);
    }

    #[test]
    fn full_flow() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        assert_eq!(authority.state(), AuthorityState::Registered);

        let agent = agent();
        let keypair = agent.generate_keypair("unlock").unwrap();
        authority.store("p@ss", &keypair.public_key).unwrap();
        assert_eq!(authority.state(), AuthorityState::KeyProvisioned);

        let wire = agent.sign("unlock", b"hello").unwrap();
        authority.verify(&wire).unwrap();

        let tampered = flip_signature_char(&wire);
        assert!(matches!(authority.verify(&tampered), Err(Error::VerificationFailed)));
    }

    #[test]
    fn wrong_password_keeps_previous_key() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        let alice = agent();
        let mallory = agent();
        authority.store("p@ss", &alice.generate_keypair("a").unwrap().public_key).unwrap();

        let mallory_key = mallory.generate_keypair("m").unwrap().public_key;
        let result = authority.store("guess", &mallory_key);
        assert!(matches!(result, Err(Error::AuthenticationFailed)));

        authority.verify(&alice.sign("a", b"still me").unwrap()).unwrap();
        let forged = mallory.sign("m", b"still me").unwrap();
        assert!(matches!(authority.verify(&forged), Err(Error::VerificationFailed)));
    }

    #[test]
    fn store_overwrites_key() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        let old = agent();
        let new = agent();
        authority.store("p@ss", &old.generate_keypair("o").unwrap().public_key).unwrap();
        authority.store("p@ss", &new.generate_keypair("n").unwrap().public_key).unwrap();
        assert_eq!(authority.state(), AuthorityState::KeyProvisioned);

        authority.verify(&new.sign("n", b"hi").unwrap()).unwrap();
        assert!(authority.verify(&old.sign("o", b"hi").unwrap()).is_err());
    }

    #[test]
    fn malformed_public_key_changes_nothing() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        let result = authority.store("p@ss", "not a key");
        assert!(matches!(result, Err(Error::MalformedInput(_))));
        assert_eq!(authority.state(), AuthorityState::Registered);
    }

    #[test]
    fn verify_without_key_fails() {
        let authority = authority();
        let agent = agent();
        agent.generate_keypair("unlock").unwrap();
        let wire = agent.sign("unlock", b"hello").unwrap();
        assert!(matches!(authority.verify(&wire), Err(Error::VerificationFailed)));
        authority.register("p@ss").unwrap();
        assert!(matches!(authority.verify(&wire), Err(Error::VerificationFailed)));
    }

    #[test]
    fn malformed_wire_is_verification_failure() {
        let authority = authority();
        authority.register("p@ss").unwrap();
        let agent = agent();
        authority.store("p@ss", &agent.generate_keypair("unlock").unwrap().public_key).unwrap();
        for wire in ["", "nodelimiter", "zz|zz", "68656c6c6f|", "|"] {
            assert!(matches!(authority.verify(wire), Err(Error::VerificationFailed)));
        }
    }

    #[test]
    fn concurrent_registration_has_one_winner() {
        let authority = authority();
        let results: Vec<Result<()>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let authority = &authority;
                    s.spawn(move || authority.register(&format!("password-{i}")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::AlreadyRegistered)));
        assert_eq!(authority.state(), AuthorityState::Registered);
    }
}
