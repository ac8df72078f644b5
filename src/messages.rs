//! Signed messages and their wire form.
//!
//! The wire form is `hex(payload) + "|" + hex(signature)`, both lower-case. Hex never contains
//! the delimiter, so no escaping is needed.

use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// WIRE_DELIMITER separates the payload half from the signature half
pub const WIRE_DELIMITER: char = '|';

/// SignedMessage wraps up a payload and the signature produced over it. It is transient and never
/// persisted; it only exists to cross from the Identity Agent to the Credential Authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedMessage {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedMessage {
    pub fn new(payload: impl Into<Vec<u8>>, signature: impl Into<Vec<u8>>) -> SignedMessage {
        SignedMessage {
            payload: payload.into(),
            signature: signature.into(),
        }
    }

    /// to_wire encodes as "<hex-payload>|<hex-signature>"
    ///
    /// Example: 68656c6c6f|9f3b...0c
    pub fn to_wire(&self) -> String {
        hex::encode(&self.payload) + "|" + &hex::encode(&self.signature)
    }

    /// from_wire parses the wire form back into payload and signature bytes
    pub fn from_wire(wire: &str) -> Result<SignedMessage> {
        let (payload_hex, signature_hex) = wire
            .split_once(WIRE_DELIMITER)
            .ok_or_else(|| Error::malformed("signed message has no delimiter"))?;
        let payload =
            hex::decode(payload_hex).map_err(|_| Error::malformed("payload is not hex"))?;
        // a second delimiter lands here and fails the hex decode
        let signature =
            hex::decode(signature_hex).map_err(|_| Error::malformed("signature is not hex"))?;
        Ok(SignedMessage { payload, signature })
    }
}

impl fmt::Display for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for SignedMessage {
    type Err = Error;

    fn from_str(wire: &str) -> Result<Self> {
        SignedMessage::from_wire(wire)
    }
}

/* ------------------------------------------------------------------------- */

// TESTS
