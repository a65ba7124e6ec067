//! Content-derived run identity.
//!
//! A fingerprint is the SHA-256 of the run's canonical JSON: object keys sorted
//! recursively, compact separators, and the client-side `uuid` removed. Two runs
//! with the same content hash identically no matter how their source files
//! ordered fields or how they were indented.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::run::Run;

const FINGERPRINT_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 digest identifying a run's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid fingerprint {0:?}: expected 64 lowercase hex characters")]
pub struct FingerprintError(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == FINGERPRINT_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(FingerprintError(s.to_string()))
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Canonical byte form of a run (the fingerprint preimage).
pub fn canonical_json(run: &Run) -> Vec<u8> {
    let mut value = match serde_json::to_value(run) {
        Ok(value) => value,
        // Run holds only strings, vecs and a JSON map: serialization cannot fail.
        Err(_) => Value::Null,
    };
    if let Value::Object(map) = &mut value {
        map.remove("uuid");
    }
    canonicalize_json_value(&mut value);
    serde_json::to_vec(&value).unwrap_or_default()
}

/// Compute the fingerprint of a run.
pub fn fingerprint(run: &Run) -> Fingerprint {
    let digest = Sha256::digest(canonical_json(run));
    Fingerprint(hex::encode(digest))
}

/// Sort object keys recursively.
///
/// `serde_json/preserve_order` may be enabled anywhere in the dependency graph,
/// so key order is normalized explicitly instead of relying on `Map` internals.
pub fn canonicalize_json_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let old_map = std::mem::take(map);
            let mut entries: Vec<(String, Value)> = old_map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            for (_, v) in entries.iter_mut() {
                canonicalize_json_value(v);
            }

            for (k, v) in entries {
                map.insert(k, v);
            }
        }
        Value::Array(values) => {
            for v in values.iter_mut() {
                canonicalize_json_value(v);
            }
        }
        _ => {}
    }
}
