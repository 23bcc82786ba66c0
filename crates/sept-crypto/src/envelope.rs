//! Secure export envelope
//!
//! The only artifact that leaves the process. Serialized as a flat JSON
//! object with exactly seven fields:
//!
//! ```json
//! {
//!   "encryptedData": "<hex: ciphertext || tag>",
//!   "salt": "<hex: 16 bytes>",
//!   "iv": "<hex: 12 bytes>",
//!   "timestamp": 1760790896000,
//!   "expiresAt": 1760791196000,
//!   "checksum": "<hex: SHA-256 of plaintext>",
//!   "version": "1.0.0"
//! }
//! ```
//!
//! Envelopes are immutable: fields are private and only the exporter can
//! build one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CryptoError, CryptoResult};
use crate::{IV_SIZE, SALT_SIZE};

const MS_PER_MINUTE: i64 = 60 * 1000;

const STRING_FIELDS: [&str; 5] = ["encryptedData", "salt", "iv", "checksum", "version"];
const INTEGER_FIELDS: [&str; 2] = ["timestamp", "expiresAt"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureEnvelope {
    encrypted_data: String,
    salt: String,
    iv: String,
    timestamp: i64,
    expires_at: i64,
    checksum: String,
    version: String,
}

/// Shape check run before any cryptographic work: a JSON object carrying all
/// seven fields with the right primitive types.
pub fn is_valid_envelope(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    STRING_FIELDS
        .iter()
        .all(|f| obj.get(*f).is_some_and(Value::is_string))
        && INTEGER_FIELDS
            .iter()
            .all(|f| obj.get(*f).and_then(Value::as_i64).is_some())
}

/// Download filename: `<app>-secure-<ISO 8601 with ':' and '.' as '-'>.json`
pub fn secure_filename(app_name: &str, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{app_name}-secure-{stamp}.json")
}

impl SecureEnvelope {
    /// Assemble a new envelope. `expires_at` is always `timestamp + validity`.
    pub(crate) fn new(
        sealed: &[u8],
        salt_hex: String,
        iv: &[u8; IV_SIZE],
        timestamp: i64,
        validity_ms: i64,
        checksum: String,
        version: String,
    ) -> Self {
        Self {
            encrypted_data: hex::encode(sealed),
            salt: salt_hex,
            iv: hex::encode(iv),
            timestamp,
            expires_at: timestamp.saturating_add(validity_ms),
            checksum,
            version,
        }
    }

    /// Parse from an already-decoded JSON value, gating on shape first.
    pub fn from_value(value: &Value) -> CryptoResult<Self> {
        if !is_valid_envelope(value) {
            return Err(CryptoError::Format(
                "missing or mistyped envelope fields".into(),
            ));
        }
        Self::deserialize(value).map_err(|e| CryptoError::Format(e.to_string()))
    }

    /// Parse from the text of an export file.
    pub fn from_json_str(text: &str) -> CryptoResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CryptoError::Format(format!("not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Pretty JSON (2-space indent) as written to disk.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn encrypted_data(&self) -> &str {
        &self.encrypted_data
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn iv(&self) -> &str {
        &self.iv
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    /// Whole minutes until expiry, rounded up; zero once expired.
    pub fn remaining_minutes(&self, now_ms: i64) -> u64 {
        let remaining = self.expires_at.saturating_sub(now_ms);
        if remaining <= 0 {
            return 0;
        }
        ((remaining - 1) / MS_PER_MINUTE + 1) as u64
    }

    /// Decode and length-check the salt. The KDF consumes the hex text, but
    /// a malformed salt means the file was not produced by an exporter.
    pub(crate) fn check_salt(&self) -> CryptoResult<()> {
        let bytes = hex::decode(&self.salt)
            .map_err(|e| CryptoError::Format(format!("salt is not hex: {e}")))?;
        if bytes.len() != SALT_SIZE {
            return Err(CryptoError::Format(format!(
                "salt must be {SALT_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn decode_iv(&self) -> CryptoResult<[u8; IV_SIZE]> {
        let bytes = hex::decode(&self.iv)
            .map_err(|e| CryptoError::Format(format!("iv is not hex: {e}")))?;
        bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Format(format!("iv must be {IV_SIZE} bytes, got {}", bytes.len()))
        })
    }

    /// Ciphertext that is not even hex is indistinguishable from tampering.
    pub(crate) fn decode_sealed(&self) -> CryptoResult<Vec<u8>> {
        hex::decode(&self.encrypted_data).map_err(|_| CryptoError::Decryption)
    }
}
