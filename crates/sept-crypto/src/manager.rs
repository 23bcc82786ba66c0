//! Secure data manager: the export/import orchestrator
//!
//! Export: validate OTP → stamp metadata → canonical JSON → checksum →
//!         fresh salt + IV → PBKDF2 → AES-256-GCM → envelope
//!
//! Import gates, in order (the first failure wins):
//! 1. envelope shape            → `Format`
//! 2. OTP format                → `Validation`
//! 3. `now > expiresAt`         → `Expired`
//! 4. PBKDF2 + GCM tag          → `Decryption`
//! 5. checksum of plaintext     → `Integrity`
//! 6. snapshot shape            → `Schema`

use std::time::Duration;

use chrono::{SecondsFormat, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};

use sept_core::config::ExportConfig;
use sept_core::{AppSnapshot, SeptError};

use crate::checksum::{checksum, verify_checksum};
use crate::cipher;
use crate::envelope::SecureEnvelope;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, KdfParams};
use crate::otp::validate_otp;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Export policy: KDF cost, validity window and format version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPolicy {
    pub kdf: KdfParams,
    /// How long an envelope stays importable (default: 5 minutes)
    pub validity: Duration,
    /// Version stamped into envelopes and snapshots (default: "1.0.0")
    pub format_version: String,
}

impl Default for ExportPolicy {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportPolicy {
    fn from(config: &ExportConfig) -> Self {
        Self {
            kdf: KdfParams {
                iterations: config.kdf_iterations,
            },
            validity: Duration::from_secs(config.expiry_minutes.saturating_mul(60)),
            format_version: config.format_version.clone(),
        }
    }
}

impl ExportPolicy {
    fn validity_ms(&self) -> i64 {
        i64::try_from(self.validity.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Stateless apart from its policy; construct one wherever it is needed.
#[derive(Debug, Clone, Default)]
pub struct SecureDataManager {
    policy: ExportPolicy,
}

impl SecureDataManager {
    pub fn new(policy: ExportPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExportPolicy {
        &self.policy
    }

    /// Encrypt `snapshot` under `otp`, valid from now.
    pub fn export(&self, snapshot: &AppSnapshot, otp: &str) -> CryptoResult<SecureEnvelope> {
        self.export_at(snapshot, otp, now_ms())
    }

    /// Encrypt `snapshot` under `otp` with an explicit creation time.
    pub fn export_at(
        &self,
        snapshot: &AppSnapshot,
        otp: &str,
        now_ms: i64,
    ) -> CryptoResult<SecureEnvelope> {
        if !validate_otp(otp) {
            return Err(CryptoError::Validation);
        }

        let mut data = snapshot.clone();
        data.stamp_export_metadata(|| iso_timestamp(now_ms), &self.policy.format_version);

        let plaintext = data.to_canonical_json().map_err(serialization_error)?;
        let digest = checksum(plaintext.as_bytes());

        let salt_hex = hex::encode(cipher::random_salt());
        let iv = cipher::random_iv();
        let key = derive_key(
            &SecretString::from(otp),
            salt_hex.as_bytes(),
            &self.policy.kdf,
        )?;
        let sealed = cipher::encrypt(&key, &iv, plaintext.as_bytes())?;

        let envelope = SecureEnvelope::new(
            &sealed,
            salt_hex,
            &iv,
            now_ms,
            self.policy.validity_ms(),
            digest,
            self.policy.format_version.clone(),
        );

        info!(
            bytes = plaintext.len(),
            todos = data.todos.len(),
            expires_at = envelope.expires_at(),
            "secure export created"
        );
        Ok(envelope)
    }

    /// Import from raw JSON as read from an export file.
    pub fn import_value(&self, value: &Value, otp: &str) -> CryptoResult<AppSnapshot> {
        self.import_value_at(value, otp, now_ms())
    }

    pub fn import_value_at(
        &self,
        value: &Value,
        otp: &str,
        now_ms: i64,
    ) -> CryptoResult<AppSnapshot> {
        let envelope = SecureEnvelope::from_value(value).map_err(|e| {
            warn!(kind = e.kind(), "secure import rejected");
            e
        })?;
        self.import_at(&envelope, otp, now_ms)
    }

    /// Import a parsed envelope.
    pub fn import(&self, envelope: &SecureEnvelope, otp: &str) -> CryptoResult<AppSnapshot> {
        self.import_at(envelope, otp, now_ms())
    }

    pub fn import_at(
        &self,
        envelope: &SecureEnvelope,
        otp: &str,
        now_ms: i64,
    ) -> CryptoResult<AppSnapshot> {
        let result = self.open(envelope, otp, now_ms);
        match &result {
            Ok(snapshot) => info!(
                todos = snapshot.todos.len(),
                version = envelope.version(),
                "secure import verified"
            ),
            Err(e) => warn!(kind = e.kind(), "secure import rejected"),
        }
        result
    }

    fn open(&self, envelope: &SecureEnvelope, otp: &str, now_ms: i64) -> CryptoResult<AppSnapshot> {
        if !validate_otp(otp) {
            return Err(CryptoError::Validation);
        }
        if envelope.is_expired(now_ms) {
            return Err(CryptoError::Expired {
                expires_at: envelope.expires_at(),
            });
        }
        if envelope.version() != self.policy.format_version {
            warn!(
                envelope = envelope.version(),
                expected = %self.policy.format_version,
                "envelope version mismatch, attempting compatibility mode"
            );
        }

        // Cheap structural checks before paying for the KDF
        envelope.check_salt()?;
        let iv = envelope.decode_iv()?;
        let sealed = envelope.decode_sealed()?;

        let key = derive_key(
            &SecretString::from(otp),
            envelope.salt().as_bytes(),
            &self.policy.kdf,
        )?;
        let plaintext = cipher::decrypt(&key, &iv, &sealed)?;
        debug!(bytes = plaintext.len(), "envelope decrypted");

        if !verify_checksum(&plaintext, envelope.checksum()) {
            return Err(CryptoError::Integrity);
        }

        let text = String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Schema(format!("not UTF-8: {e}")))?;
        AppSnapshot::parse_json(&text).map_err(|e| CryptoError::Schema(e.to_string()))
    }
}

#[cfg(feature = "async")]
impl SecureDataManager {
    /// [`export`](Self::export) on tokio's blocking pool, so the KDF never
    /// stalls an async caller.
    pub async fn export_async(
        &self,
        snapshot: AppSnapshot,
        otp: SecretString,
    ) -> CryptoResult<SecureEnvelope> {
        use secrecy::ExposeSecret;

        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.export(&snapshot, otp.expose_secret()))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }

    /// [`import_value`](Self::import_value) on tokio's blocking pool.
    pub async fn import_async(&self, value: Value, otp: SecretString) -> CryptoResult<AppSnapshot> {
        use secrecy::ExposeSecret;

        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.import_value(&value, otp.expose_secret()))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }
}

fn serialization_error(e: SeptError) -> CryptoError {
    CryptoError::Serialization(format!("serializing snapshot: {e}"))
}

fn iso_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
