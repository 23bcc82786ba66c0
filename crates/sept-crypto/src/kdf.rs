//! Key derivation: OTP → export key via PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// A 256-bit AES key derived for one envelope.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct ExportKey {
    bytes: [u8; KEY_SIZE],
}

impl ExportKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ExportKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ExportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: sept_core::config::DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.iterations == 0 {
            return Err(CryptoError::Kdf("PBKDF2 iteration count must be non-zero".into()));
        }
        Ok(())
    }
}

/// Derive a 256-bit export key from an OTP and salt.
///
/// Accepts any secret; interactive callers must run `validate_otp` first so
/// malformed input never pays for a full derivation.
pub fn derive_key(
    secret: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> CryptoResult<ExportKey> {
    params.validate()?;

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        secret.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut key,
    );
    Ok(ExportKey::from_bytes(key))
}
