//! AES-256-GCM sealing of the snapshot plaintext
//!
//! Sealed format (binary, hex-encoded into the envelope):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The IV travels separately in the envelope. No associated data is bound;
//! the checksum and envelope metadata are covered by the post-decryption
//! integrity check instead.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::ExportKey;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Fresh random KDF salt from the OS CSPRNG.
pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Fresh random 96-bit GCM nonce from the OS CSPRNG.
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under `key` and `iv`.
///
/// Returns `ciphertext || tag`. The caller must never reuse an IV with the
/// same key.
pub fn encrypt(key: &ExportKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-256-GCM: {e}")))
}

/// Decrypt `ciphertext || tag` produced by [`encrypt`].
///
/// A wrong key, wrong IV, truncated input or any flipped bit all fail the
/// same way, with [`CryptoError::Decryption`].
pub fn decrypt(key: &ExportKey, iv: &[u8; IV_SIZE], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < TAG_SIZE {
        return Err(CryptoError::Decryption);
    }
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), sealed)
        .map_err(|_| CryptoError::Decryption)
}
