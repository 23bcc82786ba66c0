//! sept-crypto: OTP-protected secure export/import for september
//!
//! Pipeline: snapshot → canonical JSON → SHA-256 checksum → AES-256-GCM → hex envelope
//!
//! Key schedule:
//! ```text
//! OTP (6 digits, ~20 bits)
//!   └── PBKDF2-HMAC-SHA256 (100k iterations, salt = fresh 16 random bytes, hex text)
//!       └── Export Key (256-bit, one per envelope)
//!           └── AES-256-GCM (nonce = fresh 96-bit IV, output = ciphertext || tag)
//! ```
//!
//! Every export draws a new salt and IV, so no (key, IV) pair is ever reused.
//! An envelope is only importable for a short window after creation (5
//! minutes by default), which bounds how long an offline OTP search can run.

pub mod checksum;
pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod manager;
pub mod otp;

pub use checksum::{checksum, verify_checksum};
pub use cipher::{decrypt, encrypt, random_iv, random_salt};
pub use envelope::{is_valid_envelope, secure_filename, SecureEnvelope};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, ExportKey, KdfParams};
pub use manager::{now_ms, ExportPolicy, SecureDataManager};
pub use otp::{generate_otp, validate_otp};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes (96-bit)
pub const IV_SIZE: usize = 12;

/// KDF salt size in bytes
pub const SALT_SIZE: usize = 16;

/// GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Number of digits in an export OTP
pub const OTP_DIGITS: usize = 6;
