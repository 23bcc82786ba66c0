use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failure of a single export or import. Every variant is terminal; nothing
/// is retried and no partial snapshot is ever returned.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid OTP: expected exactly 6 ASCII digits")]
    Validation,

    #[error("not a secure export envelope: {0}")]
    Format(String),

    #[error("envelope expired at {expires_at} (ms since epoch)")]
    Expired { expires_at: i64 },

    #[error("AES-256-GCM authentication failed")]
    Decryption,

    #[error("checksum mismatch after decryption")]
    Integrity,

    #[error("decrypted content is not a valid snapshot: {0}")]
    Schema(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl CryptoError {
    /// Stable short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Format(_) => "format",
            Self::Expired { .. } => "expired",
            Self::Decryption => "decryption",
            Self::Integrity => "integrity",
            Self::Schema(_) => "schema",
            Self::Encryption(_) => "encryption",
            Self::Serialization(_) => "serialization",
            Self::Kdf(_) => "kdf",
            Self::Task(_) => "task",
        }
    }

    /// Text safe to show the user.
    ///
    /// A bad OTP and a corrupted file are reported identically so the message
    /// gives no hint about which one happened.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation => "Please enter a valid 6-digit code.",
            Self::Format(_) => "This is not a recognized secure export file.",
            Self::Expired { .. } => "This export has expired. Please create a new one.",
            Self::Decryption | Self::Integrity => {
                "Failed to decrypt data. Please check your code and try again."
            }
            Self::Schema(_) => "The file content is invalid.",
            Self::Encryption(_) | Self::Serialization(_) | Self::Kdf(_) | Self::Task(_) => {
                "Failed to encrypt data. Please try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_and_integrity_share_user_message() {
        assert_eq!(
            CryptoError::Decryption.user_message(),
            CryptoError::Integrity.user_message()
        );
        assert_ne!(CryptoError::Decryption.kind(), CryptoError::Integrity.kind());
    }

    #[test]
    fn user_message_hides_detail() {
        let err = CryptoError::Format("missing field `iv`".into());
        assert!(!err.user_message().contains("iv"));
        assert!(err.to_string().contains("iv"));
    }
}
