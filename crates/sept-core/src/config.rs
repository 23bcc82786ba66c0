use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SeptError, SeptResult};

/// Default PBKDF2-HMAC-SHA256 iteration count for export keys
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Default envelope validity window in minutes
pub const DEFAULT_EXPIRY_MINUTES: u64 = 5;

/// Default envelope format version
pub const DEFAULT_FORMAT_VERSION: &str = "1.0.0";

/// Top-level configuration (loaded from september.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeptConfig {
    pub export: ExportConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Secure export policy
///
/// The iteration count and the validity window are tuned together: the OTP
/// space is only 10^6 codes, so lowering the KDF cost must be matched by a
/// shorter window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// PBKDF2 iterations (default: 100000)
    pub kdf_iterations: u32,
    /// Minutes an envelope stays importable (default: 5)
    pub expiry_minutes: u64,
    /// Envelope format version written on export (default: "1.0.0")
    pub format_version: String,
    /// Prefix for generated export filenames
    pub app_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            app_name: "september-todos".to_string(),
        }
    }
}

/// Local application data store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the application snapshot
    pub data_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("~/.local/share/september/data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

impl SeptConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> SeptResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SeptResult<()> {
        if self.export.kdf_iterations == 0 {
            return Err(SeptError::Config(
                "export.kdf_iterations must be greater than zero".into(),
            ));
        }
        if self.export.expiry_minutes == 0 {
            return Err(SeptError::Config(
                "export.expiry_minutes must be greater than zero".into(),
            ));
        }
        if self.export.format_version.trim().is_empty() {
            return Err(SeptError::Config("export.format_version must not be empty".into()));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(SeptError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_export_policy() {
        let config = SeptConfig::default();
        assert_eq!(config.export.kdf_iterations, 100_000);
        assert_eq!(config.export.expiry_minutes, 5);
        assert_eq!(config.export.format_version, "1.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[export]\nexpiry_minutes = 2\n").unwrap();

        let config = SeptConfig::load(file.path()).unwrap();
        assert_eq!(config.export.expiry_minutes, 2);
        assert_eq!(config.export.kdf_iterations, DEFAULT_KDF_ITERATIONS);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = SeptConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.export.app_name, "september-todos");
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[export]\nkdf_iterations = 0\n").unwrap();

        let err = SeptConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SeptError::Config(_)));
    }

    #[test]
    fn bad_log_format_rejected() {
        let mut config = SeptConfig::default();
        config.log.format = "yaml".into();
        assert!(config.validate().is_err());
    }
}
