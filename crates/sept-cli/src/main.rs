//! sept: september secure export/import CLI
//!
//! Commands:
//!   otp                         - print a fresh 6-digit code
//!   export [--data] [--otp]     - encrypt the local data store into an envelope file
//!   import <file> [--otp]       - verify, decrypt, and merge an envelope into the store
//!   inspect <file>              - show envelope metadata without decrypting
//!   config show                 - display the effective configuration

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use sept_core::config::SeptConfig;
use sept_core::{apply_snapshot, AppSnapshot};
use sept_crypto::{
    generate_otp, now_ms, secure_filename, validate_otp, CryptoError, ExportPolicy,
    SecureDataManager, SecureEnvelope,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sept",
    version,
    about = "september secure data manager",
    long_about = "sept: export september data to an OTP-protected file and import it back"
)]
struct Cli {
    /// Path to september.toml configuration file
    #[arg(long, short = 'c', env = "SEPT_CONFIG", default_value = "~/.config/september/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "SEPT_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "SEPT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a freshly generated 6-digit code
    Otp,

    /// Encrypt the data store into a secure export file
    ///
    /// The file can only be imported with the same code, and only until it
    /// expires (5 minutes by default).
    Export {
        /// Snapshot JSON to export (default: store.data_file from config)
        #[arg(long, short = 'd')]
        data: Option<PathBuf>,
        /// 6-digit code to protect the export (default: generate one)
        #[arg(long)]
        otp: Option<String>,
        /// Output path (default: <app>-secure-<timestamp>.json)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Decrypt a secure export file and merge it into the data store
    Import {
        /// Secure export file
        file: PathBuf,
        /// 6-digit code (prompted for when omitted)
        #[arg(long)]
        otp: Option<String>,
        /// Data store to merge into (default: store.data_file from config)
        #[arg(long)]
        into: Option<PathBuf>,
        /// Verify and report, but leave the data store untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Show envelope metadata and remaining validity without decrypting
    Inspect {
        /// Secure export file
        file: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SeptConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    debug!(config = %config_path.display(), "sept starting");

    match cli.command {
        Commands::Otp => {
            println!("{}", generate_otp());
            Ok(())
        }
        Commands::Export { data, otp, out } => {
            cmd_export(&config, data.as_deref(), otp, out.as_deref()).await
        }
        Commands::Import { file, otp, into, dry_run } => {
            cmd_import(&config, &file, otp, into.as_deref(), dry_run).await
        }
        Commands::Inspect { file } => cmd_inspect(&file).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    expand_tilde_with(path, &std::env::var("HOME").unwrap_or_default())
}

fn expand_tilde_with(path: &Path, home: &str) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve the data store path: CLI flag > config
fn resolve_store_path(config: &SeptConfig, override_path: Option<&Path>) -> PathBuf {
    match override_path {
        Some(p) => p.to_path_buf(),
        None => expand_tilde(&config.store.data_file),
    }
}

async fn read_store(path: &Path) -> Result<AppSnapshot> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading data store: {}", path.display()))?;
    AppSnapshot::parse_json(&text).with_context(|| format!("parsing data store: {}", path.display()))
}

async fn write_store(path: &Path, snapshot: &AppSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let rendered = serde_json::to_string_pretty(snapshot).context("serializing data store")?;
    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("writing data store: {}", path.display()))
}

/// Log the precise failure, surface only the user-facing text.
fn user_facing(err: CryptoError) -> anyhow::Error {
    debug!(kind = err.kind(), error = %err, "secure data operation failed");
    anyhow::anyhow!(err.user_message())
}

fn make_spinner(prefix: &str, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn format_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{ms} ms"))
}

fn prompt_otp() -> Result<String> {
    let otp = rpassword::prompt_password("Enter the 6-digit code: ").context("reading code")?;
    Ok(otp.trim().to_string())
}

// ── `sept export` ─────────────────────────────────────────────────────────────

async fn cmd_export(
    config: &SeptConfig,
    data: Option<&Path>,
    otp: Option<String>,
    out: Option<&Path>,
) -> Result<()> {
    let store_path = resolve_store_path(config, data);
    let snapshot = read_store(&store_path).await?;

    let otp = otp.unwrap_or_else(generate_otp);
    if !validate_otp(&otp) {
        return Err(user_facing(CryptoError::Validation));
    }

    let manager = SecureDataManager::new(ExportPolicy::from(&config.export));
    let pb = make_spinner("export", "deriving key and encrypting...");
    let result = manager
        .export_async(snapshot, SecretString::from(otp.as_str()))
        .await;
    pb.finish_and_clear();
    let envelope = result.map_err(user_facing)?;

    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(secure_filename(&config.export.app_name, Utc::now())));
    let rendered = envelope.to_json_pretty().context("serializing envelope")?;
    tokio::fs::write(&out_path, rendered)
        .await
        .with_context(|| format!("writing export: {}", out_path.display()))?;

    info!(path = %out_path.display(), "secure export written");
    println!("Secure export created: {}", out_path.display());
    println!("  code:     {otp}");
    println!(
        "  valid:    {} minutes (until {})",
        envelope.remaining_minutes(envelope.timestamp()),
        format_ms(envelope.expires_at())
    );
    println!("Keep the code safe; it is required to import this file.");
    Ok(())
}

// ── `sept import` ─────────────────────────────────────────────────────────────

async fn cmd_import(
    config: &SeptConfig,
    file: &Path,
    otp: Option<String>,
    into: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| user_facing(CryptoError::Format(format!("not valid JSON: {e}"))))?;

    let otp = match otp {
        Some(otp) => otp,
        None => prompt_otp()?,
    };
    if !validate_otp(&otp) {
        return Err(user_facing(CryptoError::Validation));
    }

    let manager = SecureDataManager::new(ExportPolicy::from(&config.export));
    let pb = make_spinner("import", "verifying and decrypting...");
    let result = manager
        .import_async(value, SecretString::from(otp.as_str()))
        .await;
    pb.finish_and_clear();
    let imported = result.map_err(user_facing)?;

    let store_path = resolve_store_path(config, into);
    let mut store = if store_path.exists() {
        read_store(&store_path).await?
    } else {
        AppSnapshot::default()
    };

    let summary = apply_snapshot(&mut store, imported);
    if dry_run {
        println!("Dry run: {} (store not modified)", summary.describe());
        return Ok(());
    }

    write_store(&store_path, &store).await?;
    info!(path = %store_path.display(), ?summary, "import merged");
    println!("{}", summary.describe());
    Ok(())
}

// ── `sept inspect` ────────────────────────────────────────────────────────────

async fn cmd_inspect(file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let envelope = SecureEnvelope::from_json_str(&text).map_err(user_facing)?;
    let now = now_ms();

    println!("File: {}", file.display());
    println!("  version:   {}", envelope.version());
    println!("  created:   {}", format_ms(envelope.timestamp()));
    println!("  expires:   {}", format_ms(envelope.expires_at()));
    println!("  payload:   {} bytes", envelope.encrypted_data().len() / 2);
    if envelope.is_expired(now) {
        println!("  status:    expired");
    } else {
        println!(
            "  status:    valid ({} minutes left)",
            envelope.remaining_minutes(now)
        );
    }
    Ok(())
}

// ── `sept config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &SeptConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tilde_expansion() {
        assert_eq!(
            expand_tilde_with(Path::new("~/data.json"), "/home/sept"),
            PathBuf::from("/home/sept/data.json")
        );
        assert_eq!(
            expand_tilde_with(Path::new("/abs/x"), "/home/sept"),
            PathBuf::from("/abs/x")
        );
        assert_eq!(
            expand_tilde_with(Path::new("~user/x"), "/home/sept"),
            PathBuf::from("~user/x")
        );
    }

    #[test]
    fn cli_parses_import() {
        let cli = Cli::try_parse_from(["sept", "import", "backup.json", "--otp", "482913", "--dry-run"])
            .unwrap();
        match cli.command {
            Commands::Import { file, otp, dry_run, .. } => {
                assert_eq!(file, PathBuf::from("backup.json"));
                assert_eq!(otp.as_deref(), Some("482913"));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data.json");
        let snap = AppSnapshot::with_todos(vec![json!({"id": 1, "text": "a", "completed": false})]);

        write_store(&path, &snap).await.unwrap();
        assert_eq!(read_store(&path).await.unwrap(), snap);
    }

    fn fast_config() -> SeptConfig {
        let mut config = SeptConfig::default();
        config.export.kdf_iterations = 1_000;
        config
    }

    #[tokio::test]
    async fn export_then_import_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let export = dir.path().join("export.json");
        let target = dir.path().join("target.json");
        let config = fast_config();

        let source = AppSnapshot::from_value(json!({
            "todos": [
                {"id": 1, "text": "buy milk", "completed": false},
                {"id": 2, "text": "call mom", "completed": true}
            ],
            "notes": [{"id": "n1", "title": "ideas"}],
            "settings": {"selectedTheme": "amber", "isBgmMuted": null}
        }))
        .unwrap();
        write_store(&data, &source).await.unwrap();
        write_store(
            &target,
            &AppSnapshot::with_todos(vec![json!({"id": 3, "text": "existing", "completed": false})]),
        )
        .await
        .unwrap();

        cmd_export(&config, Some(&data), Some("482913".into()), Some(&export))
            .await
            .unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
        assert_eq!(written.as_object().unwrap().len(), 7);

        cmd_import(&config, &export, Some("482913".into()), Some(&target), false)
            .await
            .unwrap();

        let merged = read_store(&target).await.unwrap();
        let ids: Vec<i64> = merged.todos.iter().map(|t| t["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(merged.todos[1]["text"], "buy milk");
        assert_eq!(merged.collection("notes").map(Vec::len), Some(1));
        assert_eq!(merged.get("settings").unwrap()["selectedTheme"], "amber");
    }

    #[tokio::test]
    async fn wrong_code_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let export = dir.path().join("export.json");
        let target = dir.path().join("target.json");
        let config = fast_config();

        write_store(
            &data,
            &AppSnapshot::with_todos(vec![json!({"id": 1, "text": "a", "completed": false})]),
        )
        .await
        .unwrap();
        cmd_export(&config, Some(&data), Some("482913".into()), Some(&export))
            .await
            .unwrap();

        let err = cmd_import(&config, &export, Some("000000".into()), Some(&target), false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), CryptoError::Decryption.user_message());
        assert!(!target.exists());

        let err = cmd_import(&config, &export, Some("48291".into()), Some(&target), false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), CryptoError::Validation.user_message());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let export = dir.path().join("export.json");
        let target = dir.path().join("target.json");
        let config = fast_config();

        write_store(
            &data,
            &AppSnapshot::with_todos(vec![json!({"id": 1, "text": "a", "completed": false})]),
        )
        .await
        .unwrap();
        cmd_export(&config, Some(&data), Some("111111".into()), Some(&export))
            .await
            .unwrap();
        cmd_import(&config, &export, Some("111111".into()), Some(&target), true)
            .await
            .unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn user_facing_hides_cause() {
        let err = user_facing(CryptoError::Integrity);
        assert_eq!(err.to_string(), CryptoError::Decryption.user_message());
    }
}
