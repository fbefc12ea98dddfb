//! Configuration loading and encryption key resolution
//!
//! Resolution priority for every setting: environment variable, then TOML
//! config file, then compiled default. The config file location itself is
//! `PODPIPE_CONFIG` or `~/.config/podpipe/config.toml`.

use crate::{Error, Result};
use rand::RngCore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listen address for the HTTP server
    pub bind_address: String,
    /// Directory holding the encrypted credentials file
    pub data_dir: PathBuf,
    /// Work directory for uploaded source files
    pub uploads_dir: PathBuf,
    /// Work directory for normalized output files
    pub output_dir: PathBuf,
    /// Path or name of the external audio transform binary
    pub ffmpeg_path: String,
    /// Total request timeout for outbound HTTP calls, in seconds.
    /// Applies to login, upload and publish calls alike; raise it when
    /// uploads routinely exceed five minutes.
    pub http_timeout_secs: u64,
    /// 64 hex characters (32 bytes) keying credentials encryption at rest.
    /// When absent a random key is generated at startup, which makes
    /// previously saved credentials unreadable after a restart.
    pub encryption_key: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            data_dir: PathBuf::from("data"),
            uploads_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("downloads"),
            ffmpeg_path: "ffmpeg".to_string(),
            http_timeout_secs: 300,
            encryption_key: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration: TOML file (if present) with env overrides on top
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PODPIPE_BIND") {
            self.bind_address = v;
        }
        if let Ok(v) = std::env::var("PODPIPE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PODPIPE_UPLOADS_DIR") {
            self.uploads_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PODPIPE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PODPIPE_FFMPEG") {
            self.ffmpeg_path = v;
        }
        if let Ok(v) = std::env::var("PODPIPE_HTTP_TIMEOUT_SECS") {
            match v.parse() {
                Ok(secs) => self.http_timeout_secs = secs,
                Err(_) => warn!("Ignoring non-numeric PODPIPE_HTTP_TIMEOUT_SECS: {}", v),
            }
        }
        if let Ok(v) = std::env::var("PODPIPE_ENCRYPTION_KEY") {
            if self.encryption_key.is_some() {
                warn!("Encryption key found in both environment and config file. Using environment.");
            }
            self.encryption_key = Some(v);
        }
    }

    /// Create the work directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.uploads_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Location of the encrypted credentials file
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }
}

/// Where the encryption key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Explicitly supplied via env var or config file
    Configured,
    /// Randomly generated at startup
    Generated,
}

/// Resolve the 32-byte credentials encryption key.
///
/// A configured key must be exactly 64 hex characters. When no key is
/// configured a random one is generated; the caller is expected to surface
/// the accompanying warning at startup since a generated key invalidates
/// previously saved credentials.
pub fn resolve_encryption_key(config: &ServiceConfig) -> Result<([u8; 32], KeySource)> {
    match &config.encryption_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim())
                .map_err(|e| Error::Config(format!("Encryption key is not valid hex: {}", e)))?;
            let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
                Error::Config(format!(
                    "Encryption key must be 32 bytes (64 hex chars), got {} bytes",
                    b.len()
                ))
            })?;
            Ok((key, KeySource::Configured))
        }
        None => {
            let mut key = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut key);
            warn!(
                "No encryption key configured; generated a one-off key. \
                 Credentials saved now will be unreadable after a restart. \
                 Set PODPIPE_ENCRYPTION_KEY (64 hex chars) to persist across restarts."
            );
            Ok((key, KeySource::Generated))
        }
    }
}

/// Config file path: `PODPIPE_CONFIG` env var, else the platform config dir
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PODPIPE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("podpipe").join("config.toml"))
}
