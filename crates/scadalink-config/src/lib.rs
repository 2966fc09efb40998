//! Shared configuration for scadalink tools.
//!
//! TOML profiles, durable token storage (keyring, file, memory), and
//! translation to `scadalink_core::ClientConfig`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

mod token_store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scadalink_core::{
    ClassifierTables, ClientConfig, MemoryTokenStore, NodeClassifier, Session, TlsVerification,
};

pub use token_store::{FileTokenStore, KeyringTokenStore};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("token storage failed: {0}")]
    TokenStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the active profile: `explicit`, else `default_profile`,
    /// else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// Where a profile's session token survives restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    /// System keyring (Secret Service, macOS Keychain, Windows Credential Manager).
    #[default]
    Keyring,
    /// A file under the platform data directory.
    File,
    /// Process memory only.
    Memory,
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "https://scada.example.com").
    pub server: String,

    /// Default username for `login`.
    pub username: Option<String>,

    #[serde(default)]
    pub token_store: TokenStoreKind,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Live stream endpoint path.
    pub stream_path: Option<String>,

    pub reconnect_delay_ms: Option<u64>,

    /// Close code signalling an auth rejection on the live stream.
    pub auth_close_code: Option<u16>,

    pub toggle_grace_ms: Option<u64>,

    pub setpoint_grace_ms: Option<u64>,

    /// Fetch `GET /data` when the live channel starts.
    pub seed_snapshot: Option<bool>,

    /// Replacement node classification tables.
    pub classifier: Option<ClassifierTables>,
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "scadalink", "scadalink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding file-backed session tokens.
pub fn token_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("tokens"),
        |dirs| dirs.data_dir().join("tokens"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("scadalink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) with `SCADALINK_` env overrides.
///
/// Nested keys use a double underscore:
/// `SCADALINK_PROFILES__PLANT__SERVER=https://...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SCADALINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_server(server: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected http or https, got '{other}'"),
        }),
    }
}

/// Build a `ClientConfig` from a profile, no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::new(parse_server(&profile.server)?);

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    if let Some(ref path) = profile.stream_path {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation {
                field: "stream_path".into(),
                reason: format!("must start with '/', got '{path}'"),
            });
        }
        config.stream_path.clone_from(path);
    }
    if let Some(ms) = profile.reconnect_delay_ms {
        config.reconnect_delay = Duration::from_millis(ms);
    }
    if let Some(code) = profile.auth_close_code {
        config.auth_close_code = code;
    }
    if let Some(ms) = profile.toggle_grace_ms {
        config.toggle_grace = Duration::from_millis(ms);
    }
    if let Some(ms) = profile.setpoint_grace_ms {
        config.setpoint_grace = Duration::from_millis(ms);
    }
    if let Some(seed) = profile.seed_snapshot {
        config.seed_snapshot = seed;
    }
    if let Some(ref tables) = profile.classifier {
        config.classifier =
            NodeClassifier::from_tables(tables.clone()).map_err(|e| ConfigError::Validation {
                field: "classifier".into(),
                reason: e.to_string(),
            })?;
    }

    Ok(config)
}

/// Open the session for `profile_name`, restoring any persisted token.
pub fn open_session(profile: &Profile, profile_name: &str) -> Result<Session, ConfigError> {
    let session = match profile.token_store {
        TokenStoreKind::Keyring => Session::restore(KeyringTokenStore::new(profile_name)?),
        TokenStoreKind::File => Session::restore(FileTokenStore::for_profile(profile_name)),
        TokenStoreKind::Memory => Session::restore(MemoryTokenStore::new()),
    };
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(server: &str) -> Profile {
        Profile {
            server: server.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn test_profile_defaults_match_client_defaults() {
        let config = profile_to_client_config(
            &profile("https://scada.example.com"),
            &Defaults::default(),
        )
        .unwrap();
        assert_eq!(config.stream_path, "/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.auth_close_code, 4001);
        assert_eq!(config.toggle_grace, Duration::from_millis(1500));
        assert_eq!(config.setpoint_grace, Duration::from_millis(2000));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
        assert!(config.seed_snapshot);
    }

    #[test]
    fn test_profile_overrides_apply() {
        let mut p = profile("http://10.0.0.5:8000");
        p.insecure = Some(true);
        p.reconnect_delay_ms = Some(500);
        p.auth_close_code = Some(4401);
        p.stream_path = Some("/live".into());
        p.seed_snapshot = Some(false);

        let config = profile_to_client_config(&p, &Defaults::default()).unwrap();
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.auth_close_code, 4401);
        assert_eq!(config.stream_path, "/live");
        assert!(!config.seed_snapshot);
    }

    #[test]
    fn test_rejects_bad_server() {
        let err = profile_to_client_config(&profile("not a url"), &Defaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));

        let err = profile_to_client_config(&profile("ws://host/ws"), &Defaults::default())
            .unwrap_err();
        assert!(err.to_string().contains("expected http or https"));
    }

    #[test]
    fn test_rejects_relative_stream_path() {
        let mut p = profile("https://scada.example.com");
        p.stream_path = Some("ws".into());
        assert!(profile_to_client_config(&p, &Defaults::default()).is_err());
    }

    #[test]
    fn test_overlapping_classifier_tables_rejected() {
        let mut p = profile("https://scada.example.com");
        p.classifier = Some(ClassifierTables {
            measurements: vec!["Voltage".into()],
            digital_signals: vec!["Voltage".into()],
            ..ClassifierTables::default()
        });
        let err = profile_to_client_config(&p, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "classifier"));
    }

    #[test]
    fn test_active_profile_resolution() {
        let mut cfg = Config::default();
        assert_eq!(cfg.active_profile_name(None), "default");
        assert_eq!(cfg.active_profile_name(Some("plant")), "plant");
        cfg.default_profile = Some("north".into());
        assert_eq!(cfg.active_profile_name(None), "north");
        assert!(matches!(
            cfg.profile("north"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }
}
