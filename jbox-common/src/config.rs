//! Configuration loading and config file resolution
//!
//! Resolution priority:
//! 1. Explicit path (command-line `--config`)
//! 2. `JBOX_CONFIG` environment variable
//! 3. User config file (`~/.config/jbox/config.toml` on Linux)
//! 4. System config file (`/etc/jbox/config.toml`, Unix only)
//! 5. Compiled defaults
//!
//! A missing or malformed file never aborts startup: the resolver logs a
//! warning and falls back to compiled defaults.

use crate::operation::{OperationKind, QuotaRule, MAX_WINDOW_SECS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "JBOX_CONFIG";

/// Values compiled into the binary, used when no config file provides them
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind_addr: String,
    pub port: u16,
    pub log_level: String,
    pub history_limit: usize,
    pub promote_history_limit: usize,
    pub quota_cleanup_interval_secs: u64,
    pub event_buffer: usize,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            history_limit: 500,
            promote_history_limit: 100,
            quota_cleanup_interval_secs: 300,
            event_buffer: 100,
        }
    }

    /// Candidate config file locations in priority order (excluding explicit overrides)
    pub fn config_file_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("jbox").join("config.toml"));
        }
        if cfg!(unix) {
            candidates.push(PathBuf::from("/etc/jbox/config.toml"));
        }
        candidates
    }
}

/// Parsed `config.toml`
///
/// Every field is optional in the file; missing keys take compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// HTTP port
    pub port: u16,
    /// LAN address of this machine; requests from it are privileged.
    /// Detected at startup when absent.
    pub host_ip: Option<String>,
    /// Trust `X-Forwarded-For` / `X-Real-IP` when resolving the caller
    pub trust_proxy_headers: bool,
    /// Default tracing level when `RUST_LOG` is unset
    pub log_level: String,
    /// Played songs kept for "previous"
    pub history_limit: usize,
    /// Promotion audit records kept
    pub promote_history_limit: usize,
    /// Seconds between quota cleanup sweeps
    pub quota_cleanup_interval_secs: u64,
    /// Capacity of the SSE broadcast channel
    pub event_buffer: usize,
    /// Per-kind overrides, e.g. `[quota.song]`
    pub quota: BTreeMap<OperationKind, QuotaRule>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            bind_addr: defaults.bind_addr,
            port: defaults.port,
            host_ip: None,
            trust_proxy_headers: false,
            log_level: defaults.log_level,
            history_limit: defaults.history_limit,
            promote_history_limit: defaults.promote_history_limit,
            quota_cleanup_interval_secs: defaults.quota_cleanup_interval_secs,
            event_buffer: defaults.event_buffer,
            quota: BTreeMap::new(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        for (kind, rule) in &self.quota {
            if !rule.is_valid() {
                return Err(Error::Config(format!(
                    "quota.{}: window_secs must be 1..={} and max_operations positive",
                    kind, MAX_WINDOW_SECS
                )));
            }
        }
        if self.quota_cleanup_interval_secs == 0 {
            return Err(Error::Config("quota_cleanup_interval_secs must be positive".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config("event_buffer must be positive".to_string()));
        }
        if self.promote_history_limit == 0 {
            return Err(Error::Config("promote_history_limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Full operation registry: compiled default rules overlaid with file overrides
    pub fn quota_rules(&self) -> BTreeMap<OperationKind, QuotaRule> {
        OperationKind::ALL
            .iter()
            .map(|kind| (*kind, self.quota.get(kind).copied().unwrap_or_else(|| kind.default_rule())))
            .collect()
    }

    /// `host:port` string for the listener
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Locates and loads the config file
pub struct ConfigResolver {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ConfigResolver {
    /// Resolver with the platform default candidate list
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            candidates: CompiledDefaults::config_file_candidates(),
        }
    }

    /// Resolver that searches only the given candidates (after explicit/env)
    pub fn with_candidates(explicit: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self { explicit, candidates }
    }

    /// First existing config file path, honouring priority order
    ///
    /// An explicit or environment path is returned even if it does not exist,
    /// so the caller can report it.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        self.candidates.iter().find(|p| p.exists()).cloned()
    }

    /// Load configuration, degrading to defaults on any problem
    ///
    /// Returns the config plus the file it came from (None when defaults were used).
    pub fn resolve(&self) -> (TomlConfig, Option<PathBuf>) {
        let Some(path) = self.locate() else {
            warn!("No config file found; using compiled defaults");
            return (TomlConfig::default(), None);
        };

        match TomlConfig::from_file(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                (config, Some(path))
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}; using compiled defaults", path.display(), e);
                (TomlConfig::default(), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert!(config.host_ip.is_none());
        assert!(!config.trust_proxy_headers);
        assert!(config.quota.is_empty());
    }

    #[test]
    fn test_quota_rules_overlay_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [quota.song]
            window_secs = 30
            max_operations = 5
            "#,
        )
        .unwrap();

        let rules = config.quota_rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[&OperationKind::Song], QuotaRule::new(30, 5));
        assert_eq!(rules[&OperationKind::Skip], OperationKind::Skip.default_rule());
    }

    #[test]
    fn test_unknown_quota_kind_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
            [quota.volume]
            window_secs = 30
            max_operations = 5
            "#,
        );
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_zero_rule_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
            [quota.skip]
            window_secs = 0
            max_operations = 2
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
            [quota.song]
            window_secs = 10000000000000
            max_operations = 3
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        assert!(TomlConfig::from_toml_str("prot = 80").is_err());
    }

    #[test]
    fn test_server_address() {
        let config = TomlConfig::from_toml_str("bind_addr = \"127.0.0.1\"\nport = 8080").unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:8080");
    }
}
