//! TOML-based application configuration.
//!
//! Stores tunables for:
//! - Gating thresholds and re-evaluation interval
//! - Session reset policy (the two open policy questions live here)
//! - Bet accrual speed curve
//! - Media prefetch cache sizing
//! - Remote API and IPFS gateway locations
//!
//! Configuration is stored at `~/.config/haven/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Wallet prompt / block thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingConfig {
    #[serde(default = "default_soft_prompt_threshold")]
    pub soft_prompt_threshold: u32,
    #[serde(default = "default_hard_prompt_threshold")]
    pub hard_prompt_threshold: u32,
    #[serde(default = "default_betting_unlock_threshold")]
    pub betting_unlock_threshold: u32,
    /// Minimum spacing between periodic re-evaluations.
    #[serde(default = "default_reevaluate_interval_ms")]
    pub reevaluate_interval_ms: u64,
}

/// Session lifecycle policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Start every launch with fresh counters and a new session id.
    /// Pending classifications survive either way.
    #[serde(default = "default_true")]
    pub reset_on_load: bool,
    /// Whether a successful submission also unlatches `wallet_required`.
    #[serde(default)]
    pub clear_wallet_required_on_submit: bool,
    #[serde(default = "default_true")]
    pub require_wallet_for_submit: bool,
    /// Pending records needed before the host offers submission.
    #[serde(default = "default_submit_min_batch")]
    pub submit_min_batch: u32,
}

/// Bet accrual speed curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingConfig {
    /// Points per second at the start of a hold.
    #[serde(default = "default_base_speed")]
    pub base_speed: f64,
    /// Points per second gained per second held.
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
    /// Speed ceiling in points per second.
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

/// Media prefetch cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_preload_count")]
    pub preload_count: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Bytes per second below which the link counts as slow.
    #[serde(default = "default_low_bandwidth_threshold")]
    pub low_bandwidth_threshold: u64,
}

/// Remote collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
    #[serde(default = "default_video_list_cid")]
    pub video_list_cid: String,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/haven/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gating: GatingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

// Default functions
fn default_soft_prompt_threshold() -> u32 {
    25
}
fn default_hard_prompt_threshold() -> u32 {
    50
}
fn default_betting_unlock_threshold() -> u32 {
    50
}
fn default_reevaluate_interval_ms() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}
fn default_submit_min_batch() -> u32 {
    5
}
fn default_base_speed() -> f64 {
    1.0
}
fn default_acceleration() -> f64 {
    0.5
}
fn default_max_speed() -> f64 {
    30.0
}
fn default_max_cache_size() -> usize {
    5
}
fn default_preload_count() -> usize {
    2
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_low_bandwidth_threshold() -> u64 {
    1_000_000
}
fn default_base_url() -> String {
    "https://kong-42d942b313uskmmab.kongcloud.dev/api".into()
}
fn default_ipfs_gateway() -> String {
    "https://premium.w3ipfs.storage/ipfs".into()
}
fn default_video_list_cid() -> String {
    "bafkreickynka3fs6hrffvsjx67gw377273cv72rxxwh6xe4yi57kmrymgq".into()
}
fn default_submit_timeout_secs() -> u64 {
    20
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            soft_prompt_threshold: default_soft_prompt_threshold(),
            hard_prompt_threshold: default_hard_prompt_threshold(),
            betting_unlock_threshold: default_betting_unlock_threshold(),
            reevaluate_interval_ms: default_reevaluate_interval_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_on_load: true,
            clear_wallet_required_on_submit: false,
            require_wallet_for_submit: true,
            submit_min_batch: default_submit_min_batch(),
        }
    }
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            base_speed: default_base_speed(),
            acceleration: default_acceleration(),
            max_speed: default_max_speed(),
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_cache_size: default_max_cache_size(),
            preload_count: default_preload_count(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            low_bandwidth_threshold: default_low_bandwidth_threshold(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ipfs_gateway: default_ipfs_gateway(),
            video_list_cid: default_video_list_cid(),
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory by dot-separated key. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// as the existing field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[gating]\nsoft_prompt_threshold = 10\n").unwrap();
        assert_eq!(parsed.gating.soft_prompt_threshold, 10);
        assert_eq!(parsed.gating.hard_prompt_threshold, 50);
        assert_eq!(parsed.prefetch.max_cache_size, 5);
        assert!(parsed.session.reset_on_load);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("gating.soft_prompt_threshold").as_deref(), Some("25"));
        assert_eq!(cfg.get("session.reset_on_load").as_deref(), Some("true"));
        assert_eq!(cfg.get("betting.acceleration").as_deref(), Some("0.5"));
        assert!(cfg.get("gating.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("prefetch.max_cache_size", "8").unwrap();
        cfg.set("session.clear_wallet_required_on_submit", "true").unwrap();
        cfg.set("betting.base_speed", "2.5").unwrap();
        cfg.set("api.base_url", "http://localhost:3000/api").unwrap();
        assert_eq!(cfg.prefetch.max_cache_size, 8);
        assert!(cfg.session.clear_wallet_required_on_submit);
        assert_eq!(cfg.betting.base_speed, 2.5);
        assert_eq!(cfg.api.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("gating.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("gating", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        let result = cfg.set("session.reset_on_load", "not_a_bool");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert!(cfg.session.reset_on_load);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("gating.hard_prompt_threshold", "40").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().gating.hard_prompt_threshold, 40);
    }
}
