use crate::engine::EngineSettings;
use crate::errors::ConfigError;
use crate::matcher::PatternErrorPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "ddx.yaml";
pub const DEFAULT_DB_PATH: &str = ".ddx/ddx.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DdxConfig {
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for DdxConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            settings: Settings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_errors: Option<PatternErrorPolicy>,
}

impl Settings {
    /// Values set in `overrides` win.
    pub fn merge(mut self, overrides: Settings) -> Self {
        if overrides.db.is_some() {
            self.db = overrides.db;
        }
        if overrides.timeout_seconds.is_some() {
            self.timeout_seconds = overrides.timeout_seconds;
        }
        if overrides.parallel.is_some() {
            self.parallel = overrides.parallel;
        }
        if overrides.pattern_errors.is_some() {
            self.pattern_errors = overrides.pattern_errors;
        }
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let defaults = EngineSettings::default();
        let timeout = match self.timeout_seconds {
            Some(0) => return Err(ConfigError("timeout_seconds must be at least 1".into())),
            Some(t) => Duration::from_secs(t),
            None => defaults.timeout,
        };
        let parallel = match self.parallel {
            Some(0) => return Err(ConfigError("parallel must be at least 1".into())),
            Some(p) => p,
            None => defaults.parallel,
        };
        Ok(EngineSettings {
            timeout,
            parallel,
            pattern_errors: self.pattern_errors.unwrap_or(defaults.pattern_errors),
        })
    }
}

pub fn load_config(path: &Path) -> Result<DdxConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<DdxConfig, ConfigError> {
    let cfg: DdxConfig = serde_yaml::from_str(raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    Ok(cfg)
}

/// Explicit path must exist; otherwise `ddx.yaml` is used when present.
pub fn load_or_default(path: Option<&Path>) -> Result<DdxConfig, ConfigError> {
    match path {
        Some(p) => load_config(p),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() {
                load_config(p)
            } else {
                Ok(DdxConfig::default())
            }
        }
    }
}
