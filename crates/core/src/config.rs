use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::delivery::chunker::{ChannelKind, ChunkPolicy, ChunkRule};
use crate::delivery::timing::TimingConfig;
use crate::goals::CompanyInfo;
use crate::scheduling::{BusinessHours, HourRange, Weekday};

const DEFAULT_CONFIG_FILE: &str = "parley.toml";
const ENV_CONFIG_PATH: &str = "PARLEY_CONFIG";

/// Per-tenant configuration, read fresh on every invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TenantConfig {
    pub company_name: Option<String>,
    pub timing: TimingConfig,
    pub chunking: ChunkPolicy,
    pub business_hours: BusinessHours,
}

impl TenantConfig {
    pub fn company_info(&self) -> CompanyInfo {
        CompanyInfo {
            company_name: self.company_name.clone(),
            business_hours: self.business_hours.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub company_name: Option<String>,
    pub timing: Option<TimingConfig>,
    pub chunking_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigPatch {
    company_name: Option<String>,
    timing: Option<TimingPatch>,
    chunking: Option<ChunkingPatch>,
    business_hours: Option<BTreeMap<Weekday, Vec<HourRange>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TimingPatch {
    reading_speed: Option<f64>,
    typing_speed: Option<f64>,
    min_busy_time: Option<f64>,
    max_busy_time: Option<f64>,
    min_thinking_time: Option<f64>,
    max_thinking_time: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChunkingPatch {
    enabled: Option<bool>,
    rules: Option<BTreeMap<ChannelKind, ChunkRule>>,
}

impl TenantConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(company_name) = patch.company_name {
            self.company_name = Some(company_name);
        }

        if let Some(timing) = patch.timing {
            if let Some(reading_speed) = timing.reading_speed {
                self.timing.reading_speed = reading_speed;
            }
            if let Some(typing_speed) = timing.typing_speed {
                self.timing.typing_speed = typing_speed;
            }
            if let Some(min_busy_time) = timing.min_busy_time {
                self.timing.min_busy_time = min_busy_time;
            }
            if let Some(max_busy_time) = timing.max_busy_time {
                self.timing.max_busy_time = max_busy_time;
            }
            if let Some(min_thinking_time) = timing.min_thinking_time {
                self.timing.min_thinking_time = min_thinking_time;
            }
            if let Some(max_thinking_time) = timing.max_thinking_time {
                self.timing.max_thinking_time = max_thinking_time;
            }
        }

        if let Some(chunking) = patch.chunking {
            if let Some(enabled) = chunking.enabled {
                self.chunking.enabled = enabled;
            }
            if let Some(rules) = chunking.rules {
                self.chunking.rules = rules;
            }
        }

        if let Some(business_hours) = patch.business_hours {
            self.business_hours = BusinessHours::new(business_hours);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_COMPANY_NAME") {
            self.company_name = Some(value);
        }
        if let Some(value) = read_env("PARLEY_READING_SPEED") {
            self.timing.reading_speed = parse_f64("PARLEY_READING_SPEED", &value)?;
        }
        if let Some(value) = read_env("PARLEY_TYPING_SPEED") {
            self.timing.typing_speed = parse_f64("PARLEY_TYPING_SPEED", &value)?;
        }
        if let Some(value) = read_env("PARLEY_CHUNKING_ENABLED") {
            self.chunking.enabled = parse_bool("PARLEY_CHUNKING_ENABLED", &value)?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(company_name) = overrides.company_name {
            self.company_name = Some(company_name);
        }
        if let Some(timing) = overrides.timing {
            self.timing = timing;
        }
        if let Some(enabled) = overrides.chunking_enabled {
            self.chunking.enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.business_hours
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        for (channel, rule) in &self.chunking.rules {
            if rule.max_length == 0 {
                return Err(ConfigError::Validation(format!(
                    "chunk rule for {channel:?} has max_length 0"
                )));
            }
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(value) = read_env(ENV_CONFIG_PATH) {
        let path = PathBuf::from(value);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}
