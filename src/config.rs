use crate::aggregation::AggregateLimits;
use crate::error::{AssistantError, Result};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EXCERPT_BUDGET: usize = 6000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_DATA_DIR: &str = "output";

/// Engine settings, read from the environment (and `.env` via the CLI).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub backend_timeout: Duration,
    pub excerpt_budget: usize,
    pub limits: AggregateLimits,
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            backend_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            excerpt_budget: DEFAULT_EXCERPT_BUDGET,
            limits: AggregateLimits::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys keep their defaults;
    /// malformed numbers are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let temperature: f32 = parse_or(&get, "EINVOICE_TEMPERATURE", defaults.temperature)?;
        let timeout_secs: u64 = parse_or(&get, "EINVOICE_BACKEND_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: get("EINVOICE_MODEL").unwrap_or(defaults.model),
            temperature: temperature.clamp(0.0, 1.0),
            backend_timeout: Duration::from_secs(timeout_secs),
            excerpt_budget: parse_or(&get, "EINVOICE_EXCERPT_BUDGET", defaults.excerpt_budget)?,
            limits: AggregateLimits {
                max_groups: parse_or(&get, "EINVOICE_MAX_GROUPS", defaults.limits.max_groups)?,
                max_sample_rows: parse_or(
                    &get,
                    "EINVOICE_MAX_SAMPLE_ROWS",
                    defaults.limits.max_sample_rows,
                )?,
            },
            data_dir: get("EINVOICE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AssistantError::Config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<EngineConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!(!cfg.has_api_key());
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert_eq!(cfg.excerpt_budget, 6000);
    }

    #[test]
    fn test_overrides_and_clamping() {
        let cfg = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("EINVOICE_MODEL", "gpt-4"),
            ("EINVOICE_TEMPERATURE", "1.5"),
            ("EINVOICE_MAX_GROUPS", "5"),
            ("EINVOICE_DATA_DIR", "/tmp/einvoice"),
        ])
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.model, "gpt-4");
        assert_eq!(cfg.temperature, 1.0);
        assert_eq!(cfg.limits.max_groups, 5);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/einvoice"));
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let cfg = config(&[("OPENAI_API_KEY", "   ")]).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let err = config(&[("EINVOICE_EXCERPT_BUDGET", "lots")]).unwrap_err();
        assert!(matches!(err, AssistantError::Config(_)));
        assert!(err.to_string().contains("EINVOICE_EXCERPT_BUDGET"));
    }
}
