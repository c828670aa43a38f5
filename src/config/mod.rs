pub mod cli;
pub mod toml_config;

use crate::utils::error::{Result, RiskError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL_DIR: &str = "./model";

/// 預測服務設定，來源為環境變數 (HOST / PORT / MODEL_DIR / STATIC_DIR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: String,
    pub static_dir: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_dir: DEFAULT_MODEL_DIR.to_string(),
            static_dir: None,
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以任意來源查詢變數，空字串視為未設定
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| RiskError::InvalidConfigValueError {
                    field: "PORT".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => defaults.port,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            model_dir: get("MODEL_DIR").unwrap_or(defaults.model_dir),
            static_dir: get("STATIC_DIR"),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Validate for ServeConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("host", &self.host)?;
        validation::validate_positive_number("port", self.port as usize, 1)?;
        validation::validate_path("model_dir", &self.model_dir)?;
        if let Some(dir) = &self.static_dir {
            validation::validate_path("static_dir", dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ServeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServeConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_values_from_environment() {
        let config = ServeConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("MODEL_DIR", "/srv/model"),
            ("STATIC_DIR", "./client/dist"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.model_dir, "/srv/model");
        assert_eq!(config.static_dir.as_deref(), Some("./client/dist"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config =
            ServeConfig::from_lookup(lookup(&[("PORT", " "), ("STATIC_DIR", "")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = ServeConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, RiskError::InvalidConfigValueError { .. }));

        assert!(ServeConfig::from_lookup(lookup(&[("PORT", "70000")])).is_err());
    }

    #[test]
    fn test_port_zero_fails_validation() {
        let config = ServeConfig {
            port: 0,
            ..ServeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
