use crate::core::network::{FitOptions, HiddenLayer};
use crate::core::preprocess::DEFAULT_ZERO_AS_MISSING;
use crate::core::predictor::DEFAULT_THRESHOLD;
use crate::domain::features::Feature;
use crate::utils::error::{Result, RiskError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/jbrownlee/Datasets/master/pima-indians-diabetes.data.csv";

/// 訓練設定，每個區段都可省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub dataset: DatasetConfig,
    pub preprocess: PreprocessConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub url: String,
    /// Local CSV; takes precedence over `url` when set.
    pub path: Option<String>,
    pub has_headers: bool,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATASET_URL.to_string(),
            path: None,
            has_headers: false,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub zero_as_missing: Vec<String>,
    pub test_size: f64,
    pub seed: u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            zero_as_missing: DEFAULT_ZERO_AS_MISSING
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            test_size: 0.2,
            seed: 42,
        }
    }
}

impl PreprocessConfig {
    pub fn zero_as_missing_features(&self) -> Result<Vec<Feature>> {
        self.zero_as_missing
            .iter()
            .map(|name| {
                Feature::from_name(name).ok_or_else(|| RiskError::InvalidConfigValueError {
                    field: "preprocess.zero_as_missing".to_string(),
                    value: name.clone(),
                    reason: "Unknown feature name".to_string(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_layers: Vec<HiddenLayer>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub threshold: f64,
    pub log_every: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            hidden_layers: vec![
                HiddenLayer {
                    units: 64,
                    dropout: 0.3,
                },
                HiddenLayer {
                    units: 32,
                    dropout: 0.3,
                },
                HiddenLayer {
                    units: 16,
                    dropout: 0.0,
                },
            ],
            learning_rate: fit.learning_rate,
            epochs: fit.epochs,
            batch_size: fit.batch_size,
            validation_split: fit.validation_split,
            threshold: DEFAULT_THRESHOLD,
            log_every: fit.log_every,
        }
    }
}

impl ModelConfig {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            validation_split: self.validation_split,
            learning_rate: self.learning_rate,
            log_every: self.log_every,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_dir: "./model".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TrainingConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RiskError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RiskError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATASET_URL})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RiskError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        match &self.dataset.path {
            Some(path) => validation::validate_path("dataset.path", path)?,
            None => validation::validate_url("dataset.url", &self.dataset.url)?,
        }
        validation::validate_range("dataset.timeout_seconds", self.dataset.timeout_seconds, 1, 600)?;
        validation::validate_range("dataset.retry_attempts", self.dataset.retry_attempts, 0, 10)?;

        self.preprocess.zero_as_missing_features()?;
        validation::validate_fraction("preprocess.test_size", self.preprocess.test_size, false)?;

        for (i, layer) in self.model.hidden_layers.iter().enumerate() {
            let field = format!("model.hidden_layers[{}]", i);
            validation::validate_positive_number(&format!("{}.units", field), layer.units, 1)?;
            validation::validate_fraction(&format!("{}.dropout", field), layer.dropout, true)?;
        }
        if !(self.model.learning_rate.is_finite() && self.model.learning_rate > 0.0) {
            return Err(RiskError::InvalidConfigValueError {
                field: "model.learning_rate".to_string(),
                value: self.model.learning_rate.to_string(),
                reason: "Value must be a positive number".to_string(),
            });
        }
        validation::validate_positive_number("model.epochs", self.model.epochs, 1)?;
        validation::validate_positive_number("model.batch_size", self.model.batch_size, 1)?;
        validation::validate_fraction(
            "model.validation_split",
            self.model.validation_split,
            true,
        )?;
        validation::validate_fraction("model.threshold", self.model.threshold, false)?;

        validation::validate_path("output.model_dir", &self.output.model_dir)?;

        Ok(())
    }
}

impl Validate for TrainingConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
