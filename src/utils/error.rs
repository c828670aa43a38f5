use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Dataset error: {message}")]
    DatasetError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Training error: {message}")]
    TrainingError { message: String },

    #[error("Model artifact '{artifact}' not found")]
    ModelMissing { artifact: String },

    #[error("Model artifact is incompatible: {message}")]
    ModelIncompatible { message: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Model,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RiskError::HttpError(_) => ErrorCategory::Network,
            RiskError::CsvError(_)
            | RiskError::DatasetError { .. }
            | RiskError::ProcessingError { .. } => ErrorCategory::Data,
            RiskError::ConfigError { .. }
            | RiskError::ConfigValidationError { .. }
            | RiskError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            RiskError::TrainingError { .. }
            | RiskError::ModelMissing { .. }
            | RiskError::ModelIncompatible { .. }
            | RiskError::InferenceError { .. } => ErrorCategory::Model,
            RiskError::IoError(_) | RiskError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路錯誤通常重試即可
            RiskError::HttpError(_) => ErrorSeverity::Medium,
            RiskError::CsvError(_)
            | RiskError::DatasetError { .. }
            | RiskError::ProcessingError { .. }
            | RiskError::TrainingError { .. }
            | RiskError::InferenceError { .. } => ErrorSeverity::High,
            RiskError::ConfigError { .. }
            | RiskError::ConfigValidationError { .. }
            | RiskError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            RiskError::ModelMissing { .. } | RiskError::ModelIncompatible { .. } => {
                ErrorSeverity::Critical
            }
            RiskError::IoError(_) | RiskError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RiskError::HttpError(_) => {
                "Check your internet connection or download the dataset and set dataset.path"
            }
            RiskError::CsvError(_) | RiskError::DatasetError { .. } => {
                "Make sure the dataset is the headerless Pima Indians CSV (8 features + outcome)"
            }
            RiskError::ProcessingError { .. } => "Inspect the dataset rows named in the error",
            RiskError::ConfigError { .. }
            | RiskError::ConfigValidationError { .. }
            | RiskError::InvalidConfigValueError { .. } => {
                "Review the configuration file and command line flags"
            }
            RiskError::TrainingError { .. } => {
                "Check the [model] section (layers, learning rate, batch size)"
            }
            RiskError::ModelMissing { .. } => {
                "Run the `train` binary first to produce model.json and scaler.json"
            }
            RiskError::ModelIncompatible { .. } => {
                "Retrain the model with this version of the trainer"
            }
            RiskError::InferenceError { .. } => "Verify the model artifacts are not corrupted",
            RiskError::IoError(_) => "Check file permissions and that the directory exists",
            RiskError::SerializationError(_) => "The artifact file may be truncated; retrain",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not download the dataset: {}", self),
            ErrorCategory::Data => format!("The dataset could not be processed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Model => format!("Model problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// 對應 CLI 的結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_missing_is_critical() {
        let err = RiskError::ModelMissing {
            artifact: "model.json".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Model);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
        assert!(err.recovery_suggestion().contains("train"));
    }

    #[test]
    fn test_config_errors_share_category() {
        let errors = [
            RiskError::ConfigError {
                message: "bad".to_string(),
            },
            RiskError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: "unexpected end of input".to_string(),
            },
            RiskError::InvalidConfigValueError {
                field: "model.epochs".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            },
        ];

        for err in &errors {
            assert_eq!(err.category(), ErrorCategory::Configuration);
            assert_eq!(err.exit_code(), 1);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RiskError = io.into();
        assert!(matches!(err, RiskError::IoError(_)));
        assert!(err.user_friendly_message().starts_with("System error"));
    }
}
