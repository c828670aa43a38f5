use crate::core::metrics::EvaluationMetrics;
use crate::core::network::{History, NeuralNetwork};
use crate::core::scaler::StandardScaler;
use crate::domain::features::{Feature, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// One dataset row: eight features in schema order plus the label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub features: [f64; FEATURE_COUNT],
    pub outcome: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnImputation {
    pub feature: Feature,
    pub missing: usize,
    pub median: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationSummary {
    pub columns: Vec<ColumnImputation>,
}

impl ImputationSummary {
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: Vec<PatientRecord>,
    pub test: Vec<PatientRecord>,
    pub imputation: ImputationSummary,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub network: NeuralNetwork,
    pub scaler: StandardScaler,
    pub history: History,
    pub metrics: EvaluationMetrics,
    pub train_samples: usize,
    pub test_samples: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub model_path: String,
    pub scaler_path: String,
    pub metrics: EvaluationMetrics,
    pub epochs_run: usize,
}

/// 單筆預測結果，直接序列化為 HTTP 回應
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: u8,
    pub probability: f64,
    pub confidence: f64,
}
