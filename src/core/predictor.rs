use crate::core::metrics::EvaluationMetrics;
use crate::core::network::NeuralNetwork;
use crate::core::scaler::StandardScaler;
use crate::domain::features::{Feature, FeatureVector, FEATURE_COUNT};
use crate::domain::model::Prediction;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, RiskError};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Contents of `model.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_order: Vec<String>,
    pub threshold: f64,
    pub trained_at: DateTime<Utc>,
    pub metrics: Option<EvaluationMetrics>,
    pub network: NeuralNetwork,
}

impl ModelArtifact {
    pub fn new(network: NeuralNetwork, threshold: f64, metrics: Option<EvaluationMetrics>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_order: Feature::ALL.iter().map(|f| f.name().to_string()).collect(),
            threshold,
            trained_at: Utc::now(),
            metrics,
            network,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub format_version: u32,
    pub feature_order: Vec<String>,
    pub threshold: f64,
    pub trained_at: DateTime<Utc>,
    pub layers: Vec<usize>,
    pub parameters: usize,
    pub metrics: Option<EvaluationMetrics>,
}

/// Loaded model + scaler, shared read-only by request handlers.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: ModelArtifact,
    scaler: StandardScaler,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact, scaler: StandardScaler) -> Result<Self> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(RiskError::ModelIncompatible {
                message: format!(
                    "artifact format {} is not supported (expected {})",
                    artifact.format_version, ARTIFACT_FORMAT_VERSION
                ),
            });
        }

        let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if artifact.feature_order != expected {
            return Err(RiskError::ModelIncompatible {
                message: format!(
                    "model feature order {:?} differs from service schema {:?}",
                    artifact.feature_order, expected
                ),
            });
        }

        artifact
            .network
            .check_structure()
            .map_err(|e| RiskError::ModelIncompatible {
                message: match e {
                    RiskError::TrainingError { message } => message,
                    other => other.to_string(),
                },
            })?;

        if artifact.network.input_dim() != FEATURE_COUNT || scaler.n_features() != FEATURE_COUNT {
            return Err(RiskError::ModelIncompatible {
                message: format!(
                    "network takes {} inputs and scaler {} columns, expected {}",
                    artifact.network.input_dim(),
                    scaler.n_features(),
                    FEATURE_COUNT
                ),
            });
        }

        if !(artifact.threshold > 0.0 && artifact.threshold < 1.0) {
            return Err(RiskError::ModelIncompatible {
                message: format!("threshold {} is outside (0, 1)", artifact.threshold),
            });
        }

        Ok(Self { artifact, scaler })
    }

    pub async fn load<S: Storage>(storage: &S) -> Result<Self> {
        let model_bytes = read_artifact(storage, MODEL_FILE).await?;
        let scaler_bytes = read_artifact(storage, SCALER_FILE).await?;

        let artifact: ModelArtifact = serde_json::from_slice(&model_bytes)?;
        let scaler: StandardScaler = serde_json::from_slice(&scaler_bytes)?;

        tracing::info!(
            "Loaded model from {} (trained {}, layers {:?})",
            storage.locate(MODEL_FILE),
            artifact.trained_at.to_rfc3339(),
            artifact.network.layer_widths()
        );

        Self::new(artifact, scaler)
    }

    pub fn threshold(&self) -> f64 {
        self.artifact.threshold
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        let scaled = self.scaler.transform_row(features.as_array())?;
        let input = Array2::from_shape_vec((1, FEATURE_COUNT), scaled.to_vec()).map_err(|e| {
            RiskError::InferenceError {
                message: e.to_string(),
            }
        })?;

        let probability = self
            .artifact
            .network
            .predict_proba(input.view())?
            .get(0)
            .copied()
            .ok_or_else(|| RiskError::InferenceError {
                message: "network produced no output".to_string(),
            })?;

        if !probability.is_finite() {
            return Err(RiskError::InferenceError {
                message: format!("network produced a non-finite probability ({})", probability),
            });
        }

        let prediction = u8::from(probability > self.artifact.threshold);
        let confidence = if prediction == 1 {
            probability
        } else {
            1.0 - probability
        };

        Ok(Prediction {
            prediction,
            probability,
            confidence,
        })
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            format_version: self.artifact.format_version,
            feature_order: self.artifact.feature_order.clone(),
            threshold: self.artifact.threshold,
            trained_at: self.artifact.trained_at,
            layers: self.artifact.network.layer_widths(),
            parameters: self.artifact.network.parameter_count(),
            metrics: self.artifact.metrics.clone(),
        }
    }
}

async fn read_artifact<S: Storage>(storage: &S, name: &str) -> Result<Vec<u8>> {
    match storage.read_file(name).await {
        Ok(bytes) => Ok(bytes),
        Err(RiskError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!("Model artifact missing at {}", storage.locate(name));
            Err(RiskError::ModelMissing {
                artifact: storage.locate(name),
            })
        }
        Err(e) => Err(e),
    }
}
