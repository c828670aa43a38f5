use crate::core::predictor::ModelInfo;
use crate::domain::features::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SERVICE_NAME: &str = "diabetes-backend";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub model_loaded: bool,
    pub threshold: f64,
}

/// Schema entry for one input feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unit: Option<String>,
}

impl From<Feature> for FeatureSpec {
    fn from(feature: Feature) -> Self {
        let (min, max) = feature.range();
        Self {
            name: feature.name().to_string(),
            min,
            max,
            unit: feature.unit().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelResponse {
    pub features: Vec<FeatureSpec>,
    #[serde(flatten)]
    pub model: ModelInfo,
}
