pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use api::{create_router, AppState};
pub use config::{cli::LocalStorage, toml_config::TrainingConfig, ServeConfig};
pub use core::{engine::TrainingEngine, pipeline::PimaPipeline, predictor::Predictor};
pub use domain::features::{Feature, FeatureVector};
pub use utils::error::{Result, RiskError};
