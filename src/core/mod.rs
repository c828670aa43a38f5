pub mod engine;
pub mod metrics;
pub mod network;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;
pub mod scaler;

pub use crate::domain::model::{PatientRecord, Prediction};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
