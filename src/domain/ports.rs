use crate::domain::model::{PatientRecord, PreparedData, TrainingOutcome, TrainingSummary};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human readable location of `path`, used in logs and summaries.
    fn locate(&self, path: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<PatientRecord>>;
    async fn transform(&self, records: Vec<PatientRecord>) -> Result<PreparedData>;
    async fn train(&self, data: PreparedData) -> Result<TrainingOutcome>;
    async fn load(&self, outcome: TrainingOutcome) -> Result<TrainingSummary>;
}
