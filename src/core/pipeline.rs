use crate::config::toml_config::TrainingConfig;
use crate::core::metrics::EvaluationMetrics;
use crate::core::network::NeuralNetwork;
use crate::core::predictor::{ModelArtifact, MODEL_FILE, SCALER_FILE};
use crate::core::preprocess;
use crate::core::scaler::StandardScaler;
use crate::domain::features::FEATURE_COUNT;
use crate::domain::model::{PatientRecord, PreparedData, TrainingOutcome, TrainingSummary};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{Result, RiskError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use std::time::Duration;

/// Pima Indians 資料集的訓練管道
pub struct PimaPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: TrainingConfig,
    pub(crate) client: Client,
}

impl<S: Storage> PimaPipeline<S> {
    pub fn new(storage: S, config: TrainingConfig) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>> {
        tracing::info!("Reading dataset from local file: {}", path);
        tokio::fs::read(path).await.map_err(|e| RiskError::DatasetError {
            message: format!("cannot read '{}': {}", path, e),
        })
    }

    /// 下載資料集；網路錯誤與 5xx 會重試，4xx 直接失敗
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let dataset = &self.config.dataset;
        let attempts = dataset.retry_attempts + 1;

        let mut attempt = 1;
        loop {
            tracing::info!("Downloading dataset from {} (attempt {}/{})", url, attempt, attempts);

            let response = self
                .client
                .get(url)
                .timeout(Duration::from_secs(dataset.timeout_seconds))
                .send()
                .await;

            let retryable = match response {
                Ok(resp) if resp.status().is_success() => {
                    let bytes = resp.bytes().await?;
                    tracing::debug!("Downloaded {} bytes", bytes.len());
                    return Ok(bytes.to_vec());
                }
                Ok(resp) if resp.status().is_client_error() => {
                    return Err(RiskError::DatasetError {
                        message: format!("download of {} failed with status {}", url, resp.status()),
                    });
                }
                Ok(resp) => RiskError::DatasetError {
                    message: format!("download of {} failed with status {}", url, resp.status()),
                },
                Err(e) => RiskError::HttpError(e),
            };

            if attempt >= attempts {
                return Err(retryable);
            }
            tracing::warn!(
                "Dataset download failed: {}; retrying in {}s",
                retryable,
                dataset.retry_delay_seconds
            );
            tokio::time::sleep(Duration::from_secs(dataset.retry_delay_seconds)).await;
            attempt += 1;
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for PimaPipeline<S> {
    async fn extract(&self) -> Result<Vec<PatientRecord>> {
        let bytes = match &self.config.dataset.path {
            Some(path) => self.read_local(path).await?,
            None => self.download(&self.config.dataset.url).await?,
        };

        let records = preprocess::parse_dataset(&bytes, self.config.dataset.has_headers)?;
        let (negatives, positives) = preprocess::class_distribution(&records);
        tracing::info!(
            "Dataset shape: ({}, {}) - outcome 0: {}, outcome 1: {}",
            records.len(),
            FEATURE_COUNT + 1,
            negatives,
            positives
        );

        Ok(records)
    }

    async fn transform(&self, mut records: Vec<PatientRecord>) -> Result<PreparedData> {
        let columns = self.config.preprocess.zero_as_missing_features()?;
        let imputation = preprocess::impute_zero_as_missing(&mut records, &columns)?;
        for column in &imputation.columns {
            tracing::info!(
                "{}: {} zero values replaced with median {:.3}",
                column.feature.name(),
                column.missing,
                column.median
            );
        }

        let (train, test) = preprocess::stratified_split(
            &records,
            self.config.preprocess.test_size,
            self.config.preprocess.seed,
        )?;
        tracing::info!("Training set: {} rows, test set: {} rows", train.len(), test.len());

        Ok(PreparedData {
            train,
            test,
            imputation,
        })
    }

    async fn train(&self, data: PreparedData) -> Result<TrainingOutcome> {
        let model_config = self.config.model.clone();
        let seed = self.config.preprocess.seed;

        // 訓練屬於 CPU 密集工作，移到 blocking thread
        tokio::task::spawn_blocking(move || -> Result<TrainingOutcome> {
            let (train_x, train_y) = preprocess::to_matrix(&data.train);
            let (test_x, test_y) = preprocess::to_matrix(&data.test);

            let scaler = StandardScaler::fit(train_x.view())?;
            let train_x = scaler.transform(train_x.view())?;
            let test_x = scaler.transform(test_x.view())?;

            let mut rng = StdRng::seed_from_u64(seed);
            let mut network = NeuralNetwork::binary_classifier(
                FEATURE_COUNT,
                &model_config.hidden_layers,
                &mut rng,
            )?;
            tracing::info!("Model architecture:\n{}", network.summary());

            let history = network.fit(
                train_x.view(),
                train_y.view(),
                &model_config.fit_options(),
                &mut rng,
            )?;

            let (test_loss, _) = network.evaluate(test_x.view(), test_y.view())?;
            let probabilities = network.predict_proba(test_x.view())?;
            let y_pred: Vec<u8> = probabilities
                .iter()
                .map(|&p| u8::from(p > model_config.threshold))
                .collect();
            let y_true: Vec<u8> = data.test.iter().map(|r| r.outcome).collect();
            let metrics = EvaluationMetrics::from_predictions(&y_true, &y_pred, test_loss);

            tracing::info!(
                "Test loss: {:.4}, accuracy: {:.4}, precision: {:.4}, recall: {:.4}, f1: {:.4}",
                metrics.loss,
                metrics.accuracy,
                metrics.precision,
                metrics.recall,
                metrics.f1
            );
            tracing::info!("Classification report:\n{}", metrics.report_table());

            Ok(TrainingOutcome {
                network,
                scaler,
                history,
                metrics,
                train_samples: data.train.len(),
                test_samples: data.test.len(),
            })
        })
        .await
        .map_err(|e| RiskError::TrainingError {
            message: format!("training task failed: {}", e),
        })?
    }

    async fn load(&self, outcome: TrainingOutcome) -> Result<TrainingSummary> {
        let epochs_run = outcome.history.epochs();
        let metrics = outcome.metrics.clone();

        let artifact = ModelArtifact::new(
            outcome.network,
            self.config.model.threshold,
            Some(outcome.metrics),
        );
        let model_json = serde_json::to_vec_pretty(&artifact)?;
        let scaler_json = serde_json::to_vec_pretty(&outcome.scaler)?;

        // model.json 最後寫入：scaler 寫入失敗時不會留下新模型配舊 scaler
        self.storage.write_file(SCALER_FILE, &scaler_json).await?;
        self.storage.write_file(MODEL_FILE, &model_json).await?;

        Ok(TrainingSummary {
            model_path: self.storage.locate(MODEL_FILE),
            scaler_path: self.storage.locate(SCALER_FILE),
            metrics,
            epochs_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::network::HiddenLayer;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        failing_path: Option<String>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                RiskError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if self.failing_path.as_deref() == Some(path) {
                return Err(RiskError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("read-only: {}", path),
                )));
            }
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn locate(&self, path: &str) -> String {
            format!("memory://{}", path)
        }
    }

    /// 依 glucose 可分的合成資料
    fn synthetic_csv(rows: usize) -> String {
        let mut csv = String::new();
        for i in 0..rows {
            let positive = i % 3 == 0;
            let glucose = if positive { 160 + (i % 40) } else { 85 + (i % 30) };
            let insulin = if i % 5 == 0 { 0 } else { 80 + i % 50 };
            csv.push_str(&format!(
                "{},{},{},{},{},{:.1},{:.3},{},{}\n",
                i % 10,
                glucose,
                60 + i % 20,
                20 + i % 15,
                insulin,
                25.0 + (i % 12) as f64,
                0.2 + (i % 7) as f64 / 10.0,
                21 + i % 40,
                u8::from(positive)
            ));
        }
        csv
    }

    fn small_config(url: String) -> TrainingConfig {
        let mut config = TrainingConfig::default();
        config.dataset.url = url;
        config.dataset.retry_attempts = 1;
        config.dataset.retry_delay_seconds = 0;
        config.model.hidden_layers = vec![HiddenLayer {
            units: 8,
            dropout: 0.0,
        }];
        config.model.epochs = 60;
        config.model.batch_size = 16;
        config.model.learning_rate = 0.01;
        config.model.log_every = 0;
        config
    }

    #[tokio::test]
    async fn test_extract_downloads_headerless_csv() {
        let server = MockServer::start();
        let dataset_mock = server.mock(|when, then| {
            when.method(GET).path("/pima.csv");
            then.status(200)
                .header("Content-Type", "text/csv")
                .body(synthetic_csv(30));
        });

        let pipeline = PimaPipeline::new(MockStorage::default(), small_config(server.url("/pima.csv")));
        let records = pipeline.extract().await.unwrap();

        dataset_mock.assert();
        assert_eq!(records.len(), 30);
        assert_eq!(preprocess::class_distribution(&records), (20, 10));
    }

    #[tokio::test]
    async fn test_extract_retries_server_errors() {
        let server = MockServer::start();
        let dataset_mock = server.mock(|when, then| {
            when.method(GET).path("/pima.csv");
            then.status(503);
        });

        let pipeline = PimaPipeline::new(MockStorage::default(), small_config(server.url("/pima.csv")));
        let err = pipeline.extract().await.unwrap_err();

        // 1 次請求 + 1 次重試
        dataset_mock.assert_hits(2);
        assert!(matches!(err, RiskError::DatasetError { .. }));
    }

    #[tokio::test]
    async fn test_extract_does_not_retry_not_found() {
        let server = MockServer::start();
        let dataset_mock = server.mock(|when, then| {
            when.method(GET).path("/missing.csv");
            then.status(404);
        });

        let pipeline =
            PimaPipeline::new(MockStorage::default(), small_config(server.url("/missing.csv")));
        let err = pipeline.extract().await.unwrap_err();

        dataset_mock.assert_hits(1);
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_extract_prefers_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pima.csv");
        std::fs::write(&path, synthetic_csv(12)).unwrap();

        let mut config = small_config("http://127.0.0.1:9/unused.csv".to_string());
        config.dataset.path = Some(path.to_string_lossy().to_string());

        let pipeline = PimaPipeline::new(MockStorage::default(), config);
        let records = pipeline.extract().await.unwrap();
        assert_eq!(records.len(), 12);
    }

    #[tokio::test]
    async fn test_transform_imputes_and_splits() {
        let pipeline = PimaPipeline::new(
            MockStorage::default(),
            small_config("http://localhost/unused.csv".to_string()),
        );
        let records = preprocess::parse_dataset(synthetic_csv(50).as_bytes(), false).unwrap();

        let prepared = pipeline.transform(records).await.unwrap();

        assert_eq!(prepared.train.len() + prepared.test.len(), 50);
        assert_eq!(prepared.test.len(), 10);
        // insulin 每 5 筆有 1 筆為 0
        assert_eq!(prepared.imputation.total_missing(), 10);
        assert!(prepared
            .train
            .iter()
            .chain(prepared.test.iter())
            .all(|r| r.features[4] != 0.0));
    }

    #[tokio::test]
    async fn test_train_and_load_write_both_artifacts() {
        let storage = MockStorage::default();
        let pipeline = PimaPipeline::new(
            storage.clone(),
            small_config("http://localhost/unused.csv".to_string()),
        );
        let records = preprocess::parse_dataset(synthetic_csv(90).as_bytes(), false).unwrap();

        let prepared = pipeline.transform(records).await.unwrap();
        let outcome = pipeline.train(prepared).await.unwrap();
        assert_eq!(outcome.history.epochs(), 60);
        assert_eq!(outcome.train_samples + outcome.test_samples, 90);
        assert!(outcome.metrics.accuracy > 0.8);

        let summary = pipeline.load(outcome).await.unwrap();
        assert_eq!(summary.model_path, "memory://model.json");
        assert_eq!(summary.scaler_path, "memory://scaler.json");
        assert_eq!(summary.epochs_run, 60);

        let model_bytes = storage.get_file(MODEL_FILE).await.unwrap();
        let artifact: ModelArtifact = serde_json::from_slice(&model_bytes).unwrap();
        assert_eq!(artifact.feature_order.len(), FEATURE_COUNT);
        assert_eq!(artifact.threshold, 0.5);
        assert!(artifact.metrics.is_some());

        let scaler_bytes = storage.get_file(SCALER_FILE).await.unwrap();
        let scaler: StandardScaler = serde_json::from_slice(&scaler_bytes).unwrap();
        assert_eq!(scaler.n_features(), FEATURE_COUNT);
    }

    #[tokio::test]
    async fn test_failed_scaler_write_keeps_previous_model() {
        let storage = MockStorage {
            failing_path: Some(SCALER_FILE.to_string()),
            ..Default::default()
        };
        storage
            .files
            .lock()
            .await
            .insert(MODEL_FILE.to_string(), b"previous model".to_vec());

        let mut config = small_config("http://localhost/unused.csv".to_string());
        config.model.epochs = 2;
        let pipeline = PimaPipeline::new(storage.clone(), config);
        let records = preprocess::parse_dataset(synthetic_csv(60).as_bytes(), false).unwrap();
        let prepared = pipeline.transform(records).await.unwrap();
        let outcome = pipeline.train(prepared).await.unwrap();

        let err = pipeline.load(outcome).await.unwrap_err();
        assert!(matches!(err, RiskError::IoError(_)));
        assert_eq!(
            storage.get_file(MODEL_FILE).await.unwrap(),
            b"previous model".to_vec()
        );
        assert!(storage.get_file(SCALER_FILE).await.is_none());
    }
}
