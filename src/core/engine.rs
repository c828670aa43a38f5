use crate::domain::model::TrainingSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行 extract → transform → train → load
pub struct TrainingEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> TrainingEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn monitor(&self) -> &SystemMonitor {
        &self.monitor
    }

    pub async fn run(&self) -> Result<TrainingSummary> {
        tracing::info!("Starting training pipeline");

        tracing::info!("Extracting dataset...");
        let records = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", records.len());
        self.monitor.finish_phase("extract");

        tracing::info!("Preparing data...");
        let prepared = self.pipeline.transform(records).await?;
        tracing::info!(
            "Prepared {} training / {} test records ({} values imputed)",
            prepared.train.len(),
            prepared.test.len(),
            prepared.imputation.total_missing()
        );
        self.monitor.finish_phase("transform");

        tracing::info!("Training model...");
        let outcome = self.pipeline.train(prepared).await?;
        tracing::info!(
            "Trained for {} epochs, test accuracy {:.4}",
            outcome.history.epochs(),
            outcome.metrics.accuracy
        );
        self.monitor.finish_phase("train");

        tracing::info!("Saving artifacts...");
        let summary = self.pipeline.load(outcome).await?;
        tracing::info!("Model saved to: {}", summary.model_path);
        tracing::info!("Scaler saved to: {}", summary.scaler_path);
        self.monitor.finish_phase("load");

        self.monitor.log_final_stats();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::EvaluationMetrics;
    use crate::core::network::{History, HiddenLayer, NeuralNetwork};
    use crate::core::scaler::StandardScaler;
    use crate::domain::model::{
        ImputationSummary, PatientRecord, PreparedData, TrainingOutcome,
    };
    use crate::utils::error::RiskError;
    use async_trait::async_trait;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    /// 記錄每個階段被呼叫的順序
    #[derive(Default)]
    struct RecordingPipeline {
        calls: Mutex<Vec<&'static str>>,
        fail_on_train: bool,
    }

    impl RecordingPipeline {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, phase: &'static str) {
            self.calls.lock().unwrap().push(phase);
        }
    }

    #[async_trait]
    impl Pipeline for RecordingPipeline {
        async fn extract(&self) -> Result<Vec<PatientRecord>> {
            self.record("extract");
            Ok(vec![
                PatientRecord {
                    features: [1.0; 8],
                    outcome: 0,
                };
                4
            ])
        }

        async fn transform(&self, records: Vec<PatientRecord>) -> Result<PreparedData> {
            self.record("transform");
            let (train, test) = records.split_at(3);
            Ok(PreparedData {
                train: train.to_vec(),
                test: test.to_vec(),
                imputation: ImputationSummary::default(),
            })
        }

        async fn train(&self, data: PreparedData) -> Result<TrainingOutcome> {
            self.record("train");
            if self.fail_on_train {
                return Err(RiskError::TrainingError {
                    message: "diverged".to_string(),
                });
            }
            let mut rng = StdRng::seed_from_u64(1);
            let network = NeuralNetwork::binary_classifier(
                8,
                &[HiddenLayer {
                    units: 2,
                    dropout: 0.0,
                }],
                &mut rng,
            )?;
            let scaler = StandardScaler::fit(Array2::<f64>::ones((3, 8)).view())?;
            Ok(TrainingOutcome {
                network,
                scaler,
                history: History::default(),
                metrics: EvaluationMetrics::from_predictions(&[0], &[0], 0.1),
                train_samples: data.train.len(),
                test_samples: data.test.len(),
            })
        }

        async fn load(&self, outcome: TrainingOutcome) -> Result<TrainingSummary> {
            self.record("load");
            Ok(TrainingSummary {
                model_path: "memory://model.json".to_string(),
                scaler_path: "memory://scaler.json".to_string(),
                metrics: outcome.metrics,
                epochs_run: outcome.history.epochs(),
            })
        }
    }

    #[tokio::test]
    async fn test_engine_runs_phases_in_order() {
        let engine = TrainingEngine::new(RecordingPipeline::default());
        let summary = engine.run().await.unwrap();

        assert_eq!(summary.model_path, "memory://model.json");
        assert_eq!(summary.metrics.accuracy, 1.0);
        assert_eq!(
            engine.pipeline.calls(),
            vec!["extract", "transform", "train", "load"]
        );

        let phases: Vec<String> = engine.monitor().phases().into_iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec!["extract", "transform", "train", "load"]);
    }

    #[tokio::test]
    async fn test_engine_stops_at_failing_phase() {
        let pipeline = RecordingPipeline {
            fail_on_train: true,
            ..Default::default()
        };
        let engine = TrainingEngine::new(pipeline);

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, RiskError::TrainingError { .. }));
        assert_eq!(engine.pipeline.calls(), vec!["extract", "transform", "train"]);
    }
}
