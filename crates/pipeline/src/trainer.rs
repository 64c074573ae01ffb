use std::path::PathBuf;

use tracing::debug;

use crate::computation::{Computation, ComputationError, ComputationOutput, ProgressSink};
use crate::dataset::Dataset;
use crate::detect::detect_problem_kind;
use crate::input::resolve_input;
use crate::strategy::{strategy_for, PreparedData, TrainingResults};

/// Computation that evaluates a baseline model on an uploaded CSV.
#[derive(Debug, Clone)]
pub struct BaselineTrainer {
    upload_dir: PathBuf,
}

impl BaselineTrainer {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }
}

impl Computation for BaselineTrainer {
    fn compute(
        &self,
        input_reference: &str,
        target_spec: &str,
        progress: &ProgressSink,
    ) -> Result<ComputationOutput, ComputationError> {
        progress.emit("Loading dataset...");
        let path = resolve_input(&self.upload_dir, input_reference)
            .map_err(|e| ComputationError::new(e.to_string()))?;
        let dataset = Dataset::from_path(&path)?;
        progress.emit(format!(
            "Loaded {} rows × {} columns.",
            dataset.row_count(),
            dataset.column_count()
        ));

        let target_index = dataset.column_index(target_spec).ok_or_else(|| {
            ComputationError::new(format!("Target column '{target_spec}' not found in CSV."))
        })?;

        let kind = detect_problem_kind(&dataset.column(target_index));
        progress.emit(format!(
            "Detected problem type: {}",
            kind.as_str().to_uppercase()
        ));

        let data = PreparedData::prepare(&dataset, target_index)?;
        if data.dropped_rows > 0 {
            progress.emit(format!(
                "Dropped {} rows with a missing target.",
                data.dropped_rows
            ));
        }
        progress.emit(format!(
            "Setting up experiment: {} training rows, {} holdout rows, {} numeric features.",
            data.train_targets.len(),
            data.test_targets.len(),
            data.train_features.len()
        ));

        let strategy = strategy_for(kind);
        progress.emit(format!("Comparing models: {}", strategy.model_name()));
        let results = strategy.train(&data, progress)?;
        progress.emit(format!("Best model: {}", results.best_model_name));
        progress.emit(summarize(&results));

        debug!(input_reference, target_spec, kind = %kind, "Training finished");

        let payload = serde_json::to_value(&results)
            .map_err(|e| ComputationError::new(format!("Could not encode results: {e}")))?;
        Ok(ComputationOutput {
            problem_kind: Some(kind),
            payload,
        })
    }
}

fn summarize(results: &TrainingResults) -> String {
    let m = &results.metrics;
    let parts: Vec<String> = [
        ("accuracy", m.accuracy),
        ("f1", m.f1_score),
        ("rmse", m.rmse),
        ("mae", m.mae),
        ("r2", m.r2),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{name}={v:.4}")))
    .collect();
    format!("Metrics: {}", parts.join(", "))
}
