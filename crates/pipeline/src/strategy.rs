//! Baseline training strategies, one per [`ProblemKind`].
//!
//! [`strategy_for`] is the factory the trainer uses once the problem kind
//! of the target is known.

use std::collections::{BTreeMap, BTreeSet};

use automl_core::problem::ProblemKind;
use serde::Serialize;

use crate::computation::{ComputationError, ProgressSink};
use crate::dataset::Dataset;
use crate::metrics::{self, ConfusionMatrix};

/// Every `HOLDOUT_STRIDE`-th row (1-based) is held out for evaluation.
const HOLDOUT_STRIDE: usize = 5;

/// At most this many features are reported, strongest first.
const MAX_REPORTED_FEATURES: usize = 20;

/// Fewest rows with a target value needed to train and evaluate.
pub const MIN_TRAINING_ROWS: usize = HOLDOUT_STRIDE;

/// Metrics reported for the selected model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub problem_kind: ProblemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// The result payload stored on a finished job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingResults {
    pub problem_kind: ProblemKind,
    pub metrics: Metrics,
    pub feature_importance: Vec<FeatureImportance>,
    pub confusion_matrix: Option<ConfusionMatrix>,
    pub best_model_name: String,
}

/// A dataset split for one target column.
///
/// Rows with a missing target are dropped. Numeric features are the other
/// columns whose present cells all parse as numbers.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train_targets: Vec<String>,
    pub test_targets: Vec<String>,
    /// `(name, train values)`; `None` marks a missing cell.
    pub train_features: Vec<(String, Vec<Option<f64>>)>,
    pub dropped_rows: usize,
}

impl PreparedData {
    pub fn prepare(dataset: &Dataset, target_index: usize) -> Result<Self, ComputationError> {
        let kept: Vec<&Vec<String>> = dataset
            .rows
            .iter()
            .filter(|row| !row[target_index].is_empty())
            .collect();
        let dropped_rows = dataset.row_count() - kept.len();

        if kept.len() < MIN_TRAINING_ROWS {
            return Err(ComputationError::new(format!(
                "Need at least {MIN_TRAINING_ROWS} rows with a target value, found {}",
                kept.len()
            )));
        }

        let is_holdout = |i: usize| (i + 1) % HOLDOUT_STRIDE == 0;

        let mut train_targets = Vec::new();
        let mut test_targets = Vec::new();
        for (i, row) in kept.iter().enumerate() {
            let target = row[target_index].clone();
            if is_holdout(i) {
                test_targets.push(target);
            } else {
                train_targets.push(target);
            }
        }

        let train_features = (0..dataset.column_count())
            .filter(|&col| col != target_index)
            .filter_map(|col| {
                let values: Option<Vec<Option<f64>>> = kept
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !is_holdout(*i))
                    .map(|(_, row)| {
                        let cell = row[col].as_str();
                        if cell.is_empty() {
                            Some(None)
                        } else {
                            cell.parse::<f64>().ok().map(Some)
                        }
                    })
                    .collect();
                values.map(|v| (dataset.headers[col].clone(), v))
            })
            .collect();

        Ok(Self {
            train_targets,
            test_targets,
            train_features,
            dropped_rows,
        })
    }

    /// Absolute Pearson correlation of each numeric feature with the
    /// encoded training target, strongest first.
    pub fn feature_importance(&self, encoded_target: &[f64]) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .train_features
            .iter()
            .map(|(name, values)| {
                let (x, y): (Vec<f64>, Vec<f64>) = values
                    .iter()
                    .zip(encoded_target)
                    .filter_map(|(v, t)| v.map(|v| (v, *t)))
                    .unzip();
                FeatureImportance {
                    feature: name.clone(),
                    importance: metrics::round6(metrics::pearson(&x, &y).abs()),
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(MAX_REPORTED_FEATURES);
        ranked
    }
}

/// A model-fitting strategy for one problem kind.
pub trait TrainingStrategy: Send + Sync {
    fn kind(&self) -> ProblemKind;

    fn model_name(&self) -> &'static str;

    fn train(
        &self,
        data: &PreparedData,
        progress: &ProgressSink,
    ) -> Result<TrainingResults, ComputationError>;
}

/// Select the strategy for a problem kind.
pub fn strategy_for(kind: ProblemKind) -> Box<dyn TrainingStrategy> {
    match kind {
        ProblemKind::Classification => Box::new(MajorityClassBaseline),
        ProblemKind::Regression => Box::new(MeanBaseline),
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Predicts the most frequent training label (ties go to the label that
/// sorts first).
pub struct MajorityClassBaseline;

impl TrainingStrategy for MajorityClassBaseline {
    fn kind(&self) -> ProblemKind {
        ProblemKind::Classification
    }

    fn model_name(&self) -> &'static str {
        "MajorityClassBaseline"
    }

    fn train(
        &self,
        data: &PreparedData,
        progress: &ProgressSink,
    ) -> Result<TrainingResults, ComputationError> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in &data.train_targets {
            *counts.entry(label.as_str()).or_default() += 1;
        }
        let majority = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| *label)
            .ok_or_else(|| ComputationError::new("No training rows for classification"))?;
        progress.emit(format!(
            "Majority class '{majority}' over {} labels",
            counts.len()
        ));

        let actual: Vec<&str> = data.test_targets.iter().map(String::as_str).collect();
        let predicted = vec![majority; actual.len()];
        let accuracy = metrics::accuracy(&actual, &predicted);
        let f1 = metrics::weighted_f1(&actual, &predicted);

        // Labels are encoded by their sorted position for correlation.
        let labels: BTreeSet<&str> = counts.keys().copied().collect();
        let encoded: Vec<f64> = data
            .train_targets
            .iter()
            .map(|t| labels.iter().position(|l| *l == t.as_str()).unwrap_or(0) as f64)
            .collect();

        Ok(TrainingResults {
            problem_kind: self.kind(),
            metrics: Metrics {
                problem_kind: self.kind(),
                accuracy: Some(metrics::round6(accuracy)),
                f1_score: Some(metrics::round6(f1)),
                rmse: None,
                r2: None,
                mae: None,
            },
            feature_importance: data.feature_importance(&encoded),
            confusion_matrix: Some(metrics::confusion_matrix(&actual, &predicted)),
            best_model_name: self.model_name().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// Predicts the mean of the training targets.
pub struct MeanBaseline;

impl TrainingStrategy for MeanBaseline {
    fn kind(&self) -> ProblemKind {
        ProblemKind::Regression
    }

    fn model_name(&self) -> &'static str {
        "MeanBaseline"
    }

    fn train(
        &self,
        data: &PreparedData,
        progress: &ProgressSink,
    ) -> Result<TrainingResults, ComputationError> {
        let train = parse_numeric(&data.train_targets)?;
        let test = parse_numeric(&data.test_targets)?;

        let mean = train.iter().sum::<f64>() / train.len() as f64;
        progress.emit(format!("Training mean: {mean:.4}"));

        let predicted = vec![mean; test.len()];
        let rmse = metrics::rmse(&test, &predicted);
        let mae = metrics::mae(&test, &predicted);
        let r2 = metrics::r2(&test, &predicted);

        Ok(TrainingResults {
            problem_kind: self.kind(),
            metrics: Metrics {
                problem_kind: self.kind(),
                accuracy: None,
                f1_score: None,
                rmse: Some(metrics::round6(rmse)),
                r2: Some(metrics::round6(r2)),
                mae: Some(metrics::round6(mae)),
            },
            feature_importance: data.feature_importance(&train),
            confusion_matrix: None,
            best_model_name: self.model_name().to_string(),
        })
    }
}

fn parse_numeric(values: &[String]) -> Result<Vec<f64>, ComputationError> {
    values
        .iter()
        .map(|v| {
            v.parse::<f64>().map_err(|_| {
                ComputationError::new(format!("Target value '{v}' is not numeric"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> ProgressSink {
        ProgressSink::channel().0
    }

    fn regression_data() -> Dataset {
        let mut csv = String::from("x,noise,y\n");
        for i in 0..10 {
            csv.push_str(&format!("{i},{},{}\n", i % 2, 2 * i));
        }
        Dataset::from_csv_str(&csv).unwrap()
    }

    #[test]
    fn factory_selects_strategy_by_kind() {
        assert_eq!(
            strategy_for(ProblemKind::Classification).kind(),
            ProblemKind::Classification
        );
        assert_eq!(
            strategy_for(ProblemKind::Regression).model_name(),
            "MeanBaseline"
        );
    }

    #[test]
    fn split_holds_out_every_fifth_row() {
        let data = PreparedData::prepare(&regression_data(), 2).unwrap();
        assert_eq!(data.train_targets.len(), 8);
        assert_eq!(data.test_targets, vec!["8", "18"]);
        assert_eq!(data.dropped_rows, 0);
    }

    #[test]
    fn rows_without_target_are_dropped() {
        let ds = Dataset::from_csv_str("a,t\n1,x\n2,\n3,y\n4,x\n5,x\n6,y\n").unwrap();
        let data = PreparedData::prepare(&ds, 1).unwrap();
        assert_eq!(data.dropped_rows, 1);
        assert_eq!(data.train_targets.len() + data.test_targets.len(), 5);
    }

    #[test]
    fn too_few_rows_fail() {
        let ds = Dataset::from_csv_str("a,t\n1,x\n2,y\n").unwrap();
        let err = PreparedData::prepare(&ds, 1).unwrap_err();
        assert!(err.to_string().contains("at least 5 rows"));
    }

    #[test]
    fn text_columns_are_not_features() {
        let ds = Dataset::from_csv_str(
            "name,x,t\na,1,1\nb,2,2\nc,3,3\nd,4,4\ne,5,5\n",
        )
        .unwrap();
        let data = PreparedData::prepare(&ds, 2).unwrap();
        let names: Vec<&str> = data.train_features.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x"]);
    }

    #[test]
    fn mean_baseline_reports_regression_metrics() {
        let data = PreparedData::prepare(&regression_data(), 2).unwrap();
        let results = MeanBaseline.train(&data, &sink()).unwrap();

        assert_eq!(results.problem_kind, ProblemKind::Regression);
        assert!(results.confusion_matrix.is_none());
        assert!(results.metrics.rmse.unwrap() > 0.0);
        assert!(results.metrics.accuracy.is_none());
        // x is perfectly correlated with y, noise is not.
        assert_eq!(results.feature_importance[0].feature, "x");
        assert_eq!(results.feature_importance[0].importance, 1.0);
    }

    #[test]
    fn majority_baseline_reports_classification_metrics() {
        let ds = Dataset::from_csv_str(
            "f,label\n1,cat\n2,cat\n3,dog\n4,cat\n5,cat\n6,cat\n7,dog\n8,cat\n9,cat\n10,dog\n",
        )
        .unwrap();
        let data = PreparedData::prepare(&ds, 1).unwrap();
        let results = MajorityClassBaseline.train(&data, &sink()).unwrap();

        // Held out: rows 5 (cat) and 10 (dog); majority predicts cat.
        assert_eq!(results.metrics.accuracy, Some(0.5));
        let cm = results.confusion_matrix.unwrap();
        assert_eq!(cm.labels, vec!["cat", "dog"]);
        assert_eq!(cm.matrix, vec![vec![1, 0], vec![1, 0]]);
        assert_eq!(results.best_model_name, "MajorityClassBaseline");
    }

    #[test]
    fn results_serialize_without_unused_metrics() {
        let data = PreparedData::prepare(&regression_data(), 2).unwrap();
        let results = MeanBaseline.train(&data, &sink()).unwrap();
        let json = serde_json::to_value(&results).unwrap();

        assert_eq!(json["problem_kind"], "regression");
        assert_eq!(json["metrics"]["problem_kind"], "regression");
        assert!(json["metrics"].get("accuracy").is_none());
        assert!(json["confusion_matrix"].is_null());
    }
}
