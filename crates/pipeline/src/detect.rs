//! Problem-kind detection for a target column.

use std::collections::HashSet;

use automl_core::problem::ProblemKind;

/// Integer targets with at most this many distinct values are treated as
/// class labels.
pub const MAX_CLASS_CARDINALITY: usize = 20;

/// Decide whether a target column calls for classification or regression.
///
/// Missing (empty) cells are ignored.
///
/// - text or boolean values: classification
/// - integers with at most [`MAX_CLASS_CARDINALITY`] distinct values:
///   classification, otherwise regression
/// - any other numeric values: regression
/// - no values at all: classification
pub fn detect_problem_kind(values: &[&str]) -> ProblemKind {
    let present: Vec<&str> = values.iter().copied().filter(|v| !v.is_empty()).collect();
    if present.is_empty() {
        return ProblemKind::Classification;
    }

    if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        let distinct: HashSet<&str> = present.iter().copied().collect();
        return if distinct.len() <= MAX_CLASS_CARDINALITY {
            ProblemKind::Classification
        } else {
            ProblemKind::Regression
        };
    }

    if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ProblemKind::Regression;
    }

    ProblemKind::Classification
}
