//! Evaluation metrics used by the baseline strategies.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

/// Fraction of predictions equal to the actual label.
pub fn accuracy(actual: &[&str], predicted: &[&str]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let correct = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a == p)
        .count();
    correct as f64 / actual.len() as f64
}

/// Per-label F1 averaged with each label weighted by its support.
///
/// A label that is never predicted, or never correct, scores 0.
pub fn weighted_f1(actual: &[&str], predicted: &[&str]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }

    let mut support: HashMap<&str, usize> = HashMap::new();
    let mut predicted_count: HashMap<&str, usize> = HashMap::new();
    let mut true_positive: HashMap<&str, usize> = HashMap::new();
    for (&a, &p) in actual.iter().zip(predicted) {
        *support.entry(a).or_default() += 1;
        *predicted_count.entry(p).or_default() += 1;
        if a == p {
            *true_positive.entry(a).or_default() += 1;
        }
    }

    let weighted: f64 = support
        .iter()
        .map(|(&label, &n)| {
            let tp = true_positive.get(label).copied().unwrap_or(0) as f64;
            let predicted = predicted_count.get(label).copied().unwrap_or(0) as f64;
            let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let recall = tp / n as f64;
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            f1 * n as f64
        })
        .sum();

    weighted / actual.len() as f64
}

/// Confusion matrix with rows indexed by actual label and columns by
/// predicted label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<u64>>,
}

/// Build a confusion matrix over the sorted union of actual and predicted
/// labels.
pub fn confusion_matrix(actual: &[&str], predicted: &[&str]) -> ConfusionMatrix {
    let labels: Vec<String> = actual
        .iter()
        .chain(predicted)
        .copied()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut matrix = vec![vec![0u64; labels.len()]; labels.len()];
    for (&a, &p) in actual.iter().zip(predicted) {
        matrix[index[a]][index[p]] += 1;
    }

    ConfusionMatrix { labels, matrix }
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination. Returns 0 when `actual` is constant.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Pearson correlation of two equally long series. Returns 0 when either
/// series is constant or shorter than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
