use serde::{Deserialize, Serialize};

/// Scoring metric applied to validation-fold predictions.
///
/// Every metric follows the higher-is-better convention the search maximizes,
/// so error-style metrics are negated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    /// Fraction of predictions within 0.5 of the label.
    Accuracy,
    /// Unweighted mean of per-class F1 scores.
    F1Macro,
    /// Coefficient of determination.
    RSquared,
    /// Negated mean squared error.
    NegMeanSquaredError,
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::F1Macro => "f1_macro",
            Scoring::RSquared => "r2",
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
        }
    }

    /// Score predictions against observed targets. Both slices must have the
    /// same non-zero length.
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        debug_assert_eq!(y_true.len(), y_pred.len());
        match self {
            Scoring::Accuracy => accuracy(y_true, y_pred),
            Scoring::F1Macro => f1_macro(y_true, y_pred),
            Scoring::RSquared => r_squared(y_true, y_pred),
            Scoring::NegMeanSquaredError => neg_mean_squared_error(y_true, y_pred),
        }
    }
}

fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let hits = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| (**t - **p).abs() < 0.5)
        .count();
    hits as f64 / y_true.len() as f64
}

fn f1_macro(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mut classes: Vec<f64> = Vec::new();
    for &label in y_true {
        if !classes.iter().any(|&c| c == label) {
            classes.push(label);
        }
    }
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut f1_sum = 0.0;
    for &class in &classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fnn = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            let truth = (t - class).abs() < 0.5;
            let guess = (p - class).abs() < 0.5;
            match (truth, guess) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fnn += 1,
                (false, false) => {}
            }
        }
        let denom = 2 * tp + fp + fnn;
        if denom > 0 {
            f1_sum += 2.0 * tp as f64 / denom as f64;
        }
    }
    f1_sum / classes.len() as f64
}

fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|&t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        // Constant target: perfect iff the residuals vanish.
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

fn neg_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let sse: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (t - p).powi(2))
        .sum();
    -(sse / n)
}
