use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::kernel::SelectionError;

const GS_MAX_SWEEPS: usize = 200;
const GS_TOLERANCE: f64 = 1e-12;

/// Fitted model able to predict targets for a feature matrix.
pub trait Predictor: Send + Sync {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64>;
}

/// Supervised learning capability: fit on a training slice, hand back a
/// predictor for the held-out slice.
pub trait Learner: Send + Sync {
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn Predictor>, SelectionError>;

    /// Identifier used in logs and reports.
    fn name(&self) -> &'static str;
}

/// Nearest-centroid classifier: one mean vector per class, prediction is the
/// label of the closest centroid in Euclidean distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestCentroid;

struct CentroidModel {
    classes: Vec<f64>,
    centroids: Array2<f64>,
}

impl Learner for NearestCentroid {
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn Predictor>, SelectionError> {
        if x.nrows() == 0 {
            return Err(SelectionError::LearnerFailure {
                learner: self.name(),
                reason: "no training rows".to_string(),
            });
        }

        let mut classes: Vec<f64> = Vec::new();
        for &label in y.iter() {
            if !classes.iter().any(|&c| c == label) {
                classes.push(label);
            }
        }
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut centroids = Array2::<f64>::zeros((classes.len(), x.ncols()));
        for (slot, &class) in classes.iter().enumerate() {
            let mut count = 0usize;
            for (i, &label) in y.iter().enumerate() {
                if label == class {
                    let mut centroid = centroids.row_mut(slot);
                    centroid += &x.row(i);
                    count += 1;
                }
            }
            let mut centroid = centroids.row_mut(slot);
            centroid /= count as f64;
        }

        Ok(Box::new(CentroidModel { classes, centroids }))
    }

    fn name(&self) -> &'static str {
        "nearest-centroid"
    }
}

impl Predictor for CentroidModel {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        Array1::from_shape_fn(x.nrows(), |i| {
            let row = x.row(i);
            let mut best_class = self.classes[0];
            let mut best_dist = f64::INFINITY;
            for (slot, &class) in self.classes.iter().enumerate() {
                let centroid = self.centroids.row(slot);
                let dist: f64 = row
                    .iter()
                    .zip(centroid.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if dist < best_dist {
                    best_dist = dist;
                    best_class = class;
                }
            }
            best_class
        })
    }
}

/// Ridge regression on the normal equations with an implicit intercept
/// column.
///
/// The penalized Gram matrix is symmetric positive definite, so plain
/// Gauss-Seidel sweeps converge; subset widths stay small enough that no
/// factorization is warranted.
#[derive(Debug, Clone, Copy)]
pub struct RidgeRegression {
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

struct RidgeModel {
    weights: Array1<f64>,
}

impl Learner for RidgeRegression {
    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Box<dyn Predictor>, SelectionError> {
        if x.nrows() == 0 {
            return Err(SelectionError::LearnerFailure {
                learner: self.name(),
                reason: "no training rows".to_string(),
            });
        }
        if !(self.alpha > 0.0) {
            return Err(SelectionError::LearnerFailure {
                learner: self.name(),
                reason: format!("ridge penalty must be positive, got {}", self.alpha),
            });
        }

        let d = x.ncols();
        let augmented = Array2::from_shape_fn((x.nrows(), d + 1), |(i, j)| {
            if j < d {
                x[(i, j)]
            } else {
                1.0
            }
        });
        let mut gram = augmented.t().dot(&augmented);
        for i in 0..=d {
            gram[(i, i)] += self.alpha;
        }
        let rhs = augmented.t().dot(&y);

        let mut weights = Array1::<f64>::zeros(d + 1);
        for _ in 0..GS_MAX_SWEEPS {
            let mut max_delta = 0.0f64;
            for i in 0..weights.len() {
                let mut acc = rhs[i];
                for j in 0..weights.len() {
                    if j != i {
                        acc -= gram[(i, j)] * weights[j];
                    }
                }
                let updated = acc / gram[(i, i)];
                max_delta = max_delta.max((updated - weights[i]).abs());
                weights[i] = updated;
            }
            if max_delta < GS_TOLERANCE {
                break;
            }
        }

        Ok(Box::new(RidgeModel { weights }))
    }

    fn name(&self) -> &'static str {
        "ridge-regression"
    }
}

impl Predictor for RidgeModel {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        let d = x.ncols();
        debug_assert_eq!(d + 1, self.weights.len());
        Array1::from_shape_fn(x.nrows(), |i| {
            let mut acc = self.weights[d];
            for j in 0..d {
                acc += x[(i, j)] * self.weights[j];
            }
            acc
        })
    }
}
