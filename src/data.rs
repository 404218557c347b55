use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::kernel::SelectionError;

/// Labeled dataset consumed by subset evaluation.
///
/// Rows are observations, columns are candidate features. Shapes are checked
/// once at construction so every later column restriction can assume a
/// consistent matrix.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Dataset {
    /// Build a dataset, rejecting empty or inconsistent inputs.
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self, SelectionError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(SelectionError::EmptyData {
                rows: x.nrows(),
                cols: x.ncols(),
            });
        }
        if x.nrows() != y.len() {
            return Err(SelectionError::RowCountMismatch {
                x_rows: x.nrows(),
                y_len: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn num_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.y
    }

    /// Rearrange observations in place with a random permutation, keeping
    /// every feature row paired with its label.
    pub fn shuffle_rows(&mut self, rng: &mut StdRng) {
        let mut order: Vec<usize> = (0..self.x.nrows()).collect();
        order.shuffle(rng);
        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Copy of the feature matrix restricted to `columns`, in request order.
    pub fn select_columns(&self, columns: &[usize]) -> Array2<f64> {
        self.x.select(Axis(1), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_matrix() {
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array1::<f64>::zeros(0);
        let err = Dataset::new(x, y).expect_err("empty data must be rejected");
        assert!(matches!(err, SelectionError::EmptyData { .. }));
    }

    #[test]
    fn rejects_row_count_mismatch() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array1::<f64>::zeros(3);
        let err = Dataset::new(x, y).expect_err("mismatched rows must be rejected");
        assert!(matches!(
            err,
            SelectionError::RowCountMismatch { x_rows: 4, y_len: 3 }
        ));
    }

    #[test]
    fn shuffle_keeps_rows_paired_with_labels() {
        // Column 0 duplicates the label, so pairing survives any permutation.
        let n = 12;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                (i * 3 + j) as f64
            }
        });
        let y = Array1::from_shape_fn(n, |i| i as f64);
        let mut data = Dataset::new(x, y).expect("valid data");

        let mut rng = StdRng::seed_from_u64(7);
        data.shuffle_rows(&mut rng);

        for i in 0..n {
            assert_eq!(data.features()[(i, 0)], data.labels()[i]);
        }
        let mut seen: Vec<usize> = data.labels().iter().map(|&v| v as usize).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn select_columns_respects_request_order() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let y = array![0.0, 1.0];
        let data = Dataset::new(x, y).expect("valid data");

        let picked = data.select_columns(&[2, 0]);
        assert_eq!(picked, array![[3.0, 1.0], [6.0, 4.0]]);
    }
}
