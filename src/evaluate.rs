use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::data::Dataset;
use crate::kernel::SelectionError;
use crate::learn::Learner;
use crate::score::Scoring;
use crate::split::{Splitter, TrainValidSplit};
use crate::types::SubsetScore;

/// Evaluation capability consumed by the search kernel: cross-validated mean
/// and spread of the objective for one candidate feature subset.
///
/// Implementations must be deterministic given the splitter's partitions, and
/// must follow the higher-is-better convention.
pub trait SubsetEvaluator {
    fn evaluate(
        &self,
        subset: &[usize],
        splitter: &dyn Splitter,
    ) -> Result<SubsetScore, SelectionError>;

    /// Learner identifier for reports.
    fn learner_name(&self) -> String;

    /// Scoring identifier for reports.
    fn scoring_name(&self) -> String;
}

/// Reference evaluator: restrict the dataset to the candidate columns, fit
/// the learner per fold, score the held-out slice.
///
/// `n_jobs` is a thread hint: 1 runs the folds sequentially, 0 uses every
/// available core, any other value sizes a dedicated pool.
pub struct CrossValEvaluator<'d, L: Learner> {
    data: &'d Dataset,
    learner: L,
    scoring: Scoring,
    n_jobs: usize,
}

impl<'d, L: Learner> CrossValEvaluator<'d, L> {
    pub fn new(data: &'d Dataset, learner: L, scoring: Scoring, n_jobs: usize) -> Self {
        Self {
            data,
            learner,
            scoring,
            n_jobs,
        }
    }

    fn score_split(
        &self,
        x_sub: &Array2<f64>,
        split: &TrainValidSplit,
    ) -> Result<f64, SelectionError> {
        let x_train = x_sub.select(Axis(0), &split.train);
        let y_train = self.data.labels().select(Axis(0), &split.train);
        let x_valid = x_sub.select(Axis(0), &split.valid);
        let y_valid = self.data.labels().select(Axis(0), &split.valid);

        let model = self.learner.fit(x_train.view(), y_train.view())?;
        let pred = model.predict(x_valid.view());
        Ok(self.scoring.score(&y_valid.to_vec(), &pred.to_vec()))
    }
}

impl<L: Learner> SubsetEvaluator for CrossValEvaluator<'_, L> {
    fn evaluate(
        &self,
        subset: &[usize],
        splitter: &dyn Splitter,
    ) -> Result<SubsetScore, SelectionError> {
        let x_sub = self.data.select_columns(subset);
        let splits: Vec<TrainValidSplit> = splitter
            .split(self.data.labels().view())
            .filter(|s| !s.train.is_empty() && !s.valid.is_empty())
            .collect();
        if splits.is_empty() {
            return Err(SelectionError::Evaluation(
                format!(
                    "splitter {} produced no usable folds over {} rows",
                    splitter.describe(),
                    self.data.num_rows()
                )
                .into(),
            ));
        }

        let scores: Vec<f64> = if self.n_jobs == 1 {
            splits
                .iter()
                .map(|split| self.score_split(&x_sub, split))
                .collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.n_jobs)
                .build()
                .map_err(|e| SelectionError::Evaluation(Box::new(e)))?;
            pool.install(|| {
                splits
                    .par_iter()
                    .map(|split| self.score_split(&x_sub, split))
                    .collect::<Result<_, _>>()
            })?
        };

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Ok(SubsetScore {
            mean,
            std: var.sqrt(),
        })
    }

    fn learner_name(&self) -> String {
        self.learner.name().to_string()
    }

    fn scoring_name(&self) -> String {
        self.scoring.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::NearestCentroid;
    use crate::split::StratifiedKFold;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    fn separable_dataset(n_per_class: usize) -> Dataset {
        // Class signal lives in column 0; column 1 is a constant distractor.
        let n = 2 * n_per_class;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 && i >= n_per_class {
                10.0
            } else {
                0.0
            }
        });
        let y = Array1::from_shape_fn(n, |i| if i >= n_per_class { 1.0 } else { 0.0 });
        Dataset::new(x, y).expect("valid data")
    }

    #[test]
    fn perfectly_separable_data_scores_one_with_no_spread() {
        let data = separable_dataset(10);
        let evaluator = CrossValEvaluator::new(&data, NearestCentroid, Scoring::Accuracy, 1);
        let splitter = StratifiedKFold::new(5, 1, 0);

        let score = evaluator.evaluate(&[0], &splitter).expect("evaluation");
        assert_abs_diff_eq!(score.mean, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(score.std, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn distractor_only_subset_scores_at_chance() {
        let data = separable_dataset(10);
        let evaluator = CrossValEvaluator::new(&data, NearestCentroid, Scoring::Accuracy, 1);
        let splitter = StratifiedKFold::new(5, 1, 0);

        let full = evaluator.evaluate(&[0, 1], &splitter).expect("evaluation");
        let junk = evaluator.evaluate(&[1], &splitter).expect("evaluation");
        assert_abs_diff_eq!(full.mean, 1.0, epsilon = 1e-12);
        assert!(junk.mean <= full.mean);
    }

    #[test]
    fn parallel_and_sequential_scores_agree() {
        let data = separable_dataset(8);
        let sequential = CrossValEvaluator::new(&data, NearestCentroid, Scoring::Accuracy, 1);
        let parallel = CrossValEvaluator::new(&data, NearestCentroid, Scoring::Accuracy, 2);
        let splitter = StratifiedKFold::new(4, 2, 9);

        let a = sequential.evaluate(&[0, 1], &splitter).expect("sequential");
        let b = parallel.evaluate(&[0, 1], &splitter).expect("parallel");
        assert_abs_diff_eq!(a.mean, b.mean, epsilon = 1e-12);
        assert_abs_diff_eq!(a.std, b.std, epsilon = 1e-12);
    }

    #[test]
    fn reports_learner_and_scoring_names() {
        let data = separable_dataset(4);
        let evaluator = CrossValEvaluator::new(&data, NearestCentroid, Scoring::F1Macro, 1);
        assert_eq!(evaluator.learner_name(), "nearest-centroid");
        assert_eq!(evaluator.scoring_name(), "f1_macro");
    }
}
