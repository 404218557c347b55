use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::Dataset;
use crate::evaluate::{CrossValEvaluator, SubsetEvaluator};
use crate::kernel::{SelectionError, SpsaKernel, SpsaOptions};
use crate::learn::Learner;
use crate::progress::{LogSink, ProgressSink};
use crate::report::SelectionReport;
use crate::score::Scoring;

/// High-level driver: owns the dataset, validates the configuration against
/// it, shuffles the observations once, runs the kernel and assembles the
/// report.
pub struct SpsaSelector<L: Learner> {
    data: Dataset,
    learner: L,
    scoring: Scoring,
}

impl<L: Learner> SpsaSelector<L> {
    pub fn new(data: Dataset, learner: L, scoring: Scoring) -> Self {
        Self {
            data,
            learner,
            scoring,
        }
    }

    /// Run one selection with the default log-facade progress sink.
    pub fn run(self, opts: SpsaOptions) -> Result<SelectionReport, SelectionError> {
        self.run_with_sink(opts, Box::new(LogSink))
    }

    /// Run one selection reporting progress to `sink`.
    pub fn run_with_sink(
        self,
        mut opts: SpsaOptions,
        sink: Box<dyn ProgressSink>,
    ) -> Result<SelectionReport, SelectionError> {
        let Self {
            mut data,
            learner,
            scoring,
        } = self;

        if opts.cv_folds > data.num_rows() {
            return Err(SelectionError::FoldsExceedRows {
                folds: opts.cv_folds,
                rows: data.num_rows(),
            });
        }

        // Pin the seed so the shuffle, the sign draws and the splitters all
        // derive from one reproducible value.
        let seed = opts.seed.unwrap_or_else(|| StdRng::from_entropy().gen());
        opts.seed = Some(seed);

        log::info!("[SPSA] learner: {}", learner.name());
        log::info!("[SPSA] scoring metric: {}", scoring.name());
        log::info!("[SPSA] number of observations: {}", data.num_rows());
        log::info!(
            "[SPSA] number of features available: {}",
            data.num_features()
        );
        log::info!(
            "[SPSA] number of features to select: {}",
            opts.num_features
        );

        let mut shuffle_rng = StdRng::seed_from_u64(seed.wrapping_add(3));
        data.shuffle_rows(&mut shuffle_rng);

        let evaluator = CrossValEvaluator::new(&data, learner, scoring, opts.n_jobs);
        let mut kernel =
            SpsaKernel::new(data.num_features(), opts, &evaluator)?.with_progress_sink(sink);
        kernel.run()?;
        let outcome = kernel.into_outcome();

        Ok(SelectionReport::assemble(
            evaluator.learner_name(),
            evaluator.scoring_name(),
            &data,
            outcome,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::NearestCentroid;
    use ndarray::{Array1, Array2};

    #[test]
    fn run_rejects_fold_counts_beyond_the_row_count() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0]);
        let data = Dataset::new(x, y).expect("valid data");
        let selector = SpsaSelector::new(data, NearestCentroid, Scoring::Accuracy);

        let opts = SpsaOptions {
            cv_folds: 5,
            seed: Some(1),
            ..SpsaOptions::default()
        };
        let err = selector.run(opts).expect_err("folds exceed rows");
        assert!(matches!(
            err,
            SelectionError::FoldsExceedRows { folds: 5, rows: 4 }
        ));
    }
}
