use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;
use thiserror::Error;

use crate::evaluate::SubsetEvaluator;
use crate::gain::GainSchedule;
use crate::progress::{IterationUpdate, LogSink, ProgressSink, RestartReason, RunSummary};
use crate::split::{build_splitters, Splitter};
use crate::types::{GainKind, SubsetScore};

/// Perturbation half-width applied with each antithetic sign draw.
pub const PERTURB_AMOUNT: f64 = 0.05;
/// Bounds on the per-iteration gain.
pub const GAIN_MIN: f64 = 0.01;
pub const GAIN_MAX: f64 = 1.0;
/// Bounds on the magnitude of one importance update component.
pub const CHANGE_MIN: f64 = 0.0;
pub const CHANGE_MAX: f64 = 0.2;
/// Minimum objective improvement that counts as progress.
pub const STALL_TOLERANCE: f64 = 1e-5;
/// Floor under the negated Barzilai-Borwein denominator.
pub const BB_BOTTOM_THRESHOLD: f64 = 1e-5;
/// Decimal places kept in recorded traces; objective evaluations keep two
/// fewer at the point of comparison.
pub const DISPLAY_DECIMALS: i32 = 5;

/// Everything that can go wrong while configuring or running a selection.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown gain type '{0}'; expected \"bb\" or \"mon\"")]
    UnknownGainType(String),

    #[error("input data is empty: {rows} rows x {cols} feature columns")]
    EmptyData { rows: usize, cols: usize },

    #[error("feature matrix has {x_rows} rows but the label vector has {y_len}")]
    RowCountMismatch { x_rows: usize, y_len: usize },

    #[error("warm-start importance has length {got} but the data has {expected} features")]
    WarmStartLengthMismatch { got: usize, expected: usize },

    #[error("forced-keep index {index} is out of range for {num_features} features")]
    KeepIndexOutOfRange { index: usize, num_features: usize },

    #[error("cross-validation needs at least 2 folds, got {0}")]
    TooFewFolds(usize),

    #[error("{folds} folds cannot partition {rows} observations")]
    FoldsExceedRows { folds: usize, rows: usize },

    #[error("learner '{learner}' failed to fit: {reason}")]
    LearnerFailure {
        learner: &'static str,
        reason: String,
    },

    #[error("subset evaluation failed: {0}")]
    Evaluation(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Construction parameters for one selection run.
///
/// The defaults reproduce the reference configuration of the method;
/// `seed: None` draws fresh entropy so repeated runs differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpsaOptions {
    pub gain_type: GainKind,
    /// Feature indices that must appear in every selected set.
    pub features_to_keep: Option<Vec<usize>>,
    /// Final iteration number; the loop runs `iter_max + 1` iterations.
    pub iter_max: usize,
    /// Non-improving iterations tolerated before reinitialization. Also
    /// bounds the duplicate-selection retries within one iteration.
    pub stall_limit: usize,
    /// Antithetic gradient probes averaged per iteration.
    pub num_grad_avg: usize,
    /// Lookback window over raw Barzilai-Borwein gains.
    pub num_gain_smoothing: usize,
    pub stratified_cv: bool,
    pub cv_reps_grad: usize,
    pub cv_reps_eval: usize,
    pub cv_folds: usize,
    /// Fold-parallelism hint for the evaluator: 1 sequential, 0 all cores.
    pub n_jobs: usize,
    /// Number of features to select on top of the keep set; 0 means
    /// automatic sizing from the sign of the importances.
    pub num_features: usize,
    /// Warm-start importance vector; zeros when absent.
    pub starting_imps: Option<Vec<f64>>,
    /// Progress is reported every `print_freq` iterations; 0 silences it.
    pub print_freq: usize,
    /// `a` constant of the monotone decay `a / (iter + A)^alpha`.
    pub mon_gain_scale: f64,
    /// `A` constant of the monotone decay.
    pub mon_gain_offset: f64,
    /// `alpha` constant of the monotone decay.
    pub mon_gain_alpha: f64,
    pub seed: Option<u64>,
}

impl Default for SpsaOptions {
    fn default() -> Self {
        Self {
            gain_type: GainKind::Bb,
            features_to_keep: None,
            iter_max: 300,
            stall_limit: 100,
            num_grad_avg: 4,
            num_gain_smoothing: 1,
            stratified_cv: true,
            cv_reps_grad: 1,
            cv_reps_eval: 2,
            cv_folds: 5,
            n_jobs: 1,
            num_features: 0,
            starting_imps: None,
            print_freq: 5,
            mon_gain_scale: 0.75,
            mon_gain_offset: 100.0,
            mon_gain_alpha: 0.6,
            seed: None,
        }
    }
}

/// One completed iteration of the search loop, quantized for the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub objective_mean: f64,
    pub objective_std: f64,
    pub raw_gain: f64,
    pub smoothed_gain: f64,
    pub importance: Array1<f64>,
    pub selected_indices: Vec<usize>,
}

/// Best solution observed so far. Survives every reinitialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSolution {
    pub iteration: usize,
    pub value: f64,
    pub std: f64,
    /// Selected indices ranked by descending importance.
    pub features: Vec<usize>,
    /// Unquantized importances aligned with `features`.
    pub importances: Array1<f64>,
}

/// Owned pieces of a finished run, handed to the report builder.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub history: Vec<IterationRecord>,
    pub best: Option<BestSolution>,
    pub run_time_minutes: f64,
}

/// Map a continuous importance vector to the ranked selected set.
///
/// Forced-keep indices are pinned to an importance of 1.0 before ranking and
/// are always members of the result. In automatic mode (`num_features == 0`)
/// the set size is the number of non-negative pinned entries, floored at one;
/// otherwise it is `min(p, keep_count + num_features)`. The result is ordered
/// by descending pinned importance, ties by ascending index.
pub fn select_feature_indices(
    importance: &Array1<f64>,
    features_to_keep: Option<&[usize]>,
    num_features: usize,
) -> Vec<usize> {
    let p = importance.len();
    let mut pinned = importance.clone();
    let mut is_keep = vec![false; p];
    if let Some(keep) = features_to_keep {
        for &idx in keep {
            pinned[idx] = 1.0;
            is_keep[idx] = true;
        }
    }
    let keep_count = is_keep.iter().filter(|&&k| k).count();

    let num_to_select = if num_features == 0 {
        pinned.iter().filter(|&&v| v >= 0.0).count().max(1)
    } else {
        p.min(keep_count + num_features)
    };

    let mut ranked: Vec<usize> = (0..p).collect();
    ranked.sort_by(|&a, &b| {
        pinned[b]
            .partial_cmp(&pinned[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut selected = Vec::with_capacity(num_to_select);
    let mut open_slots = num_to_select - keep_count;
    for &idx in &ranked {
        if is_keep[idx] {
            selected.push(idx);
        } else if open_slots > 0 {
            selected.push(idx);
            open_slots -= 1;
        }
        if selected.len() == num_to_select {
            break;
        }
    }
    selected
}

/// Clamp each component of a raw update into the permitted magnitude band,
/// preserving its sign.
pub fn clamp_change(raw: &Array1<f64>) -> Array1<f64> {
    raw.mapv(|v| {
        let sign = if v > 0.0 { 1.0 } else { -1.0 };
        sign * v.abs().clamp(CHANGE_MIN, CHANGE_MAX)
    })
}

fn quantize(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// SPSA subset-search kernel.
///
/// Owns every piece of run state exclusively; concurrent searches need
/// independent kernels. The kernel talks to the data only through the
/// injected [`SubsetEvaluator`].
pub struct SpsaKernel<'e> {
    opts: SpsaOptions,
    evaluator: &'e dyn SubsetEvaluator,
    grad_splitter: Box<dyn Splitter>,
    eval_splitter: Box<dyn Splitter>,
    sink: Box<dyn ProgressSink>,
    rng: StdRng,
    p: usize,
    same_count_max: usize,
    starting_imps: Option<Array1<f64>>,
    curr_imp: Array1<f64>,
    curr_imp_prev: Array1<f64>,
    ghat: Array1<f64>,
    gain: GainSchedule,
    stall_counter: usize,
    best: Option<BestSolution>,
    history: Vec<IterationRecord>,
    run_time_minutes: f64,
}

impl<'e> SpsaKernel<'e> {
    pub fn new(
        feature_count: usize,
        opts: SpsaOptions,
        evaluator: &'e dyn SubsetEvaluator,
    ) -> Result<Self, SelectionError> {
        if feature_count == 0 {
            return Err(SelectionError::EmptyData { rows: 0, cols: 0 });
        }
        if opts.cv_folds < 2 {
            return Err(SelectionError::TooFewFolds(opts.cv_folds));
        }
        if let Some(keep) = &opts.features_to_keep {
            for &idx in keep {
                if idx >= feature_count {
                    return Err(SelectionError::KeepIndexOutOfRange {
                        index: idx,
                        num_features: feature_count,
                    });
                }
            }
        }
        let starting_imps = match &opts.starting_imps {
            Some(w) => {
                if w.len() != feature_count {
                    return Err(SelectionError::WarmStartLengthMismatch {
                        got: w.len(),
                        expected: feature_count,
                    });
                }
                Some(Array1::from_vec(w.clone()))
            }
            None => None,
        };

        let seed = opts.seed.unwrap_or_else(|| StdRng::from_entropy().gen());
        let (grad_splitter, eval_splitter) = build_splitters(
            opts.cv_folds,
            opts.cv_reps_grad,
            opts.cv_reps_eval,
            opts.stratified_cv,
            seed,
        );
        log::debug!(
            "[SPSA] gradient splitter: {}, evaluation splitter: {}",
            grad_splitter.describe(),
            eval_splitter.describe()
        );

        let gain = GainSchedule::new(
            opts.gain_type,
            opts.num_gain_smoothing,
            opts.mon_gain_scale,
            opts.mon_gain_offset,
            opts.mon_gain_alpha,
        );

        let mut kernel = Self {
            p: feature_count,
            same_count_max: opts.stall_limit,
            evaluator,
            grad_splitter,
            eval_splitter,
            sink: Box::new(LogSink),
            rng: StdRng::seed_from_u64(seed),
            starting_imps,
            curr_imp: Array1::zeros(feature_count),
            curr_imp_prev: Array1::zeros(feature_count),
            ghat: Array1::zeros(feature_count),
            gain,
            stall_counter: 1,
            best: None,
            history: Vec::with_capacity(opts.iter_max + 1),
            run_time_minutes: 0.0,
            opts,
        };
        kernel.reinitialize();
        Ok(kernel)
    }

    /// Replace the default log-facade sink.
    pub fn with_progress_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn best(&self) -> Option<&BestSolution> {
        self.best.as_ref()
    }

    pub fn run_time_minutes(&self) -> f64 {
        self.run_time_minutes
    }

    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            history: self.history,
            best: self.best,
            run_time_minutes: self.run_time_minutes,
        }
    }

    /// Reset the search state to its starting point. The best solution and
    /// the raw-gain history are deliberately left alone.
    fn reinitialize(&mut self) {
        self.curr_imp = match &self.starting_imps {
            Some(w) => {
                let lo = w.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = w.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                log::info!("[SPSA] starting importance range: ({lo}, {hi})");
                w.clone()
            }
            None => Array1::zeros(self.p),
        };
        self.curr_imp_prev = self.curr_imp.clone();
        self.ghat = Array1::zeros(self.p);
        self.stall_counter = 1;
    }

    fn random_sign_vector(&mut self) -> Array1<f64> {
        let p = self.p;
        let rng = &mut self.rng;
        Array1::from_shape_fn(p, |_| if rng.gen::<f64>() >= 0.5 { 1.0 } else { -1.0 })
    }

    /// Select from `imp`, run the evaluation capability, quantize mean and
    /// spread to the comparison precision.
    fn eval_feature_set(
        &self,
        splitter: &dyn Splitter,
        imp: &Array1<f64>,
    ) -> Result<SubsetScore, SelectionError> {
        let subset = select_feature_indices(
            imp,
            self.opts.features_to_keep.as_deref(),
            self.opts.num_features,
        );
        let score = self.evaluator.evaluate(&subset, splitter)?;
        Ok(SubsetScore {
            mean: quantize(score.mean, DISPLAY_DECIMALS - 2),
            std: quantize(score.std, DISPLAY_DECIMALS - 2),
        })
    }

    /// Average `num_grad_avg` antithetic central-difference probes. An
    /// all-zero estimate keeps the previous direction instead.
    fn estimate_gradient(&mut self) -> Result<(), SelectionError> {
        let repeats = self.opts.num_grad_avg.max(1);
        let mut accum = Array1::<f64>::zeros(self.p);
        for _ in 0..repeats {
            let delta = self.random_sign_vector();
            let probe = delta.mapv(|d| d * PERTURB_AMOUNT);
            let imp_plus = &self.curr_imp + &probe;
            let imp_minus = &self.curr_imp - &probe;

            let y_plus = self.eval_feature_set(&*self.grad_splitter, &imp_plus)?.mean;
            let y_minus = self
                .eval_feature_set(&*self.grad_splitter, &imp_minus)?
                .mean;

            let diff = y_plus - y_minus;
            accum += &delta.mapv(|d| diff / (2.0 * PERTURB_AMOUNT * d));
        }
        let estimate = accum.mapv(|v| v / repeats as f64);
        if estimate.iter().all(|&g| g == 0.0) {
            log::warn!("[SPSA] zero gradient estimate, keeping the previous direction");
            return Ok(());
        }
        self.ghat = estimate;
        Ok(())
    }

    /// Run the search over `iter_max + 1` iterations.
    pub fn run(&mut self) -> Result<(), SelectionError> {
        let started = Instant::now();
        let stall_divisor = self.opts.stall_limit.max(1) as f64;
        let escalation_step = (GAIN_MAX - GAIN_MIN) / stall_divisor;

        for iteration in 0..=self.opts.iter_max {
            let ghat_prev = self.ghat.clone();
            self.estimate_gradient()?;

            let imp_diff = &self.curr_imp - &self.curr_imp_prev;
            let ghat_diff = &self.ghat - &ghat_prev;
            let step = self.gain.next(iteration, &imp_diff, &ghat_diff);
            log::debug!(
                "[SPSA] iteration {iteration}: raw gain {}, smoothed gain {}",
                step.raw,
                step.smoothed
            );

            self.curr_imp_prev = self.curr_imp.clone();
            let raw_change = self.ghat.mapv(|g| g * step.smoothed);
            let change = clamp_change(&raw_change);
            log::debug!("[SPSA] iteration {iteration}: raw change {raw_change}, clamped {change}");
            self.curr_imp += &change;

            let keep = self.opts.features_to_keep.as_deref();
            let selected_prev =
                select_feature_indices(&self.curr_imp_prev, keep, self.opts.num_features);
            let mut selected = select_feature_indices(&self.curr_imp, keep, self.opts.num_features);

            // A selection identical to the previous iteration stalls the
            // search direction. Retry the update from the pre-update state
            // with steadily larger steps until the selection moves or the
            // retry budget runs out.
            let mut same_counter = 0usize;
            let imp_before_retry = self.curr_imp.clone();
            while selected == selected_prev {
                same_counter += 1;
                let escalated = GAIN_MIN + same_counter as f64 * escalation_step;
                let change = clamp_change(&self.ghat.mapv(|g| g * escalated));
                self.curr_imp = &imp_before_retry + &change;
                selected = select_feature_indices(&self.curr_imp, keep, self.opts.num_features);
                if same_counter >= self.same_count_max {
                    break;
                }
            }
            if same_counter > 0 {
                log::debug!(
                    "[SPSA] duplicate-selection retries at iteration {iteration}: {same_counter}"
                );
            }

            let score = self.eval_feature_set(&*self.eval_splitter, &self.curr_imp)?;

            self.history.push(IterationRecord {
                objective_mean: quantize(score.mean, DISPLAY_DECIMALS),
                objective_std: quantize(score.std, DISPLAY_DECIMALS),
                raw_gain: quantize(step.raw, DISPLAY_DECIMALS),
                smoothed_gain: quantize(step.smoothed, DISPLAY_DECIMALS),
                importance: self.curr_imp.mapv(|v| quantize(v, DISPLAY_DECIMALS)),
                selected_indices: selected.clone(),
            });

            let best_so_far = self.best.as_ref().map_or(f64::NEG_INFINITY, |b| b.value);
            if score.mean >= best_so_far + STALL_TOLERANCE {
                self.stall_counter = 1;
                let importances: Array1<f64> =
                    selected.iter().map(|&i| self.curr_imp[i]).collect();
                self.best = Some(BestSolution {
                    iteration,
                    value: score.mean,
                    std: score.std,
                    features: selected.clone(),
                    importances,
                });
            } else {
                self.stall_counter += 1;
            }

            if self.opts.print_freq > 0 && iteration % self.opts.print_freq == 0 {
                let update = IterationUpdate {
                    iteration,
                    num_selected: selected.len(),
                    score,
                    best: self.best.as_ref(),
                };
                self.sink.on_iteration(&update);
            }

            if self.stall_counter > self.opts.stall_limit {
                self.sink.on_restart(RestartReason::ObjectiveStall, iteration);
                self.reinitialize();
            }
            if same_counter >= self.same_count_max {
                self.sink
                    .on_restart(RestartReason::DuplicateSelection, iteration);
                self.reinitialize();
            }
        }

        self.run_time_minutes = quantize(started.elapsed().as_secs_f64() / 60.0, 2);
        let summary = RunSummary {
            best: self.best.as_ref(),
            total_iterations: self.history.len(),
            run_time_minutes: self.run_time_minutes,
        };
        self.sink.on_complete(&summary);
        Ok(())
    }
}
