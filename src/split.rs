use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One train/validation partition of the observation indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValidSplit {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Fold-partitioning capability: a finite, restartable source of
/// train/validation index pairs over `y.len()` observations.
///
/// Every call to [`Splitter::split`] starts a fresh pass. Implementations are
/// deterministic for a fixed construction seed, so gradient probes and final
/// evaluations can replay identical partitions.
pub trait Splitter: Send + Sync {
    /// Number of pairs one full pass yields.
    fn n_splits(&self) -> usize;

    /// Produce one full pass of train/validation pairs.
    fn split(&self, y: ArrayView1<'_, f64>) -> Box<dyn Iterator<Item = TrainValidSplit> + Send>;

    /// Identifier used in logs.
    fn describe(&self) -> String;
}

/// Plain k-fold splitter with optional repeats.
///
/// Observations are cut into `n_splits` contiguous blocks; the first
/// `n % n_splits` folds absorb the remainder. A single-repeat pass keeps the
/// natural row order, while every repeat of a multi-repeat pass works on a
/// fresh seeded permutation so repeated passes see different partitions.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    n_repeats: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, n_repeats: usize, seed: u64) -> Self {
        Self {
            n_splits,
            n_repeats: n_repeats.max(1),
            seed,
        }
    }
}

impl Splitter for KFold {
    fn n_splits(&self) -> usize {
        self.n_splits * self.n_repeats
    }

    fn split(&self, y: ArrayView1<'_, f64>) -> Box<dyn Iterator<Item = TrainValidSplit> + Send> {
        let n = y.len();
        let mut out = Vec::with_capacity(self.n_splits * self.n_repeats);
        for repeat in 0..self.n_repeats {
            let order = repeat_order(n, self.n_repeats, self.seed, repeat);
            out.extend(contiguous_folds(&order, self.n_splits));
        }
        Box::new(out.into_iter())
    }

    fn describe(&self) -> String {
        if self.n_repeats > 1 {
            format!(
                "kfold(n_splits={}, n_repeats={})",
                self.n_splits, self.n_repeats
            )
        } else {
            format!("kfold(n_splits={})", self.n_splits)
        }
    }
}

/// Label-preserving k-fold splitter with optional repeats.
///
/// Each class's members are spread over the folds in the same
/// remainder-first fashion as [`KFold`], so every fold keeps close to the
/// global class proportions.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    n_repeats: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, n_repeats: usize, seed: u64) -> Self {
        Self {
            n_splits,
            n_repeats: n_repeats.max(1),
            seed,
        }
    }
}

impl Splitter for StratifiedKFold {
    fn n_splits(&self) -> usize {
        self.n_splits * self.n_repeats
    }

    fn split(&self, y: ArrayView1<'_, f64>) -> Box<dyn Iterator<Item = TrainValidSplit> + Send> {
        let n = y.len();
        let k = self.n_splits;
        let mut out = Vec::with_capacity(k * self.n_repeats);
        for repeat in 0..self.n_repeats {
            let order = repeat_order(n, self.n_repeats, self.seed, repeat);

            // Group member rows by label, classes in order of first appearance.
            let mut classes: Vec<f64> = Vec::new();
            let mut members: Vec<Vec<usize>> = Vec::new();
            for &row in &order {
                let label = y[row];
                match classes.iter().position(|&c| c == label) {
                    Some(slot) => members[slot].push(row),
                    None => {
                        classes.push(label);
                        members.push(vec![row]);
                    }
                }
            }

            let mut fold_valid: Vec<Vec<usize>> = vec![Vec::new(); k];
            for member in &members {
                let base = member.len() / k;
                let extra = member.len() % k;
                let mut start = 0;
                for (fold, valid) in fold_valid.iter_mut().enumerate() {
                    let size = base + usize::from(fold < extra);
                    valid.extend_from_slice(&member[start..start + size]);
                    start += size;
                }
            }

            for mut valid in fold_valid {
                valid.sort_unstable();
                let mut is_valid = vec![false; n];
                for &row in &valid {
                    is_valid[row] = true;
                }
                let train: Vec<usize> = (0..n).filter(|&row| !is_valid[row]).collect();
                out.push(TrainValidSplit { train, valid });
            }
        }
        Box::new(out.into_iter())
    }

    fn describe(&self) -> String {
        if self.n_repeats > 1 {
            format!(
                "stratified_kfold(n_splits={}, n_repeats={})",
                self.n_splits, self.n_repeats
            )
        } else {
            format!("stratified_kfold(n_splits={})", self.n_splits)
        }
    }
}

/// Build the gradient-probe and final-evaluation splitters from one run
/// configuration. Repeat counts above one select the repeated variants.
pub fn build_splitters(
    cv_folds: usize,
    cv_reps_grad: usize,
    cv_reps_eval: usize,
    stratified: bool,
    seed: u64,
) -> (Box<dyn Splitter>, Box<dyn Splitter>) {
    let grad_seed = seed.wrapping_add(1);
    let eval_seed = seed.wrapping_add(2);
    if stratified {
        (
            Box::new(StratifiedKFold::new(cv_folds, cv_reps_grad, grad_seed)),
            Box::new(StratifiedKFold::new(cv_folds, cv_reps_eval, eval_seed)),
        )
    } else {
        (
            Box::new(KFold::new(cv_folds, cv_reps_grad, grad_seed)),
            Box::new(KFold::new(cv_folds, cv_reps_eval, eval_seed)),
        )
    }
}

fn repeat_order(n: usize, n_repeats: usize, seed: u64, repeat: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    if n_repeats > 1 {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(repeat as u64));
        order.shuffle(&mut rng);
    }
    order
}

fn contiguous_folds(order: &[usize], k: usize) -> Vec<TrainValidSplit> {
    let n = order.len();
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let valid = order[start..end].to_vec();
        let train: Vec<usize> = order[..start]
            .iter()
            .chain(order[end..].iter())
            .copied()
            .collect();
        folds.push(TrainValidSplit { train, valid });
        start = end;
    }
    folds
}
