use ndarray::{array, Array1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spfsr::{
    clamp_change, select_feature_indices, GainKind, GainSchedule, IterationUpdate, ProgressSink,
    SelectionError, SpsaKernel, SpsaOptions, Splitter, SubsetEvaluator, SubsetScore, CHANGE_MAX,
    GAIN_MAX, GAIN_MIN,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Deterministic pseudo-objective: a bounded hash of the subset, so the
/// kernel sees varied but perfectly reproducible scores without any data.
struct HashedEvaluator;

impl SubsetEvaluator for HashedEvaluator {
    fn evaluate(
        &self,
        subset: &[usize],
        _splitter: &dyn Splitter,
    ) -> Result<SubsetScore, SelectionError> {
        let mut acc = 0.37f64;
        for &idx in subset {
            acc = (acc * 31.0 + idx as f64 * 0.113).sin().abs();
        }
        Ok(SubsetScore {
            mean: acc,
            std: 0.01,
        })
    }

    fn learner_name(&self) -> String {
        "hashed".to_string()
    }

    fn scoring_name(&self) -> String {
        "hashed".to_string()
    }
}

/// Records the best value visible at every progress update.
struct BestTrace(Rc<RefCell<Vec<f64>>>);

impl ProgressSink for BestTrace {
    fn on_iteration(&mut self, update: &IterationUpdate<'_>) {
        if let Some(best) = update.best {
            self.0.borrow_mut().push(best.value);
        }
    }
}

fn random_vector(rng: &mut StdRng, len: usize, scale: f64) -> Array1<f64> {
    Array1::from_shape_fn(len, |_| rng.gen_range(-scale..scale))
}

#[test]
fn clamp_never_exceeds_the_change_band() {
    let mut rng = StdRng::seed_from_u64(600);
    for _ in 0..200 {
        let raw = random_vector(&mut rng, 6, 5.0);
        let clamped = clamp_change(&raw);
        for (&v, &out) in raw.iter().zip(clamped.iter()) {
            assert!(out.abs() <= CHANGE_MAX + 1e-15);
            let expected = v.abs().min(CHANGE_MAX);
            assert!((out.abs() - expected).abs() < 1e-15);
            if v > 0.0 {
                assert!(out >= 0.0);
            } else {
                assert!(out <= 0.0);
            }
        }
    }
}

#[test]
fn selection_width_follows_the_mode_arithmetic() {
    let mut rng = StdRng::seed_from_u64(601);
    for &p in &[1usize, 2, 7, 20] {
        let keeps: Vec<Option<Vec<usize>>> = vec![None, Some(vec![0, p / 2])];
        for keep in &keeps {
            for &num_features in &[0usize, 3] {
                for _ in 0..50 {
                    let imp = random_vector(&mut rng, p, 1.0);
                    let selected = select_feature_indices(&imp, keep.as_deref(), num_features);

                    let mut is_keep = vec![false; p];
                    if let Some(keep) = keep {
                        for &idx in keep {
                            is_keep[idx] = true;
                        }
                    }
                    let keep_count = is_keep.iter().filter(|&&k| k).count();
                    let expected = if num_features == 0 {
                        (0..p)
                            .filter(|&i| is_keep[i] || imp[i] >= 0.0)
                            .count()
                            .max(1)
                    } else {
                        p.min(keep_count + num_features)
                    };
                    assert_eq!(selected.len(), expected);

                    let mut unique = selected.clone();
                    unique.sort_unstable();
                    unique.dedup();
                    assert_eq!(unique.len(), selected.len());
                    assert!(selected.iter().all(|&idx| idx < p));
                    assert!((0..p).filter(|&i| is_keep[i]).all(|i| selected.contains(&i)));
                }
            }
        }
    }
}

#[test]
fn ranked_selection_orders_by_descending_pinned_importance() {
    let mut rng = StdRng::seed_from_u64(602);
    for _ in 0..100 {
        let p = 12;
        let imp = random_vector(&mut rng, p, 1.0);
        let keep = vec![3usize, 8];
        let selected = select_feature_indices(&imp, Some(&keep), 0);

        let mut pinned = imp.clone();
        for &idx in &keep {
            pinned[idx] = 1.0;
        }
        for pair in selected.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(pinned[a] > pinned[b] || (pinned[a] == pinned[b] && a < b));
        }
    }
}

#[test]
fn live_run_keeps_every_gain_inside_the_band() {
    let evaluator = HashedEvaluator;
    let opts = SpsaOptions {
        num_features: 4,
        iter_max: 40,
        stall_limit: 5,
        num_grad_avg: 2,
        print_freq: 0,
        seed: Some(31),
        ..SpsaOptions::default()
    };
    let mut kernel = SpsaKernel::new(12, opts, &evaluator).expect("kernel");
    kernel.run().expect("run");

    let history = kernel.history();
    assert_eq!(history.len(), 41);
    for record in history {
        assert!(record.raw_gain >= GAIN_MIN - 1e-12);
        assert!(record.raw_gain <= GAIN_MAX + 1e-12);
        assert!(record.smoothed_gain >= GAIN_MIN - 1e-12);
        assert!(record.smoothed_gain <= GAIN_MAX + 1e-12);
        assert_eq!(record.selected_indices.len(), 4);
        assert!(record.selected_indices.iter().all(|&idx| idx < 12));
        let mut unique = record.selected_indices.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert_eq!(record.importance.len(), 12);
    }
}

#[test]
fn best_value_never_worsens_over_a_run() {
    let evaluator = HashedEvaluator;
    let trace = Rc::new(RefCell::new(Vec::new()));
    let opts = SpsaOptions {
        num_features: 3,
        iter_max: 30,
        stall_limit: 4,
        num_grad_avg: 1,
        print_freq: 1,
        seed: Some(44),
        ..SpsaOptions::default()
    };
    let mut kernel = SpsaKernel::new(10, opts, &evaluator)
        .expect("kernel")
        .with_progress_sink(Box::new(BestTrace(Rc::clone(&trace))));
    kernel.run().expect("run");

    let trace = trace.borrow();
    assert_eq!(trace.len(), 31);
    assert!(trace.iter().all(|v| v.is_finite()));
    for pair in trace.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
}

#[test]
fn same_seed_kernels_replay_identical_histories() {
    let opts = SpsaOptions {
        num_features: 4,
        iter_max: 20,
        stall_limit: 5,
        print_freq: 0,
        seed: Some(909),
        ..SpsaOptions::default()
    };

    let first_eval = HashedEvaluator;
    let mut first = SpsaKernel::new(9, opts.clone(), &first_eval).expect("kernel");
    first.run().expect("run");

    let second_eval = HashedEvaluator;
    let mut second = SpsaKernel::new(9, opts, &second_eval).expect("kernel");
    second.run().expect("run");

    assert_eq!(first.history(), second.history());
    assert_eq!(first.best(), second.best());
}

#[test]
fn smoothing_window_averages_the_raw_history() {
    let mut schedule = GainSchedule::new(GainKind::Bb, 3, 0.75, 100.0, 0.6);
    let imp_diff = array![0.3, -0.4];
    let curvatures = [1.25, 2.0, 4.0, 1.6, 3.2, 2.5, 5.0, 1.1];

    let mut raws = Vec::new();
    let first = schedule.next(0, &array![0.0, 0.0], &array![0.0, 0.0]);
    raws.push(first.raw);
    assert!((first.raw - GAIN_MIN).abs() < 1e-15);

    for (i, &c) in curvatures.iter().enumerate() {
        let iteration = i + 1;
        let ghat_diff = imp_diff.mapv(|v| -c * v);
        let step = schedule.next(iteration, &imp_diff, &ghat_diff);
        raws.push(step.raw);

        // Negated curvature c turns the quotient into exactly 1/c.
        assert!((step.raw - 1.0 / c).abs() < 1e-12);
        if iteration < 3 {
            assert!((step.smoothed - step.raw).abs() < 1e-15);
        } else {
            let window = &raws[raws.len() - 3..];
            let mean = window.iter().sum::<f64>() / 3.0;
            assert!((step.smoothed - mean).abs() < 1e-12);
        }
    }
}

#[test]
fn monotone_schedule_ignores_curvature_and_never_smooths() {
    let mut schedule = GainSchedule::new(GainKind::Monotone, 5, 0.5, 10.0, 0.49);
    for iteration in 0..7 {
        let step = schedule.next(iteration, &array![9.9], &array![9.9]);
        let expected = 0.5 / (iteration as f64 + 10.0).powf(0.49);
        assert!((step.raw - expected).abs() < 1e-15);
        assert!((step.smoothed - step.raw).abs() < 1e-15);
    }
}
