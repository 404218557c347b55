use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spfsr::{Dataset, GainKind, NearestCentroid, Scoring, SpsaOptions, SpsaSelector};

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn parse_usize_arg(args: &[String], flag: &str, default: usize) -> usize {
    match parse_string_arg(args, flag) {
        Some(raw) => raw
            .parse::<usize>()
            .unwrap_or_else(|e| panic!("invalid {flag} value '{raw}': {e}")),
        None => default,
    }
}

fn parse_u64_arg(args: &[String], flag: &str, default: u64) -> u64 {
    match parse_string_arg(args, flag) {
        Some(raw) => raw
            .parse::<u64>()
            .unwrap_or_else(|e| panic!("invalid {flag} value '{raw}': {e}")),
        None => default,
    }
}

/// Two-class dataset where only the first four features carry signal.
fn simulate_dataset(n: usize, p: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::<f64>::zeros((n, p));
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let class = (i % 2) as f64;
        y[i] = class;
        for j in 0..p {
            x[[i, j]] = if j < 4 {
                2.5 * class + rng.gen_range(-1.0..1.0)
            } else {
                rng.gen_range(-1.0..1.0)
            };
        }
    }
    Dataset::new(x, y).expect("simulated dataset must be valid")
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_features = parse_usize_arg(&args, "--num-features", 5);
    let iter_max = parse_usize_arg(&args, "--iters", 50);
    let seed = parse_u64_arg(&args, "--seed", 1);
    let gain_type = parse_string_arg(&args, "--gain")
        .map(|raw| raw.parse::<GainKind>().expect("gain type must be bb or mon"))
        .unwrap_or_default();

    let data = simulate_dataset(200, 20, seed.wrapping_mul(31).wrapping_add(7));
    let selector = SpsaSelector::new(data, NearestCentroid, Scoring::Accuracy);
    let opts = SpsaOptions {
        gain_type,
        num_features,
        iter_max,
        print_freq: 0,
        seed: Some(seed),
        ..SpsaOptions::default()
    };
    let report = selector.run(opts).expect("selection run failed");

    println!(
        "learner: {}, scoring: {}, gain: {}",
        report.learner, report.scoring, gain_type
    );
    println!(
        "iterations: {} (best at {})",
        report.total_iter_overall, report.total_iter_for_opt
    );
    println!(
        "best objective: {:.5} +/- {:.5} in {:.2} minutes",
        report.best_value, report.best_std, report.run_time_minutes
    );
    println!("selected features ({}):", report.num_selected);
    for (rank, (&feature, &importance)) in report
        .selected_features
        .iter()
        .zip(report.importances.iter())
        .enumerate()
    {
        println!("  {:>2}. feature {:>2}  importance {:+.5}", rank + 1, feature, importance);
    }
}
