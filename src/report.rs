use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::kernel::{BestSolution, IterationRecord, RunOutcome};

/// Final outcome of one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionReport {
    pub learner: String,
    pub scoring: String,
    /// Input features restricted to the best selection, in ranked order.
    pub selected_data: Array2<f64>,
    /// Best selection, ranked by descending importance.
    pub selected_features: Vec<usize>,
    /// Unquantized importance of each selected feature, aligned with
    /// `selected_features`.
    pub importances: Array1<f64>,
    pub num_selected: usize,
    /// Per-iteration trace in recording order.
    pub history: Vec<IterationRecord>,
    /// Number of recorded iterations.
    pub total_iter_overall: usize,
    /// First iteration that achieved the highest recorded objective.
    pub total_iter_for_opt: usize,
    pub best_value: f64,
    pub best_std: f64,
    /// Wall-clock runtime in minutes, rounded to two decimals.
    pub run_time_minutes: f64,
}

impl SelectionReport {
    /// Assemble the report from a finished run over `data`.
    pub fn assemble(learner: String, scoring: String, data: &Dataset, outcome: RunOutcome) -> Self {
        let (selected_features, importances, best_value, best_std) = match outcome.best {
            Some(BestSolution {
                features,
                importances,
                value,
                std,
                ..
            }) => (features, importances, value, std),
            None => (Vec::new(), Array1::zeros(0), f64::NEG_INFINITY, -1.0),
        };
        SelectionReport {
            learner,
            scoring,
            selected_data: data.select_columns(&selected_features),
            num_selected: selected_features.len(),
            total_iter_overall: outcome.history.len(),
            total_iter_for_opt: argmax_objective(&outcome.history),
            best_value,
            best_std,
            run_time_minutes: outcome.run_time_minutes,
            history: outcome.history,
            selected_features,
            importances,
        }
    }
}

/// Index of the first record holding the highest recorded objective.
fn argmax_objective(history: &[IterationRecord]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (i, record) in history.iter().enumerate() {
        if record.objective_mean > best_val {
            best_val = record.objective_mean;
            best_idx = i;
        }
    }
    best_idx
}
