use crate::kernel::BestSolution;
use crate::types::SubsetScore;

/// Periodic progress snapshot emitted by the optimization loop.
#[derive(Debug, Clone)]
pub struct IterationUpdate<'a> {
    pub iteration: usize,
    pub num_selected: usize,
    pub score: SubsetScore,
    pub best: Option<&'a BestSolution>,
}

/// Cause of a search-state reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The objective failed to improve for more than the stall limit.
    ObjectiveStall,
    /// Duplicate-selection escalation exhausted its attempts.
    DuplicateSelection,
}

/// Final run statistics handed to the sink once the loop finishes.
#[derive(Debug, Clone)]
pub struct RunSummary<'a> {
    pub best: Option<&'a BestSolution>,
    pub total_iterations: usize,
    pub run_time_minutes: f64,
}

/// Observer for kernel progress. One sink is injected per kernel instance,
/// so concurrent searches never share reporting state.
pub trait ProgressSink {
    fn on_iteration(&mut self, _update: &IterationUpdate<'_>) {}
    fn on_restart(&mut self, _reason: RestartReason, _iteration: usize) {}
    fn on_complete(&mut self, _summary: &RunSummary<'_>) {}
}

/// Default sink: forwards everything to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_iteration(&mut self, update: &IterationUpdate<'_>) {
        match update.best {
            Some(best) => log::info!(
                "[SPSA] iter_no: {}, num_ft: {}, value: {}, st_dev: {}, best: {} @ iter_no {}",
                update.iteration,
                update.num_selected,
                update.score.mean,
                update.score.std,
                best.value,
                best.iteration
            ),
            None => log::info!(
                "[SPSA] iter_no: {}, num_ft: {}, value: {}, st_dev: {}, best: none yet",
                update.iteration,
                update.num_selected,
                update.score.mean,
                update.score.std
            ),
        }
    }

    fn on_restart(&mut self, reason: RestartReason, iteration: usize) {
        match reason {
            RestartReason::ObjectiveStall => log::info!(
                "[SPSA] stall limit reached, reinitializing search at iteration {iteration}"
            ),
            RestartReason::DuplicateSelection => log::info!(
                "[SPSA] same-selection limit reached, reinitializing search at iteration {iteration}"
            ),
        }
    }

    fn on_complete(&mut self, summary: &RunSummary<'_>) {
        log::info!(
            "[SPSA] run completed in {} minutes over {} iterations",
            summary.run_time_minutes,
            summary.total_iterations
        );
        if let Some(best) = summary.best {
            log::info!(
                "[SPSA] best value: {} with {} features at iteration {}",
                best.value,
                best.features.len(),
                best.iteration
            );
        }
    }
}
