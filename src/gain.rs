use ndarray::Array1;

use crate::kernel::{BB_BOTTOM_THRESHOLD, GAIN_MAX, GAIN_MIN};
use crate::types::GainKind;

/// Raw and smoothed step size for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainStep {
    pub raw: f64,
    pub smoothed: f64,
}

/// Per-iteration step-size schedule.
///
/// The Barzilai-Borwein variant estimates local curvature from consecutive
/// importance and gradient differences; because the search maximizes, the
/// denominator is negated before the threshold guard. Raw gains accumulate in
/// a history that the smoothing window averages over. The monotone variant
/// ignores the differences entirely and never smooths.
#[derive(Debug, Clone)]
pub struct GainSchedule {
    kind: GainKind,
    num_smoothing: usize,
    mon_gain_scale: f64,
    mon_gain_offset: f64,
    mon_gain_alpha: f64,
    raw_gains: Vec<f64>,
}

impl GainSchedule {
    /// `mon_gain_scale`, `mon_gain_offset` and `mon_gain_alpha` are the `a`,
    /// `A` and `alpha` constants of the monotone decay.
    pub fn new(
        kind: GainKind,
        num_smoothing: usize,
        mon_gain_scale: f64,
        mon_gain_offset: f64,
        mon_gain_alpha: f64,
    ) -> Self {
        Self {
            kind,
            num_smoothing,
            mon_gain_scale,
            mon_gain_offset,
            mon_gain_alpha,
            raw_gains: Vec::new(),
        }
    }

    /// Compute the step for `iteration`. `imp_diff` and `ghat_diff` are the
    /// current-minus-previous importance and gradient vectors; only the
    /// Barzilai-Borwein variant reads them.
    pub fn next(
        &mut self,
        iteration: usize,
        imp_diff: &Array1<f64>,
        ghat_diff: &Array1<f64>,
    ) -> GainStep {
        let raw = match self.kind {
            GainKind::Bb => {
                if iteration == 0 {
                    GAIN_MIN
                } else {
                    let bb_bottom = -imp_diff.dot(ghat_diff);
                    if bb_bottom < BB_BOTTOM_THRESHOLD {
                        GAIN_MIN
                    } else {
                        (imp_diff.dot(imp_diff) / bb_bottom).clamp(GAIN_MIN, GAIN_MAX)
                    }
                }
            }
            GainKind::Monotone => {
                self.mon_gain_scale
                    / (iteration as f64 + self.mon_gain_offset).powf(self.mon_gain_alpha)
            }
        };
        self.raw_gains.push(raw);

        let window = self.num_smoothing.max(1);
        let smoothed = match self.kind {
            GainKind::Bb if iteration >= 1 && iteration >= window => {
                let recent = &self.raw_gains[self.raw_gains.len() - window..];
                recent.iter().sum::<f64>() / window as f64
            }
            _ => raw,
        };
        GainStep { raw, smoothed }
    }
}
