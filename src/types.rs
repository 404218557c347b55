use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::kernel::SelectionError;

/// Step-size schedule selector for the importance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainKind {
    /// Barzilai-Borwein curvature estimate with lookback smoothing.
    Bb,
    /// Monotone decay `a / (iter + A)^alpha`.
    Monotone,
}

impl Default for GainKind {
    fn default() -> Self {
        GainKind::Bb
    }
}

impl GainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GainKind::Bb => "bb",
            GainKind::Monotone => "mon",
        }
    }
}

impl fmt::Display for GainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GainKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bb" => Ok(GainKind::Bb),
            "mon" => Ok(GainKind::Monotone),
            other => Err(SelectionError::UnknownGainType(other.to_string())),
        }
    }
}

/// Mean and spread of cross-validated scores for one candidate subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsetScore {
    pub mean: f64,
    pub std: f64,
}
