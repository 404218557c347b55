#![deny(dead_code)]
#![deny(unused_imports)]

pub mod data;
pub mod evaluate;
pub mod gain;
pub mod kernel;
pub mod learn;
pub mod progress;
pub mod report;
pub mod score;
pub mod selector;
pub mod split;
pub mod types;

pub use data::Dataset;
pub use evaluate::{CrossValEvaluator, SubsetEvaluator};
pub use gain::{GainSchedule, GainStep};
pub use kernel::{
    clamp_change, select_feature_indices, BestSolution, IterationRecord, RunOutcome,
    SelectionError, SpsaKernel, SpsaOptions, BB_BOTTOM_THRESHOLD, CHANGE_MAX, CHANGE_MIN,
    DISPLAY_DECIMALS, GAIN_MAX, GAIN_MIN, PERTURB_AMOUNT, STALL_TOLERANCE,
};
pub use learn::{Learner, NearestCentroid, Predictor, RidgeRegression};
pub use progress::{IterationUpdate, LogSink, ProgressSink, RestartReason, RunSummary};
pub use report::SelectionReport;
pub use score::Scoring;
pub use selector::SpsaSelector;
pub use split::{build_splitters, KFold, Splitter, StratifiedKFold, TrainValidSplit};
pub use types::{GainKind, SubsetScore};
