//! Strategy module
//!
//! Classification and scoring that runs once per scan cycle:
//! - `classifier` - hard-filter rule sets (standard, micro-velocity, accumulation)
//!   and the priority merge of their outputs
//! - `pressure` - volume history, acceleration and buy/sell pressure
//! - `pre_ignition` - tracked instruments coiling before a breakout
//! - `markov` - regime labels and next-state prediction from price history

pub mod classifier;
pub mod markov;
pub mod pre_ignition;
pub mod pressure;

pub use classifier::{accumulation_score, merge_by_priority, StrategyClassifier};
pub use markov::{MarkovPrediction, MarkovRegimeClassifier, TransitionMatrix};
pub use pre_ignition::{
    pre_ignition_score, Graduation, PreIgnitionCandidate, PreIgnitionDetector, PreIgnitionOutcome,
};
pub use pressure::{
    calculate_volume_acceleration, detect_pressure_direction, VolumeHistoryStore, VolumeSample,
};
