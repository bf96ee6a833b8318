//! Markov regime classification
//!
//! A price history is cut into overlapping windows, each window gets a
//! [`MarketState`] label, and the label sequence is turned into a transition
//! matrix. The matrix is rebuilt on every call from the track's own history.

use serde::{Deserialize, Serialize};

use crate::config::MarkovConfig;
use crate::domain::MarketState;

const STATES: usize = 6;

/// Row-stochastic transition matrix, indexed by `MarketState::index()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    rows: [[f64; STATES]; STATES],
}

impl TransitionMatrix {
    pub fn row(&self, from: MarketState) -> &[f64; STATES] {
        &self.rows[from.index()]
    }

    pub fn probability(&self, from: MarketState, to: MarketState) -> f64 {
        self.rows[from.index()][to.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovPrediction {
    pub current_state: MarketState,
    pub predicted_next_state: MarketState,
    pub transition_probability: f64,
    /// Full row for `current_state`, in `MarketState::ALL` order
    pub probabilities: [f64; STATES],
}

impl MarkovPrediction {
    /// Returned when there is not enough history
    pub fn fallback() -> Self {
        Self {
            current_state: MarketState::Accumulation,
            predicted_next_state: MarketState::Accumulation,
            transition_probability: 0.0,
            probabilities: [1.0 / STATES as f64; STATES],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkovRegimeClassifier {
    config: MarkovConfig,
}

impl MarkovRegimeClassifier {
    pub fn new(config: MarkovConfig) -> Self {
        Self { config }
    }

    /// Label one window of prices (oldest first)
    pub fn classify_window(&self, window: &[f64]) -> MarketState {
        let (start, end) = match (window.first(), window.last()) {
            (Some(s), Some(e)) => (*s, *e),
            _ => return MarketState::Accumulation,
        };
        if start <= 0.0 || !start.is_finite() || !end.is_finite() {
            return MarketState::Accumulation;
        }

        let change_pct = (end - start) / start * 100.0;
        let volatility = normalized_volatility(window);
        let high_vol = volatility > self.config.high_volatility;
        let cfg = &self.config;

        if change_pct.abs() < cfg.flat_change_pct && volatility < cfg.high_volatility {
            MarketState::Accumulation
        } else if change_pct > cfg.extreme_change_pct && high_vol {
            MarketState::Euphoria
        } else if change_pct < -cfg.extreme_change_pct && high_vol {
            MarketState::Panic
        } else if change_pct > cfg.flat_change_pct {
            MarketState::BullishTrend
        } else if change_pct < -cfg.flat_change_pct {
            MarketState::BearishTrend
        } else {
            MarketState::Accumulation
        }
    }

    /// One label per window of `window + 1` consecutive prices
    pub fn state_sequence(&self, prices: &[f64]) -> Vec<MarketState> {
        let w = self.config.window;
        if w == 0 || prices.len() <= w {
            return Vec::new();
        }
        prices.windows(w + 1).map(|win| self.classify_window(win)).collect()
    }

    /// Count consecutive transitions and normalize each row.
    ///
    /// A state with no outgoing transitions stays in itself with probability 1.
    pub fn build_transition_matrix(&self, states: &[MarketState]) -> TransitionMatrix {
        let mut counts = [[0.0_f64; STATES]; STATES];
        for pair in states.windows(2) {
            counts[pair[0].index()][pair[1].index()] += 1.0;
        }

        for (i, row) in counts.iter_mut().enumerate() {
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                row.iter_mut().for_each(|p| *p /= total);
            } else {
                row[i] = 1.0;
            }
        }

        TransitionMatrix { rows: counts }
    }

    /// Most likely next regime. Needs `min_points` prices.
    pub fn predict(&self, prices: &[f64]) -> MarkovPrediction {
        if prices.len() < self.config.min_points {
            return MarkovPrediction::fallback();
        }

        let states = self.state_sequence(prices);
        let current = match states.last() {
            Some(s) => *s,
            None => return MarkovPrediction::fallback(),
        };

        let matrix = self.build_transition_matrix(&states);
        let row = *matrix.row(current);

        // strict '>' keeps the first state on ties
        let mut best = MarketState::ALL[0];
        let mut best_p = f64::NEG_INFINITY;
        for state in MarketState::ALL {
            let p = row[state.index()];
            if p > best_p {
                best = state;
                best_p = p;
            }
        }

        MarkovPrediction {
            current_state: current,
            predicted_next_state: best,
            transition_probability: best_p,
            probabilities: row,
        }
    }
}

/// Population standard deviation over mean; 0 for degenerate windows
fn normalized_volatility(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    if window.is_empty() {
        return 0.0;
    }
    let mean = window.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
