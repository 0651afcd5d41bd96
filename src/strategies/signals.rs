use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Direction, SetupKind};

/// A fully specified trade idea: one strategy's read of the current window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSetup {
    pub kind: SetupKind,
    pub direction: Direction,
    pub confidence: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward: f64,
    /// Human-readable contributions that built the score.
    pub signals: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl TradeSetup {
    /// Stop below entry below target for longs, mirrored for shorts.
    pub fn sides_are_consistent(&self) -> bool {
        match self.direction {
            Direction::Long => self.stop_loss < self.entry && self.entry < self.take_profit,
            Direction::Short => self.stop_loss > self.entry && self.entry > self.take_profit,
        }
    }
}

/// Forecast from an external model. The pipeline runs fully without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub price: f64,
    pub change_percent: f64,
    pub confidence: f64,
    pub direction: Direction,
}

/// Adapter seam for whatever produces predictions (statistical model,
/// remote service, replayed fixture).
pub trait Predictor {
    fn predict(&self, closes: &[f64]) -> Option<Prediction>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn side_consistency_long_and_short() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let mut setup = TradeSetup {
            kind: SetupKind::TrendFollowing,
            direction: Direction::Long,
            confidence: 0.7,
            entry: 100.0,
            stop_loss: 98.0,
            take_profit: 104.0,
            risk_reward: 2.0,
            signals: vec![],
            timestamp: ts,
        };
        assert!(setup.sides_are_consistent());

        setup.direction = Direction::Short;
        assert!(!setup.sides_are_consistent());

        setup.stop_loss = 102.0;
        setup.take_profit = 96.0;
        assert!(setup.sides_are_consistent());
    }
}
