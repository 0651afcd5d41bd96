//! Position sizing, risk/reward validation, and the per-setup risk report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RiskConfig;
use crate::models::{Direction, Recommendation};
use crate::strategies::signals::TradeSetup;

const EPSILON: f64 = 1e-10;

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("entry and stop are identical at {0}")]
    ZeroRisk(f64),
    #[error("stop/target on the wrong side of entry for a {0} setup")]
    InconsistentSetup(Direction),
    #[error("account size must be positive, got {0}")]
    InvalidAccount(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub quantity: f64,
    pub notional_value: f64,
    pub leverage: f64,
    pub stop_percent: f64,
    pub max_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReward {
    pub risk: f64,
    pub reward: f64,
    pub ratio: f64,
    pub risk_percent: f64,
    pub reward_percent: f64,
}

/// Kelly fractions in percent of account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyFraction {
    pub full: f64,
    pub half: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    /// Account currency at risk if the stop is hit.
    pub risk_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHeat {
    pub total_risk_percent: f64,
    pub overheated: bool,
}

/// One rung of the partial take-profit ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpLevel {
    pub label: String,
    pub price: f64,
    /// Fraction of the position to close at this rung.
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub position: PositionSize,
    pub risk_reward: RiskReward,
    /// Entry adjusted for round-trip fees.
    pub break_even: f64,
    pub tp_ladder: Vec<TpLevel>,
    pub recommendation: Recommendation,
    pub issues: Vec<String>,
    pub score: f64,
}

pub struct RiskEngine {
    cfg: RiskConfig,
}

impl RiskEngine {
    pub fn new(cfg: RiskConfig) -> Self {
        Self { cfg }
    }

    /// Quantity such that a stop-out loses exactly `risk_percent` of the
    /// account. Leverage is the notional over the account, rounded up.
    pub fn size_position(
        &self,
        entry: f64,
        stop: f64,
        account_size: f64,
        risk_percent: f64,
    ) -> Result<PositionSize, RiskError> {
        if account_size <= 0.0 {
            return Err(RiskError::InvalidAccount(account_size));
        }
        let per_unit_risk = (entry - stop).abs();
        if per_unit_risk < EPSILON {
            return Err(RiskError::ZeroRisk(entry));
        }

        let risk_amount = account_size * risk_percent / 100.0;
        let quantity = risk_amount / per_unit_risk;
        let notional_value = quantity * entry;

        Ok(PositionSize {
            quantity,
            notional_value,
            leverage: (notional_value / account_size).ceil().max(1.0),
            stop_percent: per_unit_risk / entry * 100.0,
            max_loss: risk_amount,
        })
    }

    pub fn risk_reward(&self, entry: f64, stop: f64, target: f64) -> Result<RiskReward, RiskError> {
        let risk = (entry - stop).abs();
        if risk < EPSILON {
            return Err(RiskError::ZeroRisk(entry));
        }
        let reward = (target - entry).abs();
        Ok(RiskReward {
            risk,
            reward,
            ratio: reward / risk,
            risk_percent: risk / entry * 100.0,
            reward_percent: reward / entry * 100.0,
        })
    }

    /// Full Kelly = (p − q/b) / b with b the payoff ratio avg_win/avg_loss,
    /// clamped to [0, 100]% of account. Half Kelly is the usual practical
    /// fraction.
    pub fn kelly_criterion(&self, win_rate: f64, avg_win: f64, avg_loss: f64) -> KellyFraction {
        if avg_loss <= 0.0 || avg_win <= 0.0 {
            return KellyFraction { full: 0.0, half: 0.0 };
        }
        let b = avg_win / avg_loss;
        let q = 1.0 - win_rate;
        let full = ((win_rate - q / b) / b).clamp(0.0, 1.0) * 100.0;
        KellyFraction {
            full,
            half: full * 0.5,
        }
    }

    pub fn portfolio_heat(&self, positions: &[OpenPosition], account_size: f64) -> PortfolioHeat {
        if account_size <= 0.0 {
            return PortfolioHeat {
                total_risk_percent: 0.0,
                overheated: false,
            };
        }
        let total_risk_percent = positions
            .iter()
            .map(|p| p.risk_amount / account_size * 100.0)
            .sum::<f64>();
        PortfolioHeat {
            overheated: total_risk_percent > self.cfg.overheat_threshold,
            total_risk_percent,
        }
    }

    /// 0..100 composite: confidence (40), risk/reward (30), stop tightness
    /// (20), leverage penalty (10).
    pub fn trade_score(
        &self,
        setup: &TradeSetup,
        rr: &RiskReward,
        position: &PositionSize,
    ) -> f64 {
        let confidence_part = 40.0 * setup.confidence;
        let rr_part = (rr.ratio / 3.0 * 30.0).min(30.0);
        let stop_part = (20.0 - position.stop_percent * 5.0).max(0.0);
        let leverage_part = (10.0 - position.leverage).max(0.0);
        confidence_part + rr_part + stop_part + leverage_part
    }

    /// Fixed priority order; excessive leverage is terminal.
    pub fn recommendation(
        &self,
        setup: &TradeSetup,
        rr: &RiskReward,
        position: &PositionSize,
    ) -> Recommendation {
        let mut rec = Recommendation::TakeTrade;
        if rr.ratio < self.cfg.min_risk_reward || position.stop_percent > self.cfg.max_stop_percent
        {
            rec = Recommendation::ReduceSize;
        }
        if position.leverage > self.cfg.max_leverage {
            return Recommendation::SkipTrade;
        }
        if setup.confidence < self.cfg.min_confidence {
            rec = Recommendation::Wait;
        }
        rec
    }

    pub fn generate_report(
        &self,
        setup: &TradeSetup,
        account_size: f64,
        risk_percent: f64,
    ) -> Result<RiskReport, RiskError> {
        if !setup.sides_are_consistent() {
            return Err(RiskError::InconsistentSetup(setup.direction));
        }

        let position =
            self.size_position(setup.entry, setup.stop_loss, account_size, risk_percent)?;
        let rr = self.risk_reward(setup.entry, setup.stop_loss, setup.take_profit)?;

        let fee_round_trip = 2.0 * self.cfg.fee_rate;
        let break_even = match setup.direction {
            Direction::Long => setup.entry * (1.0 + fee_round_trip),
            Direction::Short => setup.entry * (1.0 - fee_round_trip),
        };

        let mut issues = Vec::new();
        if rr.ratio < self.cfg.min_risk_reward {
            issues.push(format!(
                "risk/reward {:.2} below minimum {:.2}",
                rr.ratio, self.cfg.min_risk_reward
            ));
        }
        if position.stop_percent > self.cfg.max_stop_percent {
            issues.push(format!(
                "stop distance {:.2}% exceeds {:.2}%",
                position.stop_percent, self.cfg.max_stop_percent
            ));
        }
        if position.leverage > self.cfg.max_leverage {
            issues.push(format!(
                "required leverage {:.0}x exceeds {:.0}x",
                position.leverage, self.cfg.max_leverage
            ));
        }
        if setup.confidence < self.cfg.min_confidence {
            issues.push(format!(
                "confidence {:.2} below {:.2}",
                setup.confidence, self.cfg.min_confidence
            ));
        }

        let recommendation = self.recommendation(setup, &rr, &position);
        let score = self.trade_score(setup, &rr, &position);
        tracing::debug!(
            %recommendation,
            score = format!("{score:.1}"),
            issues = issues.len(),
            "risk report generated"
        );

        Ok(RiskReport {
            tp_ladder: self.tp_ladder(setup, rr.risk),
            position,
            risk_reward: rr,
            break_even,
            recommendation,
            issues,
            score,
        })
    }

    /// Scale out in thirds-ish: half at 1R, 30% at 2R, the rest at the
    /// setup's own target.
    fn tp_ladder(&self, setup: &TradeSetup, risk: f64) -> Vec<TpLevel> {
        let sign = match setup.direction {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        };
        vec![
            TpLevel {
                label: "1R".to_string(),
                price: setup.entry + sign * risk,
                fraction: 0.5,
            },
            TpLevel {
                label: "2R".to_string(),
                price: setup.entry + sign * 2.0 * risk,
                fraction: 0.3,
            },
            TpLevel {
                label: "target".to_string(),
                price: setup.take_profit,
                fraction: 0.2,
            },
        ]
    }
}
