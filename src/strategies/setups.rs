//! Signal fusion: five independent strategies score the current window and
//! emit fully specified trade setups.

use crate::config::{DivergenceConfig, SetupConfig};
use crate::core::divergence::DivergenceDetector;
use crate::core::indicators::IndicatorSnapshot;
use crate::core::patterns::Pattern;
use crate::core::regime::RegimeState;
use crate::models::{Bias, CandleSeries, Direction, SetupKind};
use crate::strategies::signals::{Prediction, TradeSetup};

/// Maximum achievable trend-following score: regime 1.0 + EMA stack 1.5
/// + prediction 2.0 + MACD 0.8.
const TREND_MAX_SCORE: f64 = 5.3;
/// Mean-reversion and breakout both cap at 3.0 (two unit signals plus a
/// pattern confidence).
const REVERSION_MAX_SCORE: f64 = 3.0;
const BREAKOUT_MAX_SCORE: f64 = 3.0;

pub struct SetupDetector {
    cfg: SetupConfig,
    divergence: DivergenceDetector,
    /// Last computed result, not history-aware state.
    pub active: Vec<TradeSetup>,
    /// Bounded trail of everything ever emitted, newest last.
    pub history: Vec<TradeSetup>,
}

impl SetupDetector {
    pub fn new(cfg: SetupConfig, divergence_cfg: DivergenceConfig) -> Self {
        Self {
            cfg,
            divergence: DivergenceDetector::new(divergence_cfg),
            active: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Runs all five strategies on the current window. Each scores
    /// independently; no strategy suppresses another. Results are filtered
    /// to the confidence floor, checked for side consistency, and sorted
    /// by descending confidence.
    pub fn analyze(
        &mut self,
        candles: &CandleSeries,
        indicators: &[IndicatorSnapshot],
        patterns: &[Pattern],
        prediction: Option<&Prediction>,
        regime: &RegimeState,
    ) -> Vec<TradeSetup> {
        let (Some(last), Some(snapshot)) = (candles.last(), indicators.last()) else {
            return Vec::new();
        };
        let close = last.close;
        let ts = last.timestamp;

        let candidates = [
            self.trend_following(close, ts, snapshot, prediction, regime),
            self.mean_reversion(close, ts, snapshot, patterns),
            self.breakout(candles, close, ts, snapshot, patterns),
            self.pattern_trade(close, ts, snapshot, patterns, prediction),
            self.divergence_trade(candles, close, ts, indicators),
        ];

        let mut setups: Vec<TradeSetup> = candidates
            .into_iter()
            .flatten()
            .filter(|s| {
                if !s.sides_are_consistent() {
                    tracing::debug!(kind = %s.kind, "setup rejected: stop/target on wrong side");
                    return false;
                }
                true
            })
            .filter(|s| s.confidence >= self.cfg.min_confidence)
            .collect();

        setups.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .expect("finite confidence")
        });

        self.active = setups.clone();
        self.history.extend(setups.iter().cloned());
        if self.history.len() > self.cfg.history_cap {
            let excess = self.history.len() - self.cfg.history_cap;
            self.history.drain(..excess);
        }

        setups
    }

    /// Regime + EMA stack + prediction + MACD, scored with sign carrying
    /// the direction.
    fn trend_following(
        &self,
        close: f64,
        ts: chrono::DateTime<chrono::Utc>,
        snapshot: &IndicatorSnapshot,
        prediction: Option<&Prediction>,
        regime: &RegimeState,
    ) -> Option<TradeSetup> {
        let atr = snapshot.atr?;
        let mut score = 0.0f64;
        let mut signals = Vec::new();

        if regime.regime.is_trending() {
            let sign = if regime.regime == crate::models::Regime::BullishTrending {
                1.0
            } else {
                -1.0
            };
            score += sign;
            signals.push(format!("regime {}", regime.regime));
        }

        if let (Some(e9), Some(e20), Some(e50)) = (snapshot.ema9, snapshot.ema20, snapshot.ema50) {
            if e9 > e20 && e20 > e50 {
                score += 1.5;
                signals.push("EMA 9>20>50".to_string());
            } else if e9 < e20 && e20 < e50 {
                score -= 1.5;
                signals.push("EMA 9<20<50".to_string());
            }
        }

        if let Some(pred) = prediction {
            let agrees = (score > 0.0 && pred.direction == Direction::Long)
                || (score < 0.0 && pred.direction == Direction::Short);
            if agrees {
                score += score.signum() * pred.confidence * 2.0;
                signals.push(format!(
                    "prediction {} ({:.0}%)",
                    pred.direction,
                    pred.confidence * 100.0
                ));
            }
        }

        if let (Some(macd), Some(sig)) = (snapshot.macd, snapshot.macd_signal) {
            if macd > sig {
                score += 0.8;
                signals.push("MACD above signal".to_string());
            } else if macd < sig {
                score -= 0.8;
                signals.push("MACD below signal".to_string());
            }
        }

        if score == 0.0 {
            tracing::trace!("trend following flat, no setup");
            return None;
        }

        let direction = if score > 0.0 {
            Direction::Long
        } else {
            Direction::Short
        };
        let (stop, target) = match direction {
            Direction::Long => (
                close - self.cfg.atr_stop_mult * atr,
                close + self.cfg.atr_target_mult * atr,
            ),
            Direction::Short => (
                close + self.cfg.atr_stop_mult * atr,
                close - self.cfg.atr_target_mult * atr,
            ),
        };

        Some(TradeSetup {
            kind: SetupKind::TrendFollowing,
            direction,
            confidence: self.clamp(score.abs() / TREND_MAX_SCORE),
            entry: close,
            stop_loss: stop,
            take_profit: target,
            // ATR multiples fix the multiple; the risk engine re-validates.
            risk_reward: self.cfg.atr_target_mult / self.cfg.atr_stop_mult,
            signals,
            timestamp: ts,
        })
    }

    /// Only activates at an RSI extreme; fades back toward the Bollinger
    /// middle.
    fn mean_reversion(
        &self,
        close: f64,
        ts: chrono::DateTime<chrono::Utc>,
        snapshot: &IndicatorSnapshot,
        patterns: &[Pattern],
    ) -> Option<TradeSetup> {
        let rsi = snapshot.rsi?;
        let direction = if rsi < self.cfg.rsi_oversold {
            Direction::Long
        } else if rsi > self.cfg.rsi_overbought {
            Direction::Short
        } else {
            return None;
        };

        let mut score = 1.0;
        let mut signals = vec![format!("RSI {:.1}", rsi)];

        if let Some(pos) = snapshot.bollinger_position {
            let at_extreme = match direction {
                Direction::Long => pos < self.cfg.bollinger_extreme,
                Direction::Short => pos > 1.0 - self.cfg.bollinger_extreme,
            };
            if at_extreme {
                score += 1.0;
                signals.push(format!("band position {:.2}", pos));
            }
        }

        let reversal_bias = match direction {
            Direction::Long => Bias::Bullish,
            Direction::Short => Bias::Bearish,
        };
        if let Some(p) = best_pattern(patterns, |p| p.direction == reversal_bias) {
            score += p.confidence;
            signals.push(format!("{} pattern", p.kind));
        }

        let stop_pct = self.cfg.reversion_stop_pct;
        let target_pct = self.cfg.reversion_target_pct;
        let (stop, target) = match direction {
            Direction::Long => {
                let target = match snapshot.bollinger_middle {
                    Some(mid) if mid > close => mid,
                    _ => close * (1.0 + target_pct),
                };
                (close * (1.0 - stop_pct), target)
            }
            Direction::Short => {
                let target = match snapshot.bollinger_middle {
                    Some(mid) if mid < close => mid,
                    _ => close * (1.0 - target_pct),
                };
                (close * (1.0 + stop_pct), target)
            }
        };

        Some(TradeSetup {
            kind: SetupKind::MeanReversion,
            direction,
            confidence: self.clamp(score / REVERSION_MAX_SCORE),
            entry: close,
            stop_loss: stop,
            take_profit: target,
            risk_reward: ratio(close, stop, target),
            signals,
            timestamp: ts,
        })
    }

    /// Close must clear the prior window's extreme by the margin; target is
    /// the measured move of that window's range.
    fn breakout(
        &self,
        candles: &CandleSeries,
        close: f64,
        ts: chrono::DateTime<chrono::Utc>,
        snapshot: &IndicatorSnapshot,
        patterns: &[Pattern],
    ) -> Option<TradeSetup> {
        let window = self.cfg.breakout_window;
        if candles.len() < window + 1 {
            return None;
        }
        let prior = candles.slice(candles.len() - window - 1, candles.len() - 1);
        let prior_high = prior.highs_max();
        let prior_low = prior.lows_min();
        let range = prior_high - prior_low;
        if range <= 0.0 {
            return None;
        }

        let margin = self.cfg.breakout_margin;
        let (direction, level) = if close > prior_high * (1.0 + margin) {
            (Direction::Long, prior_high)
        } else if close < prior_low * (1.0 - margin) {
            (Direction::Short, prior_low)
        } else {
            tracing::trace!("no breakout beyond prior {}-candle range", window);
            return None;
        };

        let mut score = 1.0;
        let mut signals = vec![format!("close beyond {:.2}", level)];

        if let Some(vr) = snapshot.volume_ratio {
            if vr > self.cfg.breakout_volume_ratio {
                score += 1.0;
                signals.push(format!("volume {:.1}x average", vr));
            }
        }
        if let Some(p) = best_pattern(patterns, Pattern::is_triangle_or_flag) {
            score += p.confidence;
            signals.push(format!("{} pattern", p.kind));
        }

        let stop_pct = self.cfg.breakout_stop_pct;
        let (stop, target) = match direction {
            // Stop sits just inside the broken level.
            Direction::Long => (level * (1.0 - stop_pct), close + range),
            Direction::Short => (level * (1.0 + stop_pct), close - range),
        };

        Some(TradeSetup {
            kind: SetupKind::Breakout,
            direction,
            confidence: self.clamp(score / BREAKOUT_MAX_SCORE),
            entry: close,
            stop_loss: stop,
            take_profit: target,
            risk_reward: ratio(close, stop, target),
            signals,
            timestamp: ts,
        })
    }

    /// Trades the single best chart pattern that carries an explicit target.
    fn pattern_trade(
        &self,
        close: f64,
        ts: chrono::DateTime<chrono::Utc>,
        snapshot: &IndicatorSnapshot,
        patterns: &[Pattern],
        prediction: Option<&Prediction>,
    ) -> Option<TradeSetup> {
        let best = best_pattern(patterns, |p| {
            p.confidence >= self.cfg.min_confidence && p.target.is_some() && p.level.is_some()
        })?;
        let direction = best.direction.to_direction()?;
        let target = best.target?;
        let level = best.level?;

        let mut score = best.confidence;
        let mut signals = vec![format!("{} ({:.0}%)", best.kind, best.confidence * 100.0)];

        if let Some(rsi) = snapshot.rsi {
            let confirms = match direction {
                Direction::Long => rsi > 50.0,
                Direction::Short => rsi < 50.0,
            };
            if confirms {
                score += 0.05;
                signals.push(format!("RSI confirms at {:.1}", rsi));
            }
        }
        if let Some(pred) = prediction {
            if pred.direction == direction {
                score += 0.10;
                signals.push("prediction agrees".to_string());
            }
        }

        let stop_pct = self.cfg.pattern_stop_pct;
        let stop = match direction {
            Direction::Long => level * (1.0 - stop_pct),
            Direction::Short => level * (1.0 + stop_pct),
        };

        Some(TradeSetup {
            kind: SetupKind::PatternTrade,
            direction,
            confidence: self.clamp(score),
            entry: close,
            stop_loss: stop,
            take_profit: target,
            risk_reward: ratio(close, stop, target),
            signals,
            timestamp: ts,
        })
    }

    /// Price-versus-RSI divergence over the trailing window.
    fn divergence_trade(
        &self,
        candles: &CandleSeries,
        close: f64,
        ts: chrono::DateTime<chrono::Utc>,
        indicators: &[IndicatorSnapshot],
    ) -> Option<TradeSetup> {
        let rsi_points: Vec<f64> = indicators.iter().filter_map(|s| s.rsi).collect();
        let closes = candles.closes();
        let hit = self.divergence.detect(&closes, &rsi_points)?;
        let direction = hit.kind.to_direction()?;

        let stop_pct = self.cfg.divergence_stop_pct;
        let target_pct = self.cfg.divergence_target_pct;
        let (stop, target) = match direction {
            Direction::Long => (close * (1.0 - stop_pct), close * (1.0 + target_pct)),
            Direction::Short => (close * (1.0 + stop_pct), close * (1.0 - target_pct)),
        };

        Some(TradeSetup {
            kind: SetupKind::DivergenceTrade,
            direction,
            confidence: self.clamp(hit.strength),
            entry: close,
            stop_loss: stop,
            take_profit: target,
            risk_reward: ratio(close, stop, target),
            signals: vec![format!("{} RSI divergence", hit.kind)],
            timestamp: ts,
        })
    }

    fn clamp(&self, confidence: f64) -> f64 {
        confidence.min(self.cfg.max_confidence)
    }
}

fn best_pattern<F>(patterns: &[Pattern], pred: F) -> Option<&Pattern>
where
    F: Fn(&Pattern) -> bool,
{
    patterns
        .iter()
        .filter(|p| pred(p))
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).expect("finite confidence"))
}

fn ratio(entry: f64, stop: f64, target: f64) -> f64 {
    let risk = (entry - stop).abs();
    if risk < f64::EPSILON {
        return 0.0;
    }
    (target - entry).abs() / risk
}
