//! Market-regime classification from volatility, volume, and price trend.

use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::models::{CandleSeries, Regime};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub regime: Regime,
    pub confidence: f64,
    pub volatility: f64,
    pub price_trend: f64,
}

pub struct RegimeClassifier {
    cfg: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(cfg: RegimeConfig) -> Self {
        Self { cfg }
    }

    /// Threshold cascade: explosive volatility with rising volume reads as
    /// volatile; a clear net move with supportive volume reads as trending;
    /// a quiet tape reads as ranging; anything else is ranging at low
    /// confidence. Volumes come straight off the candles.
    pub fn classify(&self, candles: &CandleSeries) -> RegimeState {
        let cfg = &self.cfg;
        if candles.len() < cfg.return_window + 1 {
            return RegimeState {
                regime: Regime::Ranging,
                confidence: 0.5,
                volatility: 0.0,
                price_trend: 0.0,
            };
        }

        let closes = candles.closes();
        let n = closes.len();

        let returns: Vec<f64> = (n - cfg.return_window..n)
            .map(|i| {
                let prev = closes[i - 1];
                if prev.abs() < f64::EPSILON {
                    0.0
                } else {
                    (closes[i] - prev) / prev
                }
            })
            .collect();
        let volatility = stddev(&returns);

        let volumes = candles.volumes();
        let volume_trend = volume_trend(&volumes, cfg.volume_recent, cfg.volume_baseline);

        let anchor = closes[n - 1 - cfg.return_window];
        let price_trend = if anchor.abs() < f64::EPSILON {
            0.0
        } else {
            (closes[n - 1] - anchor) / anchor
        };

        let (regime, confidence) = if volatility > cfg.volatile_threshold
            && volume_trend > cfg.volatile_volume_trend
        {
            (Regime::Volatile, 0.8)
        } else if price_trend.abs() > cfg.trend_threshold && volume_trend > cfg.trend_volume_trend {
            let regime = if price_trend > 0.0 {
                Regime::BullishTrending
            } else {
                Regime::BearishTrending
            };
            (regime, 0.75)
        } else if volatility < cfg.quiet_threshold {
            (Regime::Ranging, 0.7)
        } else {
            (Regime::Ranging, 0.5)
        };

        RegimeState {
            regime,
            confidence,
            volatility,
            price_trend,
        }
    }
}

fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Recent short average over the preceding baseline average.
fn volume_trend(volumes: &[f64], recent: usize, baseline: usize) -> f64 {
    if volumes.len() < recent + baseline {
        return 1.0;
    }
    let n = volumes.len();
    let recent_avg = volumes[n - recent..].iter().sum::<f64>() / recent as f64;
    let baseline_avg =
        volumes[n - recent - baseline..n - recent].iter().sum::<f64>() / baseline as f64;
    if baseline_avg.abs() < f64::EPSILON {
        return 1.0;
    }
    recent_avg / baseline_avg
}
