//! Price-versus-indicator divergence over a trailing window.

use serde::{Deserialize, Serialize};

use crate::config::DivergenceConfig;
use crate::core::patterns::{find_peaks, find_troughs};
use crate::models::Bias;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: Bias,
    /// Fixed constant, not a measured statistic; a documented simplification
    /// that downstream scoring depends on.
    pub strength: f64,
}

pub struct DivergenceDetector {
    cfg: DivergenceConfig,
}

impl DivergenceDetector {
    pub fn new(cfg: DivergenceConfig) -> Self {
        Self { cfg }
    }

    /// Bullish: price prints a lower swing-low while the indicator prints a
    /// higher one. Bearish is the mirror on swing-highs. Needs both series
    /// at least `periods` long; swing structure is extracted independently
    /// for each series over the trailing window.
    pub fn detect(&self, price: &[f64], indicator: &[f64]) -> Option<Divergence> {
        let periods = self.cfg.periods;
        if price.len() < periods || indicator.len() < periods {
            return None;
        }

        let price_tail = &price[price.len() - periods..];
        let ind_tail = &indicator[indicator.len() - periods..];
        let radius = self.cfg.swing_radius;

        let price_lows = find_troughs(price_tail, radius);
        let ind_lows = find_troughs(ind_tail, radius);
        if let (Some([p_prev, p_last]), Some([i_prev, i_last])) =
            (last_pair(&price_lows), last_pair(&ind_lows))
        {
            if p_last < p_prev && i_last > i_prev {
                return Some(Divergence {
                    kind: Bias::Bullish,
                    strength: self.cfg.strength,
                });
            }
        }

        let price_highs = find_peaks(price_tail, radius);
        let ind_highs = find_peaks(ind_tail, radius);
        if let (Some([p_prev, p_last]), Some([i_prev, i_last])) =
            (last_pair(&price_highs), last_pair(&ind_highs))
        {
            if p_last > p_prev && i_last < i_prev {
                return Some(Divergence {
                    kind: Bias::Bearish,
                    strength: self.cfg.strength,
                });
            }
        }

        None
    }
}

fn last_pair(points: &[crate::core::patterns::SwingPoint]) -> Option<[f64; 2]> {
    if points.len() < 2 {
        return None;
    }
    Some([points[points.len() - 2].value, points[points.len() - 1].value])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20 points with two troughs: first at index 4, second at index 14.
    fn v_shape(first_low: f64, second_low: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(20);
        for i in 0..10 {
            let dist = (i as i64 - 4).unsigned_abs() as f64;
            out.push(first_low + dist * 2.0);
        }
        for i in 0..10 {
            let dist = (i as i64 - 4).unsigned_abs() as f64;
            out.push(second_low + dist * 2.0);
        }
        out
    }

    #[test]
    fn bullish_divergence_on_lower_low_higher_indicator_low() {
        let price = v_shape(100.0, 95.0); // lower low
        let rsi = v_shape(30.0, 40.0); // higher low
        let det = DivergenceDetector::new(DivergenceConfig::default());
        let d = det.detect(&price, &rsi).expect("divergence expected");
        assert_eq!(d.kind, Bias::Bullish);
        assert!((d.strength - 0.8).abs() < 1e-9);
    }

    #[test]
    fn bearish_divergence_on_higher_high_lower_indicator_high() {
        let price: Vec<f64> = v_shape(100.0, 95.0).iter().map(|v| -v).collect();
        let rsi: Vec<f64> = v_shape(30.0, 40.0).iter().map(|v| -v).collect();
        let det = DivergenceDetector::new(DivergenceConfig::default());
        let d = det.detect(&price, &rsi).expect("divergence expected");
        assert_eq!(d.kind, Bias::Bearish);
    }

    #[test]
    fn no_divergence_when_structure_agrees() {
        let price = v_shape(100.0, 95.0);
        let rsi = v_shape(40.0, 30.0); // both lower
        let det = DivergenceDetector::new(DivergenceConfig::default());
        assert!(det.detect(&price, &rsi).is_none());
    }

    #[test]
    fn short_series_returns_none() {
        let det = DivergenceDetector::new(DivergenceConfig::default());
        assert!(det.detect(&[1.0; 10], &[1.0; 10]).is_none());
    }
}
