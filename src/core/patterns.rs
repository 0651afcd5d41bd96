//! Geometric chart pattern detection over a candle series.
//!
//! Each detector family reports at most its most recent match: the engine
//! answers "what pattern is active now", not a historical scan. Every call
//! recomputes from the window; nothing is incremental.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::core::candlesticks;
use crate::core::support_resistance::{self, SrLevel};
use crate::models::{Bias, CandleSeries, PatternKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub direction: Bias,
    pub confidence: f64,
    pub neckline: Option<f64>,
    pub level: Option<f64>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub target: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Pattern {
    pub fn is_triangle_or_flag(&self) -> bool {
        matches!(
            self.kind,
            PatternKind::AscendingTriangle
                | PatternKind::DescendingTriangle
                | PatternKind::SymmetricalTriangle
                | PatternKind::BullFlag
                | PatternKind::BearFlag
        )
    }
}

/// A local extremum over a symmetric neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub value: f64,
}

/// Indices strictly greater than every other point within `radius`.
pub fn find_peaks(values: &[f64], radius: usize) -> Vec<SwingPoint> {
    extrema(values, radius, |candidate, other| candidate > other)
}

/// Indices strictly less than every other point within `radius`.
pub fn find_troughs(values: &[f64], radius: usize) -> Vec<SwingPoint> {
    extrema(values, radius, |candidate, other| candidate < other)
}

fn extrema(values: &[f64], radius: usize, beats: fn(f64, f64) -> bool) -> Vec<SwingPoint> {
    let n = values.len();
    if n < radius * 2 + 1 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in radius..n - radius {
        let candidate = values[i];
        let wins = (i - radius..=i + radius)
            .filter(|&j| j != i)
            .all(|j| beats(candidate, values[j]));
        if wins {
            out.push(SwingPoint {
                index: i,
                value: candidate,
            });
        }
    }
    out
}

/// Least-squares slope and intercept of `values` against their indices.
fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, &v)| i as f64 * v).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return (0.0, values.first().copied().unwrap_or(0.0));
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

pub struct PatternEngine {
    cfg: PatternConfig,
}

impl PatternEngine {
    pub fn new(cfg: PatternConfig) -> Self {
        Self { cfg }
    }

    pub fn detect_all(&self, candles: &CandleSeries) -> Vec<Pattern> {
        if candles.len() < self.cfg.min_candles {
            tracing::trace!(
                candles = candles.len(),
                min = self.cfg.min_candles,
                "pattern scan skipped, not enough history"
            );
            return Vec::new();
        }

        let mut patterns = Vec::new();
        patterns.extend(self.head_and_shoulders(candles));
        patterns.extend(self.inverse_head_and_shoulders(candles));
        patterns.extend(self.double_top(candles));
        patterns.extend(self.double_bottom(candles));
        patterns.extend(self.triangle(candles));
        patterns.extend(self.wedge(candles));
        patterns.extend(self.flag(candles));
        patterns.extend(candlesticks::detect(candles, &self.cfg));
        patterns
    }

    pub fn detect_support_resistance(&self, candles: &CandleSeries) -> Vec<SrLevel> {
        if candles.len() < self.cfg.min_candles {
            return Vec::new();
        }
        support_resistance::detect(candles, &self.cfg)
    }

    fn head_and_shoulders(&self, candles: &CandleSeries) -> Option<Pattern> {
        let window = candles.tail(self.cfg.hs_window);
        let peaks = find_peaks(&window.highs(), self.cfg.swing_radius);
        if peaks.len() < 3 {
            return None;
        }

        let [left, head, right] = last_three(&peaks);
        if head.value <= left.value || head.value <= right.value {
            return None;
        }
        if relative_diff(left.value, right.value) >= self.cfg.hs_shoulder_tolerance {
            return None;
        }

        let neckline = left.value.min(right.value);
        let target = head.value - 2.0 * (head.value - neckline);
        Some(Pattern {
            kind: PatternKind::HeadAndShoulders,
            direction: Bias::Bearish,
            confidence: self.cfg.hs_confidence,
            neckline: Some(neckline),
            level: Some(neckline),
            support: None,
            resistance: Some(head.value),
            target: Some(target),
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    fn inverse_head_and_shoulders(&self, candles: &CandleSeries) -> Option<Pattern> {
        let window = candles.tail(self.cfg.hs_window);
        let troughs = find_troughs(&window.lows(), self.cfg.swing_radius);
        if troughs.len() < 3 {
            return None;
        }

        let [left, head, right] = last_three(&troughs);
        if head.value >= left.value || head.value >= right.value {
            return None;
        }
        if relative_diff(left.value, right.value) >= self.cfg.hs_shoulder_tolerance {
            return None;
        }

        let neckline = left.value.max(right.value);
        let target = head.value + 2.0 * (neckline - head.value);
        Some(Pattern {
            kind: PatternKind::InverseHeadAndShoulders,
            direction: Bias::Bullish,
            confidence: self.cfg.hs_confidence,
            neckline: Some(neckline),
            level: Some(neckline),
            support: Some(head.value),
            resistance: None,
            target: Some(target),
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    fn double_top(&self, candles: &CandleSeries) -> Option<Pattern> {
        let window = candles.tail(self.cfg.double_window);
        let peaks = find_peaks(&window.highs(), self.cfg.swing_radius);
        let (first, second) = last_two_separated(&peaks, self.cfg.double_min_separation)?;
        if relative_diff(first.value, second.value) >= self.cfg.double_tolerance {
            return None;
        }

        let level = (first.value + second.value) / 2.0;
        let valley = window.slice(first.index, second.index + 1).lows_min();
        let range = level - valley;
        Some(Pattern {
            kind: PatternKind::DoubleTop,
            direction: Bias::Bearish,
            confidence: self.cfg.double_confidence,
            neckline: Some(valley),
            level: Some(level),
            support: Some(valley),
            resistance: Some(level),
            target: Some(level - 2.0 * range),
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    fn double_bottom(&self, candles: &CandleSeries) -> Option<Pattern> {
        let window = candles.tail(self.cfg.double_window);
        let troughs = find_troughs(&window.lows(), self.cfg.swing_radius);
        let (first, second) = last_two_separated(&troughs, self.cfg.double_min_separation)?;
        if relative_diff(first.value, second.value) >= self.cfg.double_tolerance {
            return None;
        }

        let level = (first.value + second.value) / 2.0;
        let peak = window.slice(first.index, second.index + 1).highs_max();
        let range = peak - level;
        Some(Pattern {
            kind: PatternKind::DoubleBottom,
            direction: Bias::Bullish,
            confidence: self.cfg.double_confidence,
            neckline: Some(peak),
            level: Some(level),
            support: Some(level),
            resistance: Some(peak),
            target: Some(level + 2.0 * range),
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    /// Fit trendlines to highs and lows and classify by slope signs.
    fn triangle(&self, candles: &CandleSeries) -> Option<Pattern> {
        let lines = self.trendlines(candles);

        let (kind, direction, confidence) = if lines.resistance_flat && lines.support_rising {
            (
                PatternKind::AscendingTriangle,
                Bias::Bullish,
                self.cfg.triangle_confidence,
            )
        } else if lines.resistance_falling && lines.support_flat {
            (
                PatternKind::DescendingTriangle,
                Bias::Bearish,
                self.cfg.triangle_confidence,
            )
        } else if lines.resistance_falling && lines.support_rising {
            (
                PatternKind::SymmetricalTriangle,
                Bias::Neutral,
                self.cfg.symmetrical_confidence,
            )
        } else {
            return None;
        };

        Some(Pattern {
            kind,
            direction,
            confidence,
            neckline: None,
            level: Some(lines.resistance_now),
            support: Some(lines.support_now),
            resistance: Some(lines.resistance_now),
            target: None,
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    /// Both trendlines sloping the same direction with differing magnitude.
    fn wedge(&self, candles: &CandleSeries) -> Option<Pattern> {
        let lines = self.trendlines(candles);

        let (kind, direction) = if lines.resistance_rising
            && lines.support_rising
            && lines.support_slope > lines.resistance_slope
        {
            // Support rising faster than resistance: momentum exhausting.
            (PatternKind::RisingWedge, Bias::Bearish)
        } else if lines.resistance_falling
            && lines.support_falling
            && lines.resistance_slope < lines.support_slope
        {
            (PatternKind::FallingWedge, Bias::Bullish)
        } else {
            return None;
        };

        Some(Pattern {
            kind,
            direction,
            confidence: self.cfg.wedge_confidence,
            neckline: None,
            level: Some(lines.resistance_now),
            support: Some(lines.support_now),
            resistance: Some(lines.resistance_now),
            target: None,
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    /// Strong pole followed by tight consolidation.
    fn flag(&self, candles: &CandleSeries) -> Option<Pattern> {
        let w = self.cfg.flag_window;
        if candles.len() < w * 2 {
            return None;
        }
        let pole = candles.slice(candles.len() - 2 * w, candles.len() - w);
        let consolidation = candles.tail(w);

        let pole_range = pole.highs_max() - pole.lows_min();
        if pole_range <= 0.0 {
            return None;
        }
        let pole_move = pole.last().expect("non-empty").close - pole.first().expect("non-empty").close;
        if pole_move.abs() < self.cfg.flag_pole_min_move * pole_range {
            return None;
        }

        let consolidation_range = consolidation.highs_max() - consolidation.lows_min();
        if consolidation_range >= self.cfg.flag_max_consolidation * pole_range {
            return None;
        }

        let last_close = consolidation.last().expect("non-empty").close;
        let (kind, direction, target) = if pole_move > 0.0 {
            (
                PatternKind::BullFlag,
                Bias::Bullish,
                last_close + pole_move.abs(),
            )
        } else {
            (
                PatternKind::BearFlag,
                Bias::Bearish,
                last_close - pole_move.abs(),
            )
        };

        Some(Pattern {
            kind,
            direction,
            confidence: self.cfg.flag_confidence,
            neckline: None,
            level: Some(last_close),
            support: Some(consolidation.lows_min()),
            resistance: Some(consolidation.highs_max()),
            target: Some(target),
            timestamp: candles.last().expect("non-empty").timestamp,
        })
    }

    fn trendlines(&self, candles: &CandleSeries) -> Trendlines {
        let window = candles.tail(self.cfg.trendline_window);
        let highs = window.highs();
        let lows = window.lows();
        let (res_slope, res_intercept) = linear_regression(&highs);
        let (sup_slope, sup_intercept) = linear_regression(&lows);

        let mean_price = highs.iter().sum::<f64>() / highs.len() as f64;
        let flat = self.cfg.flat_slope * mean_price;
        let last_x = (window.len() - 1) as f64;

        Trendlines {
            resistance_slope: res_slope,
            support_slope: sup_slope,
            resistance_now: res_intercept + res_slope * last_x,
            support_now: sup_intercept + sup_slope * last_x,
            resistance_flat: res_slope.abs() < flat,
            support_flat: sup_slope.abs() < flat,
            resistance_rising: res_slope >= flat,
            resistance_falling: res_slope <= -flat,
            support_rising: sup_slope >= flat,
            support_falling: sup_slope <= -flat,
        }
    }
}

struct Trendlines {
    resistance_slope: f64,
    support_slope: f64,
    resistance_now: f64,
    support_now: f64,
    resistance_flat: bool,
    support_flat: bool,
    resistance_rising: bool,
    resistance_falling: bool,
    support_rising: bool,
    support_falling: bool,
}

fn last_three(points: &[SwingPoint]) -> [SwingPoint; 3] {
    let n = points.len();
    [points[n - 3], points[n - 2], points[n - 1]]
}

fn last_two_separated(points: &[SwingPoint], min_separation: usize) -> Option<(SwingPoint, SwingPoint)> {
    if points.len() < 2 {
        return None;
    }
    let second = points[points.len() - 1];
    // Walk back to the most recent partner far enough away.
    for first in points[..points.len() - 1].iter().rev() {
        if second.index - first.index >= min_separation {
            return Some((*first, second));
        }
    }
    None
}

fn relative_diff(a: f64, b: f64) -> f64 {
    if a.abs() < f64::EPSILON {
        return f64::INFINITY;
    }
    (a - b).abs() / a.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_candles;

    fn pad_flat(data: &mut Vec<(f64, f64, f64, f64)>, n: usize, price: f64) {
        for _ in 0..n {
            data.push((price, price + 0.2, price - 0.2, price));
        }
    }

    #[test]
    fn peaks_and_troughs_are_strict_extrema() {
        let values = [1.0, 2.0, 5.0, 2.0, 1.0, 0.5, 1.0, 2.0];
        let peaks = find_peaks(&values, 2);
        assert_eq!(peaks, vec![SwingPoint { index: 2, value: 5.0 }]);
        let troughs = find_troughs(&values, 2);
        assert_eq!(troughs, vec![SwingPoint { index: 5, value: 0.5 }]);
    }

    #[test]
    fn plateau_is_not_a_strict_peak() {
        let values = [1.0, 3.0, 3.0, 3.0, 1.0, 0.0, 0.0];
        assert!(find_peaks(&values, 2).is_empty());
    }

    #[test]
    fn regression_recovers_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let (slope, intercept) = linear_regression(&values);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 3.0).abs() < 1e-9);
    }

    #[test]
    fn short_history_yields_nothing() {
        let data: Vec<(f64, f64, f64, f64)> = (0..30).map(|_| (100.0, 101.0, 99.0, 100.0)).collect();
        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        assert!(engine.detect_all(&candles).is_empty());
        assert!(engine.detect_support_resistance(&candles).is_empty());
    }

    #[test]
    fn detects_double_bottom() {
        // Two equal troughs at 100, >= 10 candles apart, inside the last 30.
        let mut data = Vec::new();
        pad_flat(&mut data, 28, 106.0);
        // First trough
        data.push((104.0, 104.5, 102.0, 103.0));
        data.push((103.0, 103.5, 100.0, 101.0)); // low 100
        data.push((101.0, 104.0, 101.0, 103.5));
        pad_flat(&mut data, 9, 105.0);
        // Second trough
        data.push((104.0, 104.5, 102.0, 103.0));
        data.push((103.0, 103.5, 100.0, 101.0)); // low 100
        data.push((101.0, 104.0, 101.0, 103.5));
        pad_flat(&mut data, 7, 105.0);

        let candles = make_candles(&data);
        assert!(candles.len() >= 50);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let db = patterns
            .iter()
            .find(|p| p.kind == PatternKind::DoubleBottom)
            .expect("double bottom expected");
        assert_eq!(db.direction, Bias::Bullish);
        assert!((db.confidence - 0.70).abs() < 1e-9);
        assert!((db.level.unwrap() - 100.0).abs() < 0.5);
        assert!(db.target.unwrap() > db.level.unwrap());
    }

    #[test]
    fn detects_double_top() {
        let mut data = Vec::new();
        pad_flat(&mut data, 28, 94.0);
        data.push((96.0, 98.0, 95.5, 97.0));
        data.push((97.0, 100.0, 96.5, 99.0)); // high 100
        data.push((99.0, 99.2, 96.0, 96.5));
        pad_flat(&mut data, 9, 95.0);
        data.push((96.0, 98.0, 95.5, 97.0));
        data.push((97.0, 100.0, 96.5, 99.0)); // high 100
        data.push((99.0, 99.2, 96.0, 96.5));
        pad_flat(&mut data, 7, 95.0);

        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let dt = patterns
            .iter()
            .find(|p| p.kind == PatternKind::DoubleTop)
            .expect("double top expected");
        assert_eq!(dt.direction, Bias::Bearish);
        assert!(dt.target.unwrap() < dt.level.unwrap());
    }

    #[test]
    fn detects_head_and_shoulders() {
        let mut data = Vec::new();
        pad_flat(&mut data, 26, 100.0);
        // Left shoulder peaks at 110
        data.push((100.0, 105.0, 99.0, 104.0));
        data.push((104.0, 110.0, 103.0, 108.0));
        data.push((108.0, 108.5, 101.0, 102.0));
        pad_flat(&mut data, 4, 101.0);
        // Head peaks at 120
        data.push((101.0, 112.0, 100.0, 110.0));
        data.push((110.0, 120.0, 109.0, 118.0));
        data.push((118.0, 118.5, 103.0, 104.0));
        pad_flat(&mut data, 4, 101.0);
        // Right shoulder peaks at 110.5 (within 2% of 110)
        data.push((101.0, 105.0, 100.0, 104.0));
        data.push((104.0, 110.5, 103.0, 108.0));
        data.push((108.0, 108.5, 101.0, 102.0));
        pad_flat(&mut data, 7, 101.0);

        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let hs = patterns
            .iter()
            .find(|p| p.kind == PatternKind::HeadAndShoulders)
            .expect("head and shoulders expected");
        assert_eq!(hs.direction, Bias::Bearish);
        assert!((hs.confidence - 0.75).abs() < 1e-9);
        let neckline = hs.neckline.unwrap();
        assert!((neckline - 110.0).abs() < 1.0);
        // target = head - 2 * (head - neckline)
        assert!((hs.target.unwrap() - (120.0 - 2.0 * (120.0 - neckline))).abs() < 1e-9);
    }

    #[test]
    fn detects_ascending_triangle() {
        // Flat resistance near 110, rising support.
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let support = 100.0 + i as f64 * 0.15;
                let high = 110.0;
                (support, high, support, high - 0.5)
            })
            .collect();
        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let tri = patterns
            .iter()
            .find(|p| p.kind == PatternKind::AscendingTriangle)
            .expect("ascending triangle expected");
        assert_eq!(tri.direction, Bias::Bullish);
        assert!(tri.support.unwrap() < tri.resistance.unwrap());
    }

    #[test]
    fn detects_rising_wedge() {
        // Both lines rising, support faster.
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let low = 100.0 + i as f64 * 0.30;
                let high = 112.0 + i as f64 * 0.12;
                (low, high, low, (low + high) / 2.0)
            })
            .collect();
        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let wedge = patterns
            .iter()
            .find(|p| p.kind == PatternKind::RisingWedge)
            .expect("rising wedge expected");
        assert_eq!(wedge.direction, Bias::Bearish);
    }

    #[test]
    fn detects_bull_flag() {
        let mut data = Vec::new();
        pad_flat(&mut data, 20, 100.0);
        // Pole: strong rally from 100 to 130 over 20 candles
        for i in 0..20 {
            let v = 100.0 + i as f64 * 1.5;
            data.push((v, v + 1.6, v - 0.2, v + 1.5));
        }
        // Consolidation: tight range near 130
        for _ in 0..20 {
            data.push((129.5, 130.5, 129.0, 130.0));
        }
        let candles = make_candles(&data);
        let engine = PatternEngine::new(PatternConfig::default());
        let patterns = engine.detect_all(&candles);

        let flag = patterns
            .iter()
            .find(|p| p.kind == PatternKind::BullFlag)
            .expect("bull flag expected");
        assert_eq!(flag.direction, Bias::Bullish);
        // Measured move projects the pole above the consolidation close.
        assert!(flag.target.unwrap() > 130.0);
    }
}
