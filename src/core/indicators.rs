//! Per-candle technical indicator computation.
//!
//! Pure computation: OHLCV in, index-aligned snapshots out. A field is
//! present only once its lookback window is satisfied; short history means
//! absence, not a neutral default, so downstream scoring never mistakes
//! "no data" for "no signal".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::models::CandleSeries;

const EPSILON: f64 = 1e-10;

/// One snapshot per candle index. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema9: Option<f64>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    /// Position of the close within [lower, upper]. Can leave [0, 1] on a
    /// band breakout; callers treat out-of-range as "beyond band".
    pub bollinger_position: Option<f64>,
    pub stochastic_k: Option<f64>,
    pub stochastic_d: Option<f64>,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    pub volume_ma: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub obv: Option<f64>,
    pub mfi: Option<f64>,
    pub ichimoku: Option<IchimokuSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IchimokuSnapshot {
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    pub senkou_a: Option<f64>,
    pub senkou_b: Option<f64>,
}

struct CacheEntry {
    len: usize,
    last_ts: DateTime<Utc>,
    snapshots: Vec<IndicatorSnapshot>,
}

/// Computes the full indicator set for a candle series.
///
/// Memoizes the last result keyed by (length, latest timestamp) so repeated
/// calls on an unchanged series are free; an appended candle invalidates the
/// entry and forces a full recompute, which is bit-identical to computing
/// from scratch.
pub struct IndicatorEngine {
    cfg: IndicatorConfig,
    cache: Option<CacheEntry>,
}

impl IndicatorEngine {
    pub fn new(cfg: IndicatorConfig) -> Self {
        Self { cfg, cache: None }
    }

    pub fn compute_all(&mut self, candles: &CandleSeries) -> Vec<IndicatorSnapshot> {
        if let Some(entry) = &self.cache {
            if entry.len == candles.len()
                && candles.last().map(|c| c.timestamp) == Some(entry.last_ts)
            {
                return entry.snapshots.clone();
            }
        }

        let snapshots = self.compute(candles);

        if let Some(last) = candles.last() {
            self.cache = Some(CacheEntry {
                len: candles.len(),
                last_ts: last.timestamp,
                snapshots: snapshots.clone(),
            });
        }

        snapshots
    }

    fn compute(&self, candles: &CandleSeries) -> Vec<IndicatorSnapshot> {
        let cfg = &self.cfg;
        let n = candles.len();
        let closes = candles.closes();
        let volumes = candles.volumes();

        let ema9 = ema(&closes, cfg.ema_fast);
        let ema20 = ema(&closes, cfg.ema_mid);
        let ema50 = ema(&closes, cfg.ema_slow);
        let rsi = rsi_series(&closes, cfg.rsi_period);
        let (macd_line, macd_sig) =
            macd_series(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let obv = obv_series(candles);

        let mut snapshots = Vec::with_capacity(n);
        let mut stoch_k_history: Vec<f64> = Vec::with_capacity(n);

        for i in 0..n {
            let mut snap = IndicatorSnapshot {
                ema9: aligned(&ema9, cfg.ema_fast, i),
                ema20: aligned(&ema20, cfg.ema_mid, i),
                ema50: aligned(&ema50, cfg.ema_slow, i),
                sma20: window_mean(&closes, cfg.sma_short, i),
                sma50: window_mean(&closes, cfg.sma_mid, i),
                sma200: window_mean(&closes, cfg.sma_long, i),
                // RSI/ATR/MFI need one prior close on top of the period.
                rsi: if i >= cfg.rsi_period {
                    Some(rsi[i - cfg.rsi_period])
                } else {
                    None
                },
                macd: aligned(&macd_line, cfg.macd_slow, i),
                macd_signal: aligned(&macd_sig, cfg.macd_slow + cfg.macd_signal - 1, i),
                obv: Some(obv[i]),
                ..Default::default()
            };
            snap.macd_histogram = match (snap.macd, snap.macd_signal) {
                (Some(m), Some(s)) => Some(m - s),
                _ => None,
            };

            if i + 1 >= cfg.bollinger_period {
                let (upper, middle, lower, position) =
                    bollinger_at(&closes, cfg.bollinger_period, cfg.bollinger_k, i);
                snap.bollinger_upper = Some(upper);
                snap.bollinger_middle = Some(middle);
                snap.bollinger_lower = Some(lower);
                snap.bollinger_position = Some(position);
            }

            if i + 1 >= cfg.stochastic_period {
                let k = stochastic_k_at(candles, cfg.stochastic_period, i);
                stoch_k_history.push(k);
                snap.stochastic_k = Some(k);
                // Single-sample %D when fewer than `smooth` %K values exist;
                // a documented simplification.
                let avail = stoch_k_history.len().min(cfg.stochastic_smooth);
                let d: f64 = stoch_k_history[stoch_k_history.len() - avail..]
                    .iter()
                    .sum::<f64>()
                    / avail as f64;
                snap.stochastic_d = Some(d);
            }

            if i >= cfg.atr_period {
                snap.atr = Some(atr_at(candles, cfg.atr_period, i));
            }
            if i >= cfg.adx_period {
                snap.adx = Some(adx_at(candles, cfg.adx_period, i));
            }
            if i >= cfg.mfi_period {
                snap.mfi = Some(mfi_at(candles, cfg.mfi_period, i));
            }

            if let Some(ma) = window_mean(&volumes, cfg.volume_period, i) {
                snap.volume_ma = Some(ma);
                if ma > EPSILON {
                    snap.volume_ratio = Some(volumes[i] / ma);
                }
            }

            let tenkan = midpoint_at(candles, cfg.tenkan_period, i);
            let kijun = midpoint_at(candles, cfg.kijun_period, i);
            let senkou_a = match (tenkan, kijun) {
                (Some(t), Some(k)) => Some((t + k) / 2.0),
                _ => None,
            };
            let senkou_b = midpoint_at(candles, cfg.senkou_b_period, i);
            if tenkan.is_some() {
                snap.ichimoku = Some(IchimokuSnapshot {
                    tenkan,
                    kijun,
                    senkou_a,
                    senkou_b,
                });
            }

            snapshots.push(snap);
        }

        snapshots
    }
}

/// Value from a compact seeded series, aligned back to candle index `i`.
/// The first series element corresponds to candle index `period - 1`.
fn aligned(series: &[f64], period: usize, i: usize) -> Option<f64> {
    if i + 1 >= period {
        series.get(i + 1 - period).copied()
    } else {
        None
    }
}

fn window_mean(values: &[f64], period: usize, i: usize) -> Option<f64> {
    if period == 0 || i + 1 < period {
        return None;
    }
    let window = &values[i + 1 - period..=i];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Simple moving average over each full window. Output length is
/// `values.len() - period + 1`; empty when there is insufficient data.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, then `ema = (value - ema) * k + ema` with `k = 2 / (period + 1)`.
/// Output length is `values.len() - period + 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut current = seed;
    for &v in &values[period..] {
        current = (v - current) * k + current;
        out.push(current);
    }
    out
}

/// Wilder-smoothed RSI. First output corresponds to input index `period`
/// (one prior close is needed per change); output length is
/// `values.len() - period`.
pub fn rsi_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return Vec::new();
    }
    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period]
        .iter()
        .map(|&c| c.max(0.0))
        .sum::<f64>()
        / period as f64;
    let mut avg_loss = changes[..period]
        .iter()
        .map(|&c| (-c).max(0.0))
        .sum::<f64>()
        / period as f64;

    let mut out = Vec::with_capacity(changes.len() - period + 1);
    out.push(rsi_value(avg_gain, avg_loss));

    let p = period as f64;
    for &c in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = avg_gain / avg_loss.max(EPSILON);
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line (fast EMA - slow EMA) and its signal EMA, both as compact
/// series. The line starts at input index `slow - 1`, the signal at
/// `slow + signal - 2`.
pub fn macd_series(values: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    if values.len() < slow {
        return (Vec::new(), Vec::new());
    }
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let offset = slow - fast;

    let line: Vec<f64> = (0..slow_ema.len())
        .map(|i| fast_ema[i + offset] - slow_ema[i])
        .collect();
    let sig = ema(&line, signal);
    (line, sig)
}

fn bollinger_at(closes: &[f64], period: usize, k: f64, i: usize) -> (f64, f64, f64, f64) {
    let window = &closes[i + 1 - period..=i];
    let middle = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    let upper = middle + k * std;
    let lower = middle - k * std;

    let width = upper - lower;
    let position = if width > EPSILON {
        (closes[i] - lower) / width
    } else {
        0.5
    };
    (upper, middle, lower, position)
}

fn stochastic_k_at(candles: &CandleSeries, period: usize, i: usize) -> f64 {
    let window = candles.slice(i + 1 - period, i + 1);
    let highest = window.highs_max();
    let lowest = window.lows_min();
    let range = (highest - lowest).max(EPSILON);
    (candles[i].close - lowest) / range * 100.0
}

fn true_range(candles: &CandleSeries, i: usize) -> f64 {
    let hl = candles[i].high - candles[i].low;
    if i == 0 {
        return hl;
    }
    let hc = (candles[i].high - candles[i - 1].close).abs();
    let lc = (candles[i].low - candles[i - 1].close).abs();
    hl.max(hc).max(lc)
}

fn atr_at(candles: &CandleSeries, period: usize, i: usize) -> f64 {
    let start = i + 1 - period;
    (start..=i).map(|j| true_range(candles, j)).sum::<f64>() / period as f64
}

/// Simplified directional-strength index: |+DI - -DI| / (+DI + -DI) scaled
/// 0-100. Not the fully smoothed Wilder ADX; internally consistent only.
fn adx_at(candles: &CandleSeries, period: usize, i: usize) -> f64 {
    let start = i + 1 - period;
    let mut plus_dm = 0.0;
    let mut minus_dm = 0.0;
    let mut tr_sum = 0.0;

    for j in start..=i {
        let up = candles[j].high - candles[j - 1].high;
        let down = candles[j - 1].low - candles[j].low;
        if up > down && up > 0.0 {
            plus_dm += up;
        }
        if down > up && down > 0.0 {
            minus_dm += down;
        }
        tr_sum += true_range(candles, j);
    }

    if tr_sum < EPSILON {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr_sum;
    let minus_di = 100.0 * minus_dm / tr_sum;
    let di_sum = plus_di + minus_di;
    if di_sum < EPSILON {
        return 0.0;
    }
    100.0 * (plus_di - minus_di).abs() / di_sum
}

/// On-balance volume: cumulative, += volume on a close increase, -= on a
/// decrease, carried forward on a tie.
fn obv_series(candles: &CandleSeries) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for i in 0..candles.len() {
        if i > 0 {
            if candles[i].close > candles[i - 1].close {
                total += candles[i].volume;
            } else if candles[i].close < candles[i - 1].close {
                total -= candles[i].volume;
            }
        }
        out.push(total);
    }
    out
}

fn mfi_at(candles: &CandleSeries, period: usize, i: usize) -> f64 {
    let start = i + 1 - period;
    let mut positive = 0.0;
    let mut negative = 0.0;

    for j in start..=i {
        let tp = candles[j].typical_price();
        let prev_tp = candles[j - 1].typical_price();
        let flow = tp * candles[j].volume;
        if tp > prev_tp {
            positive += flow;
        } else if tp < prev_tp {
            negative += flow;
        }
    }

    let ratio = positive / negative.max(EPSILON);
    100.0 - 100.0 / (1.0 + ratio)
}

/// Ichimoku-style midpoint: (highest high + lowest low) / 2 over the window.
fn midpoint_at(candles: &CandleSeries, period: usize, i: usize) -> Option<f64> {
    if i + 1 < period {
        return None;
    }
    let window = candles.slice(i + 1 - period, i + 1);
    Some((window.highs_max() + window.lows_min()) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_candles, make_candles_with_volume};

    fn flat_closes(n: usize, v: f64) -> Vec<f64> {
        vec![v; n]
    }

    #[test]
    fn sma_known_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn ema_seeded_with_sma() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let out = ema(&values, 3);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 2.0).abs() < 1e-12);
        // k = 0.5: (4 - 2) * 0.5 + 2 = 3
        assert!((out[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ema_is_deterministic() {
        let values: Vec<f64> = (0..100).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let a = ema(&values, 20);
        let b = ema(&values, 20);
        assert_eq!(a, b);
    }

    #[test]
    fn ema_insufficient_data_is_empty() {
        assert!(ema(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn rsi_all_gains_saturates_high() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = rsi_series(&values, 14);
        assert!(!out.is_empty());
        for v in &out {
            assert!(*v > 99.9, "expected saturation, got {}", v);
            assert!(*v <= 100.0);
        }
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let out = rsi_series(&values, 14);
        assert!(!out.is_empty());
        for v in &out {
            assert!((*v - 0.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rsi_stays_in_bounds() {
        let values: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 1.3).sin() * 7.0)
            .collect();
        for v in rsi_series(&values, 14) {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn macd_line_matches_ema_difference() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (line, signal) = macd_series(&values, 12, 26, 9);
        assert_eq!(line.len(), values.len() - 25);
        assert!(!signal.is_empty());

        let fast = ema(&values, 12);
        let slow = ema(&values, 26);
        let expected = fast.last().unwrap() - slow.last().unwrap();
        assert!((line.last().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn snapshot_count_matches_candles() {
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let v = 100.0 + i as f64;
                (v, v + 1.0, v - 1.0, v + 0.5)
            })
            .collect();
        let candles = make_candles(&data);
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());
        let snaps = engine.compute_all(&candles);
        assert_eq!(snaps.len(), 60);
    }

    #[test]
    fn fields_absent_until_lookback_satisfied() {
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let v = 100.0 + (i as f64 * 0.9).sin() * 3.0;
                (v, v + 1.0, v - 1.0, v + 0.2)
            })
            .collect();
        let candles = make_candles(&data);
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());
        let snaps = engine.compute_all(&candles);

        // ema9 appears exactly at index 8
        assert!(snaps[7].ema9.is_none());
        assert!(snaps[8].ema9.is_some());
        // sma20 / bollinger at index 19
        assert!(snaps[18].sma20.is_none());
        assert!(snaps[19].sma20.is_some());
        assert!(snaps[18].bollinger_middle.is_none());
        assert!(snaps[19].bollinger_middle.is_some());
        // rsi needs 14 changes, so index 14
        assert!(snaps[13].rsi.is_none());
        assert!(snaps[14].rsi.is_some());
        // macd line at 25, signal at 33
        assert!(snaps[24].macd.is_none());
        assert!(snaps[25].macd.is_some());
        assert!(snaps[32].macd_signal.is_none());
        assert!(snaps[33].macd_signal.is_some());
        assert!(snaps[33].macd_histogram.is_some());
        // sma200 never appears in 60 candles
        assert!(snaps.iter().all(|s| s.sma200.is_none()));
        // obv always present
        assert!(snaps.iter().all(|s| s.obv.is_some()));
    }

    #[test]
    fn bollinger_position_can_exceed_one_on_breakout() {
        let mut closes = flat_closes(20, 100.0);
        closes[19] = 130.0; // hard breakout above the band
        let (_, _, _, position) = bollinger_at(&closes, 20, 2.0, 19);
        assert!(position > 1.0, "breakout should sit beyond the band: {}", position);
    }

    #[test]
    fn bollinger_zero_width_defaults_to_middle() {
        let closes = flat_closes(20, 100.0);
        let (_, _, _, position) = bollinger_at(&closes, 20, 2.0, 19);
        assert!((position - 0.5).abs() < 1e-12);
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let candles = make_candles_with_volume(&[
            (100.0, 101.0, 99.0, 100.0, 10.0),
            (100.0, 102.0, 99.0, 101.0, 20.0), // up: +20
            (101.0, 102.0, 99.0, 100.0, 30.0), // down: -30
            (100.0, 102.0, 99.0, 100.0, 40.0), // tie: carry
        ]);
        let out = obv_series(&candles);
        assert_eq!(out, vec![0.0, 20.0, -10.0, -10.0]);
    }

    #[test]
    fn stochastic_k_range_guarded() {
        let data: Vec<(f64, f64, f64, f64)> = (0..20).map(|_| (100.0, 100.0, 100.0, 100.0)).collect();
        let candles = make_candles(&data);
        let k = stochastic_k_at(&candles, 14, 19);
        assert!(k.is_finite());
    }

    #[test]
    fn cache_refreshes_when_series_grows() {
        let data: Vec<(f64, f64, f64, f64)> = (0..60)
            .map(|i| {
                let v = 100.0 + i as f64 * 0.5;
                (v, v + 1.0, v - 1.0, v + 0.3)
            })
            .collect();
        let mut candles = make_candles(&data);
        let mut engine = IndicatorEngine::new(IndicatorConfig::default());

        let first = engine.compute_all(&candles);
        let second = engine.compute_all(&candles);
        assert_eq!(first, second);

        let mut extra = candles[59].clone();
        extra.timestamp = extra.timestamp + chrono::Duration::minutes(1);
        extra.close += 1.0;
        candles.push(extra);

        let third = engine.compute_all(&candles);
        assert_eq!(third.len(), 61);
        // A full recompute of the grown series must agree with the cached call.
        let mut fresh = IndicatorEngine::new(IndicatorConfig::default());
        assert_eq!(third, fresh.compute_all(&candles));
    }
}
