//! Stateless closed-form level computations: Fibonacci retracements,
//! classic pivot points, and a full Ichimoku reading for a candle range.
//! Callable independently of the per-candle indicator loop.

use serde::{Deserialize, Serialize};

use crate::models::CandleSeries;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibLevels {
    pub high: f64,
    pub low: f64,
    pub level_236: f64,
    pub level_382: f64,
    pub level_500: f64,
    pub level_618: f64,
    pub level_786: f64,
}

/// Retracement levels measured down from the range high.
pub fn fibonacci_retracement(high: f64, low: f64) -> FibLevels {
    let range = high - low;
    FibLevels {
        high,
        low,
        level_236: high - range * 0.236,
        level_382: high - range * 0.382,
        level_500: high - range * 0.5,
        level_618: high - range * 0.618,
        level_786: high - range * 0.786,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

/// Classic floor-trader pivots from the prior period's high/low/close.
pub fn pivot_points(high: f64, low: f64, close: f64) -> PivotPoints {
    let pivot = (high + low + close) / 3.0;
    let range = high - low;
    PivotPoints {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + range,
        r3: high + 2.0 * (pivot - low),
        s1: 2.0 * pivot - high,
        s2: pivot - range,
        s3: low - 2.0 * (high - pivot),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IchimokuLevels {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
    pub chikou: f64,
}

/// Ichimoku components over the tail of `candles`. Needs at least
/// `senkou_b_period` candles; fewer returns None.
pub fn ichimoku(
    candles: &CandleSeries,
    tenkan_period: usize,
    kijun_period: usize,
    senkou_b_period: usize,
) -> Option<IchimokuLevels> {
    if candles.len() < senkou_b_period {
        return None;
    }

    let midpoint = |period: usize| {
        let window = candles.tail(period);
        (window.highs_max() + window.lows_min()) / 2.0
    };

    let tenkan = midpoint(tenkan_period);
    let kijun = midpoint(kijun_period);
    Some(IchimokuLevels {
        tenkan,
        kijun,
        senkou_a: (tenkan + kijun) / 2.0,
        senkou_b: midpoint(senkou_b_period),
        chikou: candles.last()?.close,
    })
}
