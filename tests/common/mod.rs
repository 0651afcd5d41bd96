use candlescope::models::{Candle, CandleSeries};
use chrono::{DateTime, Duration, Utc};

/// Create candles from (open, high, low, close, volume) tuples with
/// auto-incrementing 1m timestamps.
pub fn make_candles_with_volume(data: &[(f64, f64, f64, f64, f64)]) -> CandleSeries {
    let base = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Candle {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        })
        .collect();

    CandleSeries::new(candles)
}

/// Steady compounding uptrend with a volume pickup over the final candles.
/// Rises ~0.4% per candle, which is enough net trend over any 20-candle
/// window to register as trending.
pub fn make_trending_market(n: usize) -> CandleSeries {
    let data: Vec<(f64, f64, f64, f64, f64)> = (0..n)
        .map(|i| {
            let close = 100.0 * (1.004f64).powi(i as i32);
            let open = close / 1.002;
            let volume = if i + 5 >= n { 150.0 } else { 100.0 };
            (open, close * 1.002, open * 0.998, close, volume)
        })
        .collect();
    make_candles_with_volume(&data)
}
