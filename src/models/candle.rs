use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn total_range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> f64 {
        self.close.min(self.open) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Typical price, the basis of money-flow style indicators.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Wraps Vec<Candle> with the slicing/extrema helpers the engines need.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries::new(self.candles[start..].to_vec())
    }

    pub fn slice(&self, start: usize, end: usize) -> CandleSeries {
        let s = start.min(self.candles.len());
        let e = end.min(self.candles.len());
        CandleSeries::new(self.candles[s..e].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn highs_max(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn lows_min(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn push(&mut self, candle: Candle) {
        self.candles.push(candle);
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_candles;

    fn bullish_candle() -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: 100.0,
            high: 115.0,
            low: 95.0,
            close: 110.0,
            volume: 50.0,
        }
    }

    fn bearish_candle() -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: 110.0,
            high: 115.0,
            low: 95.0,
            close: 100.0,
            volume: 50.0,
        }
    }

    #[test]
    fn candle_body_and_range() {
        let c = bullish_candle();
        assert!((c.body() - 10.0).abs() < 1e-9);
        assert!((c.total_range() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn candle_wicks() {
        let c = bullish_candle(); // O=100, H=115, L=95, C=110
        assert!((c.upper_wick() - 5.0).abs() < 1e-9); // 115 - 110
        assert!((c.lower_wick() - 5.0).abs() < 1e-9); // 100 - 95
    }

    #[test]
    fn candle_bullish_bearish() {
        assert!(bullish_candle().is_bullish());
        assert!(!bullish_candle().is_bearish());
        assert!(bearish_candle().is_bearish());
        assert!(!bearish_candle().is_bullish());
    }

    #[test]
    fn candle_typical_price() {
        let c = bullish_candle();
        assert!((c.typical_price() - (115.0 + 95.0 + 110.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn series_len_tail_slice() {
        let s = make_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 112.0, 104.0, 110.0),
        ]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());

        let tail = s.tail(2);
        assert_eq!(tail.len(), 2);
        assert!((tail[0].open - 102.0).abs() < 1e-9);

        let slice = s.slice(1, 3);
        assert_eq!(slice.len(), 2);
    }

    #[test]
    fn series_highs_max_lows_min() {
        let s = make_candles(&[
            (100.0, 200.0, 50.0, 150.0),
            (150.0, 300.0, 80.0, 250.0),
            (250.0, 280.0, 60.0, 270.0),
        ]);
        assert!((s.highs_max() - 300.0).abs() < 1e-9);
        assert!((s.lows_min() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn series_column_extraction() {
        let s = make_candles(&[(100.0, 105.0, 95.0, 102.0), (102.0, 108.0, 100.0, 106.0)]);
        assert_eq!(s.closes(), vec![102.0, 106.0]);
        assert_eq!(s.highs(), vec![105.0, 108.0]);
        assert_eq!(s.lows(), vec![95.0, 100.0]);
        assert_eq!(s.volumes(), vec![100.0, 100.0]);
    }
}
