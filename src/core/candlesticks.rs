//! Single- and two-bar candlestick patterns, evaluated on the last two
//! candles of the series tail.

use crate::config::PatternConfig;
use crate::core::patterns::Pattern;
use crate::models::{Bias, CandleSeries, PatternKind};

const TAIL: usize = 10;

pub fn detect(candles: &CandleSeries, cfg: &PatternConfig) -> Vec<Pattern> {
    let tail = candles.tail(TAIL);
    if tail.len() < 2 {
        return Vec::new();
    }

    let current = &tail[tail.len() - 1];
    let previous = &tail[tail.len() - 2];
    let mut out = Vec::new();

    let range = current.total_range();
    let body = current.body();

    if range > 0.0 {
        if body < 0.1 * range {
            out.push(single_bar(
                PatternKind::Doji,
                Bias::Neutral,
                cfg.doji_confidence,
                current.close,
                current.timestamp,
            ));
        } else if current.lower_wick() > 2.0 * body && current.upper_wick() < 2.0 * body {
            // Hammer at a low / hanging man at a high: same shape, the
            // reversal read is bullish here.
            out.push(single_bar(
                PatternKind::Hammer,
                Bias::Bullish,
                cfg.hammer_confidence,
                current.close,
                current.timestamp,
            ));
        } else if current.upper_wick() > 2.0 * body && current.lower_wick() < 2.0 * body {
            out.push(single_bar(
                PatternKind::ShootingStar,
                Bias::Bearish,
                cfg.shooting_star_confidence,
                current.close,
                current.timestamp,
            ));
        }
    }

    let opposite_color = (current.is_bullish() && previous.is_bearish())
        || (current.is_bearish() && previous.is_bullish());
    if opposite_color && body > 1.5 * previous.body() {
        let direction = if current.is_bullish() {
            Bias::Bullish
        } else {
            Bias::Bearish
        };
        out.push(single_bar(
            PatternKind::Engulfing,
            direction,
            cfg.engulfing_confidence,
            current.close,
            current.timestamp,
        ));
    }

    out
}

fn single_bar(
    kind: PatternKind,
    direction: Bias,
    confidence: f64,
    close: f64,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Pattern {
    Pattern {
        kind,
        direction,
        confidence,
        neckline: None,
        level: Some(close),
        support: None,
        resistance: None,
        target: None,
        timestamp,
    }
}
