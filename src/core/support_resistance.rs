//! Support/resistance levels from clustered high/low touch points.

use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::models::{CandleSeries, LevelKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrLevel {
    pub price: f64,
    /// Touch count backing the level.
    pub strength: usize,
    pub kind: LevelKind,
}

/// Sequential clustering on the sorted high/low points. A point joins the
/// open cluster while it stays within the relative tolerance of the running
/// centroid; clusters with enough touches become levels.
pub fn detect(candles: &CandleSeries, cfg: &PatternConfig) -> Vec<SrLevel> {
    let Some(last_close) = candles.last().map(|c| c.close) else {
        return Vec::new();
    };

    let mut points: Vec<f64> = Vec::with_capacity(candles.len() * 2);
    points.extend(candles.highs());
    points.extend(candles.lows());
    points.sort_by(|a, b| a.partial_cmp(b).expect("finite prices"));

    let mut levels = Vec::new();
    let mut centroid = points[0];
    let mut count = 1usize;

    for &p in &points[1..] {
        if centroid > 0.0 && (p - centroid) / centroid <= cfg.sr_tolerance {
            // Incremental centroid update.
            centroid = (centroid * count as f64 + p) / (count as f64 + 1.0);
            count += 1;
        } else {
            push_level(&mut levels, centroid, count, last_close, cfg);
            centroid = p;
            count = 1;
        }
    }
    push_level(&mut levels, centroid, count, last_close, cfg);

    levels.sort_by(|a, b| b.strength.cmp(&a.strength));
    levels.truncate(cfg.sr_max_levels);
    levels
}

fn push_level(
    levels: &mut Vec<SrLevel>,
    centroid: f64,
    count: usize,
    last_close: f64,
    cfg: &PatternConfig,
) {
    if count < cfg.sr_min_touches {
        return;
    }
    let kind = if centroid < last_close {
        LevelKind::Support
    } else {
        LevelKind::Resistance
    };
    levels.push(SrLevel {
        price: centroid,
        strength: count,
        kind,
    });
}
