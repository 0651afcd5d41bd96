use serde::{Deserialize, Serialize};

/// Lookback periods for the indicator engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub sma_short: usize,
    pub sma_mid: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub stochastic_period: usize,
    pub stochastic_smooth: usize,
    pub adx_period: usize,
    pub atr_period: usize,
    pub volume_period: usize,
    pub mfi_period: usize,
    pub tenkan_period: usize,
    pub kijun_period: usize,
    pub senkou_b_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_mid: 20,
            ema_slow: 50,
            sma_short: 20,
            sma_mid: 50,
            sma_long: 200,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
            stochastic_period: 14,
            stochastic_smooth: 3,
            adx_period: 14,
            atr_period: 14,
            volume_period: 20,
            mfi_period: 14,
            tenkan_period: 9,
            kijun_period: 26,
            senkou_b_period: 52,
        }
    }
}

/// Window sizes, tolerances, and fixed confidences for pattern detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Minimum candles before any detector runs.
    pub min_candles: usize,
    /// Symmetric radius for the swing high/low primitive.
    pub swing_radius: usize,
    pub hs_window: usize,
    pub hs_shoulder_tolerance: f64,
    pub hs_confidence: f64,
    pub double_window: usize,
    pub double_tolerance: f64,
    pub double_min_separation: usize,
    pub double_confidence: f64,
    pub trendline_window: usize,
    /// Relative per-bar slope below which a trendline counts as flat.
    pub flat_slope: f64,
    pub triangle_confidence: f64,
    pub symmetrical_confidence: f64,
    pub flag_window: usize,
    pub flag_pole_min_move: f64,
    pub flag_max_consolidation: f64,
    pub flag_confidence: f64,
    pub wedge_confidence: f64,
    pub hammer_confidence: f64,
    pub shooting_star_confidence: f64,
    pub doji_confidence: f64,
    pub engulfing_confidence: f64,
    pub sr_tolerance: f64,
    pub sr_min_touches: usize,
    pub sr_max_levels: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            swing_radius: 5,
            hs_window: 40,
            hs_shoulder_tolerance: 0.02,
            hs_confidence: 0.75,
            double_window: 30,
            double_tolerance: 0.015,
            double_min_separation: 10,
            double_confidence: 0.70,
            trendline_window: 40,
            flat_slope: 0.0005,
            triangle_confidence: 0.65,
            symmetrical_confidence: 0.60,
            flag_window: 20,
            flag_pole_min_move: 0.5,
            flag_max_consolidation: 0.3,
            flag_confidence: 0.70,
            wedge_confidence: 0.65,
            hammer_confidence: 0.60,
            shooting_star_confidence: 0.60,
            doji_confidence: 0.50,
            engulfing_confidence: 0.65,
            sr_tolerance: 0.005,
            sr_min_touches: 3,
            sr_max_levels: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceConfig {
    pub periods: usize,
    pub swing_radius: usize,
    /// Fixed strength reported for any hit; a documented simplification.
    pub strength: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            periods: 20,
            swing_radius: 2,
            strength: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    pub return_window: usize,
    pub volume_recent: usize,
    pub volume_baseline: usize,
    pub volatile_threshold: f64,
    pub volatile_volume_trend: f64,
    pub trend_threshold: f64,
    pub trend_volume_trend: f64,
    pub quiet_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            return_window: 20,
            volume_recent: 5,
            volume_baseline: 10,
            volatile_threshold: 0.03,
            volatile_volume_trend: 1.2,
            trend_threshold: 0.02,
            trend_volume_trend: 1.0,
            quiet_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    pub min_confidence: f64,
    /// Strategy confidences never reach certainty.
    pub max_confidence: f64,
    pub history_cap: usize,
    pub atr_stop_mult: f64,
    pub atr_target_mult: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bollinger_extreme: f64,
    pub reversion_stop_pct: f64,
    pub reversion_target_pct: f64,
    pub breakout_window: usize,
    pub breakout_margin: f64,
    pub breakout_volume_ratio: f64,
    pub breakout_stop_pct: f64,
    pub pattern_stop_pct: f64,
    pub divergence_stop_pct: f64,
    pub divergence_target_pct: f64,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.60,
            max_confidence: 0.95,
            history_cap: 100,
            atr_stop_mult: 2.0,
            atr_target_mult: 4.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            bollinger_extreme: 0.1,
            reversion_stop_pct: 0.015,
            reversion_target_pct: 0.02,
            breakout_window: 20,
            breakout_margin: 0.001,
            breakout_volume_ratio: 1.5,
            breakout_stop_pct: 0.005,
            pattern_stop_pct: 0.02,
            divergence_stop_pct: 0.02,
            divergence_target_pct: 0.04,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Per-side exchange fee, used for the break-even price.
    pub fee_rate: f64,
    pub min_risk_reward: f64,
    pub max_stop_percent: f64,
    pub max_leverage: f64,
    pub min_confidence: f64,
    pub overheat_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            min_risk_reward: 1.5,
            max_stop_percent: 3.0,
            max_leverage: 10.0,
            min_confidence: 0.65,
            overheat_threshold: 5.0,
        }
    }
}
