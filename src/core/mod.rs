pub mod candlesticks;
pub mod divergence;
pub mod indicators;
pub mod levels;
pub mod patterns;
pub mod regime;
pub mod support_resistance;
