use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;

/// One trading day's OHLCV bar for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Exchange a symbol trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Us,
    Tase,
}

impl FromStr for Market {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(Market::Us),
            "TASE" => Ok(Market::Tase),
            other => Err(AnalysisError::Configuration(format!(
                "Unknown market code: {other}"
            ))),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Us => write!(f, "US"),
            Market::Tase => write!(f, "TASE"),
        }
    }
}

/// One (symbol, market) entry of the tracked universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSymbol {
    pub symbol: String,
    pub market: Market,
}

/// Daily technical features for one (symbol, market, date).
///
/// Indicator fields are `None` when the bar history was too short for the
/// indicator's period; an empty bar window yields an all-`None` snapshot.
/// Values are rounded to two decimal places (volume SMA to an integer) when
/// the snapshot is built; nothing downstream re-rounds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub symbol: String,
    pub market: Market,
    pub date: NaiveDate,
    pub close_price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub sma_20: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub ema_12: Option<Decimal>,
    pub ema_26: Option<Decimal>,
    pub rsi_14: Option<Decimal>,
    pub macd: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_histogram: Option<Decimal>,
    pub bb_upper: Option<Decimal>,
    pub bb_middle: Option<Decimal>,
    pub bb_lower: Option<Decimal>,
    pub atr_14: Option<Decimal>,
    pub volume_sma_20: Option<Decimal>,
    pub volume_ratio: Option<Decimal>,
    pub engine_version: String,
}

/// Trading signal for a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Signal {
    /// Ordinal used for upgrade/downgrade comparisons (STRONG_SELL=1 .. STRONG_BUY=5)
    pub fn rank(&self) -> u8 {
        match self {
            Signal::StrongSell => 1,
            Signal::Sell => 2,
            Signal::Hold => 3,
            Signal::Buy => 4,
            Signal::StrongBuy => 5,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Signal::Buy | Signal::StrongBuy)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::StrongSell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::StrongSell => "STRONG_SELL",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::Buy => "BUY",
            Signal::StrongBuy => "STRONG_BUY",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of the close relative to the SMA20
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmaBreakout {
    AboveSma20,
    BelowSma20,
}

/// Position of the close within the Bollinger Bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BbPosition {
    AboveUpper,
    AboveMiddle,
    BelowMiddle,
    BelowLower,
}

/// Day-over-day observations accumulated while scoring a signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetails {
    pub rsi_change: Option<Decimal>,
    pub price_change: Option<Decimal>,
    #[serde(default)]
    pub volume_spike: bool,
    pub sma_breakout: Option<SmaBreakout>,
    pub bb_position: Option<BbPosition>,
}

/// Scored signal for one (symbol, market, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub symbol: String,
    pub market: Market,
    pub date: NaiveDate,
    pub signal: Signal,
    /// 0-100, rounded to the nearest integer
    pub confidence: u8,
    /// Reason strings in rule-evaluation order
    pub reasons: Vec<String>,
    pub change_details: ChangeDetails,
}

/// How the persisted stop level was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopLossType {
    /// Flat percentage below the current price (no usable ATR)
    Percentage,
    AtrTrailing,
    /// ATR stop was wider than the 20% floor and got pulled up to it
    AtrTrailingCapped,
    /// ATR stop was tighter than the 5% ceiling and got pushed down to it
    AtrTrailingMin,
}

/// Persisted stop-loss state for one (portfolio, symbol) position.
///
/// `current_stop_loss` only ever moves up; recomputations that would lower
/// it are discarded by the stop-loss engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossState {
    pub portfolio_id: String,
    pub symbol_id: String,
    pub initial_stop_loss: Decimal,
    pub current_stop_loss: Decimal,
    pub last_updated_date: NaiveDate,
    pub stop_loss_type: StopLossType,
    pub atr_multiplier: Decimal,
}

/// Open position in a portfolio, read-only from the engine's perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub portfolio_id: String,
    pub symbol_id: String,
    pub symbol: String,
    pub market: Market,
    pub quantity: Decimal,
    pub buy_price: Decimal,
}

/// Sector tag assigned to a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorTag {
    pub symbol: String,
    pub market: Market,
    pub sector: String,
}

/// Composite strength of one sector on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorStrength {
    pub sector: String,
    pub market: Option<Market>,
    pub date: NaiveDate,
    pub symbol_count: usize,
    pub avg_rsi: Option<Decimal>,
    /// Average percent distance of close from SMA20
    pub avg_sma20_dist: Option<Decimal>,
    pub avg_vol_ratio: Option<Decimal>,
    /// Symbols with RSI > 60
    pub strong_symbols: usize,
    /// Symbols with RSI < 40
    pub weak_symbols: usize,
    /// Composite score clamped to 0-100
    pub score: Decimal,
    /// 1-based position in the score-descending ordering
    pub rank: u32,
}
