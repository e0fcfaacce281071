use analysis_core::{AnalysisError, StopLossState, StopLossType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Stop-loss parameters. Percentages are fractions of price (0.10 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Stop distance below the buy/current price when no usable ATR exists
    pub default_stop_percent: Decimal,
    /// ATR multiple for the trailing stop distance
    pub atr_multiplier: Decimal,
    /// Tightest allowed stop distance from the current price
    pub min_stop_percent: Decimal,
    /// Widest allowed stop distance from the current price
    pub max_stop_percent: Decimal,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            default_stop_percent: dec!(0.10),
            atr_multiplier: dec!(2.0),
            min_stop_percent: dec!(0.05),
            max_stop_percent: dec!(0.20),
        }
    }
}

impl StopLossConfig {
    /// Reject invalid risk profiles up front; a bad config is never
    /// silently defaulted.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let percents = [
            ("default_stop_percent", self.default_stop_percent),
            ("min_stop_percent", self.min_stop_percent),
            ("max_stop_percent", self.max_stop_percent),
        ];
        for (name, value) in percents {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return Err(AnalysisError::Configuration(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.min_stop_percent >= self.max_stop_percent {
            return Err(AnalysisError::Configuration(format!(
                "min_stop_percent ({}) must be below max_stop_percent ({})",
                self.min_stop_percent, self.max_stop_percent
            )));
        }
        if self.atr_multiplier <= Decimal::ZERO {
            return Err(AnalysisError::Configuration(format!(
                "atr_multiplier must be positive, got {}",
                self.atr_multiplier
            )));
        }
        Ok(())
    }
}

/// Full record of one stop-loss computation. `should_update` tells the
/// caller whether the recommended stop actually raised the persisted one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossCalculation {
    pub portfolio_id: String,
    pub symbol_id: String,
    pub date: NaiveDate,
    pub current_price: Decimal,
    pub buy_price: Decimal,

    pub initial_stop_loss: Decimal,
    /// Ratcheted stop: max(existing stop, recommended)
    pub current_stop_loss: Decimal,
    pub recommended_stop_loss: Decimal,

    pub atr: Option<Decimal>,
    pub atr_multiplier: Decimal,
    /// Stop distance below the current price, in percent
    pub stop_loss_percent: Decimal,

    pub stop_loss_type: StopLossType,
    pub should_update: bool,
    /// Money at risk if the stop is hit
    pub risk_amount: Decimal,
}

impl StopLossCalculation {
    pub fn to_state(&self) -> StopLossState {
        StopLossState {
            portfolio_id: self.portfolio_id.clone(),
            symbol_id: self.symbol_id.clone(),
            initial_stop_loss: self.initial_stop_loss,
            current_stop_loss: self.current_stop_loss,
            last_updated_date: self.date,
            stop_loss_type: self.stop_loss_type,
            atr_multiplier: self.atr_multiplier,
        }
    }
}

/// A close below the persisted stop level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossViolation {
    pub symbol: String,
    pub current_price: Decimal,
    pub stop_loss: Decimal,
    pub violation_amount: Decimal,
    pub violation_percent: Decimal,
}

/// Per-position failure recorded during a portfolio stop pass
#[derive(Debug, Clone)]
pub struct PositionError {
    pub symbol_id: String,
    pub message: String,
}

/// Outcome of one portfolio-wide stop-loss pass
#[derive(Debug, Clone)]
pub struct PortfolioStopSummary {
    pub portfolio_id: String,
    pub date: NaiveDate,
    pub total_positions: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub calculations: Vec<StopLossCalculation>,
    pub errors: Vec<PositionError>,
}
