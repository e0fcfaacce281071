use std::sync::Arc;

use analysis_core::decimal::round2_dec;
use analysis_core::{
    AnalysisError, Position, PositionReader, SnapshotStore, StopLossType, StopStateStore,
    StopLossState,
};
use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::models::{
    PortfolioStopSummary, PositionError, StopLossCalculation, StopLossConfig, StopLossViolation,
};

/// Compute the stop level for one position.
///
/// With a usable ATR the stop trails at `current_price - atr * multiplier`,
/// clamped so the stop distance stays within
/// [min_stop_percent, max_stop_percent] of the current price. Without one it
/// falls back to a flat percentage stop.
///
/// The persisted stop is a ratchet: `current_stop_loss` is the max of the
/// existing stop and the recommendation, and `should_update` is true only
/// when the recommendation actually raises it. A lower recommendation is
/// discarded, never written.
pub fn compute_stop(
    config: &StopLossConfig,
    position: &Position,
    date: NaiveDate,
    current_price: Decimal,
    atr: Option<Decimal>,
    existing: Option<&StopLossState>,
) -> StopLossCalculation {
    let initial_stop_loss = match existing {
        Some(state) => state.initial_stop_loss,
        None => position.buy_price * (Decimal::ONE - config.default_stop_percent),
    };

    let (recommended, stop_loss_type, atr_multiplier) = match atr {
        Some(atr_value) if atr_value > Decimal::ZERO => {
            let mut recommended = current_price - atr_value * config.atr_multiplier;
            let mut stop_type = StopLossType::AtrTrailing;

            let widest = current_price * (Decimal::ONE - config.max_stop_percent);
            let tightest = current_price * (Decimal::ONE - config.min_stop_percent);
            if recommended < widest {
                recommended = widest;
                stop_type = StopLossType::AtrTrailingCapped;
            } else if recommended > tightest {
                recommended = tightest;
                stop_type = StopLossType::AtrTrailingMin;
            }
            (recommended, stop_type, config.atr_multiplier)
        }
        _ => (
            current_price * (Decimal::ONE - config.default_stop_percent),
            StopLossType::Percentage,
            Decimal::ZERO,
        ),
    };

    let (current_stop_loss, should_update) = match existing {
        Some(state) => (
            state.current_stop_loss.max(recommended),
            recommended > state.current_stop_loss,
        ),
        // First calculation: start from the higher of the initial and
        // recommended stops, and always persist.
        None => (initial_stop_loss.max(recommended), true),
    };

    let stop_loss_percent = if current_price.is_zero() {
        Decimal::ZERO
    } else {
        (current_price - current_stop_loss) / current_price * Decimal::ONE_HUNDRED
    };
    let risk_amount = (current_price - current_stop_loss) * position.quantity;

    StopLossCalculation {
        portfolio_id: position.portfolio_id.clone(),
        symbol_id: position.symbol_id.clone(),
        date,
        current_price,
        buy_price: position.buy_price,
        initial_stop_loss: round2_dec(initial_stop_loss),
        current_stop_loss: round2_dec(current_stop_loss),
        recommended_stop_loss: round2_dec(recommended),
        atr,
        atr_multiplier,
        stop_loss_percent: round2_dec(stop_loss_percent),
        stop_loss_type,
        should_update,
        risk_amount: round2_dec(risk_amount),
    }
}

/// Recomputes and persists per-position stop state.
///
/// Writes for the same (portfolio, symbol) key are serialized through a
/// per-key mutex, so two concurrent recomputations can never race the
/// read-modify-write and regress the ratchet.
pub struct StopLossEngine {
    config: StopLossConfig,
    positions: Arc<dyn PositionReader>,
    snapshots: Arc<dyn SnapshotStore>,
    store: Arc<dyn StopStateStore>,
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl StopLossEngine {
    pub fn new(
        config: StopLossConfig,
        positions: Arc<dyn PositionReader>,
        snapshots: Arc<dyn SnapshotStore>,
        store: Arc<dyn StopStateStore>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            positions,
            snapshots,
            store,
            locks: DashMap::new(),
        })
    }

    fn position_lock(&self, portfolio_id: &str, symbol_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry((portfolio_id.to_string(), symbol_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Recompute one position's stop from the day's snapshot and persist it
    /// if the recommendation raised the stored stop.
    pub async fn recompute_position(
        &self,
        portfolio_id: &str,
        symbol_id: &str,
        date: NaiveDate,
    ) -> Result<StopLossCalculation, AnalysisError> {
        let position = self
            .positions
            .position(portfolio_id, symbol_id)
            .await?
            .ok_or_else(|| {
                AnalysisError::NotFound(format!(
                    "Position {symbol_id} not found in portfolio {portfolio_id}"
                ))
            })?;

        let snapshot = self
            .snapshots
            .get_snapshot(&position.symbol, position.market, date)
            .await?
            .ok_or_else(|| {
                AnalysisError::NotFound(format!(
                    "No features for {} ({}) on {date}",
                    position.symbol, position.market
                ))
            })?;

        let current_price = snapshot.close_price.ok_or_else(|| {
            AnalysisError::InsufficientData(format!(
                "No close price for {} on {date}",
                position.symbol
            ))
        })?;

        let lock = self.position_lock(portfolio_id, symbol_id);
        let _guard = lock.lock().await;

        let existing = self.store.get_stop_state(portfolio_id, symbol_id).await?;
        let calculation = compute_stop(
            &self.config,
            &position,
            date,
            current_price,
            snapshot.atr_14,
            existing.as_ref(),
        );

        if calculation.should_update {
            self.store.put_stop_state(&calculation.to_state()).await?;
            tracing::info!(
                "Updated stop-loss for {}: {} ({}% below current price)",
                position.symbol,
                calculation.current_stop_loss,
                calculation.stop_loss_percent
            );
        } else {
            tracing::debug!(
                "No update needed for {} (stop already at {})",
                position.symbol,
                calculation.current_stop_loss
            );
        }

        Ok(calculation)
    }

    /// Recompute stops for every position in the portfolio. Per-position
    /// failures are collected; the pass never aborts.
    pub async fn update_portfolio(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<PortfolioStopSummary, AnalysisError> {
        tracing::info!("Updating stop-losses for portfolio {portfolio_id} on {date}");

        let positions = self.positions.positions_for_portfolio(portfolio_id).await?;

        let mut summary = PortfolioStopSummary {
            portfolio_id: portfolio_id.to_string(),
            date,
            total_positions: positions.len(),
            updated: 0,
            unchanged: 0,
            calculations: Vec::new(),
            errors: Vec::new(),
        };

        for position in &positions {
            match self
                .recompute_position(portfolio_id, &position.symbol_id, date)
                .await
            {
                Ok(calculation) => {
                    if calculation.should_update {
                        summary.updated += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                    summary.calculations.push(calculation);
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to calculate stop-loss for {}: {err}",
                        position.symbol
                    );
                    summary.errors.push(PositionError {
                        symbol_id: position.symbol_id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Portfolio {portfolio_id}: {} stops updated, {} unchanged",
            summary.updated,
            summary.unchanged
        );
        Ok(summary)
    }

    /// Read-only check of persisted stops against the day's closes. A close
    /// below the stop is reported, never acted on; exiting the position is
    /// the caller's decision.
    pub async fn check_violations(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<StopLossViolation>, AnalysisError> {
        let states = self.store.stop_states_for_portfolio(portfolio_id).await?;
        let mut violations = Vec::new();

        for state in states {
            let Some(position) = self
                .positions
                .position(portfolio_id, &state.symbol_id)
                .await?
            else {
                continue;
            };
            let Some(snapshot) = self
                .snapshots
                .get_snapshot(&position.symbol, position.market, date)
                .await?
            else {
                continue;
            };
            let Some(price) = snapshot.close_price else {
                continue;
            };

            if price < state.current_stop_loss {
                let amount = state.current_stop_loss - price;
                let percent = amount / state.current_stop_loss * Decimal::ONE_HUNDRED;
                tracing::warn!(
                    "STOP LOSS VIOLATED: {} @ {price} (stop: {}, violation: {percent:.2}%)",
                    position.symbol,
                    state.current_stop_loss
                );
                violations.push(StopLossViolation {
                    symbol: position.symbol.clone(),
                    current_price: price,
                    stop_loss: state.current_stop_loss,
                    violation_amount: round2_dec(amount),
                    violation_percent: round2_dec(percent),
                });
            }
        }

        Ok(violations)
    }
}
