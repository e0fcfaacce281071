use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AnalysisError;
use crate::types::{
    Bar, FeatureSnapshot, Market, Position, SectorTag, SignalDecision, StopLossState,
};

/// Capability interface for a daily-bar source. Providers are selected
/// explicitly by the caller; there is no process-wide registry.
#[async_trait]
pub trait BarProvider: Send + Sync {
    fn supports_market(&self, market: Market) -> bool;

    /// Bars ascending by date. May return fewer days than requested;
    /// short history is a valid result, not an error.
    async fn get_daily_bars(
        &self,
        symbol: &str,
        market: Market,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, AnalysisError>;
}

/// Store for daily feature snapshots, keyed by (symbol, market, date).
/// `put_snapshot` has upsert semantics.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get_snapshot(
        &self,
        symbol: &str,
        market: Market,
        date: NaiveDate,
    ) -> Result<Option<FeatureSnapshot>, AnalysisError>;

    /// Most recent snapshot strictly before `date` (the prior trading day,
    /// whatever calendar day that was)
    async fn latest_snapshot_before(
        &self,
        symbol: &str,
        market: Market,
        date: NaiveDate,
    ) -> Result<Option<FeatureSnapshot>, AnalysisError>;

    /// Snapshots for one symbol within [start, end], ascending by date
    async fn snapshots_in_range(
        &self,
        symbol: &str,
        market: Market,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FeatureSnapshot>, AnalysisError>;

    /// All snapshots on one date, optionally restricted to a market
    async fn snapshots_on(
        &self,
        date: NaiveDate,
        market: Option<Market>,
    ) -> Result<Vec<FeatureSnapshot>, AnalysisError>;

    async fn put_snapshot(&self, snapshot: &FeatureSnapshot) -> Result<(), AnalysisError>;
}

/// Store for per-position stop-loss state, keyed by (portfolio, symbol).
/// `put_stop_state` has upsert semantics.
#[async_trait]
pub trait StopStateStore: Send + Sync {
    async fn get_stop_state(
        &self,
        portfolio_id: &str,
        symbol_id: &str,
    ) -> Result<Option<StopLossState>, AnalysisError>;

    async fn stop_states_for_portfolio(
        &self,
        portfolio_id: &str,
    ) -> Result<Vec<StopLossState>, AnalysisError>;

    async fn put_stop_state(&self, state: &StopLossState) -> Result<(), AnalysisError>;
}

/// Read-only access to portfolio positions
#[async_trait]
pub trait PositionReader: Send + Sync {
    async fn positions_for_portfolio(
        &self,
        portfolio_id: &str,
    ) -> Result<Vec<Position>, AnalysisError>;

    async fn position(
        &self,
        portfolio_id: &str,
        symbol_id: &str,
    ) -> Result<Option<Position>, AnalysisError>;
}

/// Read-only access to symbol -> sector assignments
#[async_trait]
pub trait SectorTagReader: Send + Sync {
    async fn sector_tags(&self, market: Option<Market>) -> Result<Vec<SectorTag>, AnalysisError>;
}

/// Store for scored daily decisions, keyed by (portfolio, symbol, date).
/// `put_decision` has upsert semantics.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn put_decision(
        &self,
        portfolio_id: &str,
        decision: &SignalDecision,
    ) -> Result<(), AnalysisError>;

    async fn decisions_on(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<SignalDecision>, AnalysisError>;
}
