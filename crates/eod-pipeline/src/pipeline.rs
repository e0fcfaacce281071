//! Daily end-of-day driver: features -> sectors -> signals -> stops ->
//! deep dives, one pass per calendar date. Each stage works through the
//! store traits; a failing symbol or position is recorded and skipped, so a
//! single bad feed never aborts the day's run.

use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{
    AnalysisError, DecisionStore, Market, PositionReader, SectorStrength, SectorTagReader,
    SignalDecision, SnapshotStore, UniverseSymbol,
};
use chrono::{Duration, NaiveDate};
use deep_dive::{generate_report, DeepDiveReport};
use feature_factory::{FeatureFactory, UniversePassSummary};
use sector_strength::aggregate_sector_strength;
use signal_engine::score_signal;
use stop_loss::{PortfolioStopSummary, StopLossEngine};

/// Days of snapshot history handed to the deep-dive narrator
const DEEP_DIVE_LOOKBACK_DAYS: i64 = 30;

/// Outcome of the signal stage for one portfolio
#[derive(Debug, Clone)]
pub struct DecisionPassSummary {
    pub portfolio_id: String,
    pub total_positions: usize,
    pub processed: usize,
    pub signal_counts: BTreeMap<String, usize>,
    pub decisions: Vec<SignalDecision>,
    pub errors: Vec<String>,
}

/// Everything one day's run produced
#[derive(Debug)]
pub struct PipelineRunSummary {
    pub date: NaiveDate,
    pub features: UniversePassSummary,
    pub sectors: Vec<SectorStrength>,
    pub decision_passes: Vec<DecisionPassSummary>,
    pub stop_passes: Vec<PortfolioStopSummary>,
    pub deep_dives: Vec<DeepDiveReport>,
    pub deep_dive_errors: Vec<String>,
}

pub struct EodPipeline {
    features: FeatureFactory,
    stops: StopLossEngine,
    snapshots: Arc<dyn SnapshotStore>,
    decisions: Arc<dyn DecisionStore>,
    positions: Arc<dyn PositionReader>,
    sector_tags: Arc<dyn SectorTagReader>,
}

impl EodPipeline {
    pub fn new(
        features: FeatureFactory,
        stops: StopLossEngine,
        snapshots: Arc<dyn SnapshotStore>,
        decisions: Arc<dyn DecisionStore>,
        positions: Arc<dyn PositionReader>,
        sector_tags: Arc<dyn SectorTagReader>,
    ) -> Self {
        Self {
            features,
            stops,
            snapshots,
            decisions,
            positions,
            sector_tags,
        }
    }

    /// Run the full pipeline for one date. The caller (scheduler) is
    /// responsible for invoking this once per trading day.
    pub async fn run_for_date(
        &self,
        date: NaiveDate,
        universe: &[UniverseSymbol],
        markets: &[Market],
        portfolio_ids: &[String],
    ) -> Result<PipelineRunSummary, AnalysisError> {
        tracing::info!("Starting pipeline for {date}");

        let features = self.features.calculate_for_universe(date, universe).await;
        if features.failed > 0 {
            let sample: Vec<&str> = features
                .errors
                .iter()
                .take(5)
                .map(|e| e.message.as_str())
                .collect();
            tracing::warn!("Feature errors: {}", sample.join("; "));
        }

        let sectors = self.run_sector_stage(date, markets).await?;

        let mut decision_passes = Vec::new();
        let mut stop_passes = Vec::new();
        for portfolio_id in portfolio_ids {
            decision_passes.push(self.run_decision_stage(portfolio_id, date).await?);
            stop_passes.push(self.stops.update_portfolio(portfolio_id, date).await?);
        }

        let (deep_dives, deep_dive_errors) = self.run_deep_dive_stage(date, &decision_passes).await;

        tracing::info!("Pipeline for {date} completed");
        Ok(PipelineRunSummary {
            date,
            features,
            sectors,
            decision_passes,
            stop_passes,
            deep_dives,
            deep_dive_errors,
        })
    }

    async fn run_sector_stage(
        &self,
        date: NaiveDate,
        markets: &[Market],
    ) -> Result<Vec<SectorStrength>, AnalysisError> {
        let mut sectors = Vec::new();
        for market in markets {
            let tags = self.sector_tags.sector_tags(Some(*market)).await?;
            let snapshots = self.snapshots.snapshots_on(date, Some(*market)).await?;
            let strengths = aggregate_sector_strength(date, Some(*market), &snapshots, &tags);

            match strengths.first() {
                Some(top) => tracing::info!(
                    "{market}: {} sectors analyzed, top sector: {} (score: {})",
                    strengths.len(),
                    top.sector,
                    top.score
                ),
                None => tracing::warn!("No sectors found for {market}"),
            }
            sectors.extend(strengths);
        }
        Ok(sectors)
    }

    /// Score every position in the portfolio against the day's snapshot and
    /// persist the decisions. Positions without a snapshot on the date are
    /// skipped; store failures are recorded per position.
    async fn run_decision_stage(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<DecisionPassSummary, AnalysisError> {
        tracing::info!("Detecting changes for portfolio {portfolio_id} on {date}");

        let positions = self.positions.positions_for_portfolio(portfolio_id).await?;

        let mut summary = DecisionPassSummary {
            portfolio_id: portfolio_id.to_string(),
            total_positions: positions.len(),
            processed: 0,
            signal_counts: BTreeMap::new(),
            decisions: Vec::new(),
            errors: Vec::new(),
        };

        for position in &positions {
            let result: Result<Option<SignalDecision>, AnalysisError> = async {
                let Some(current) = self
                    .snapshots
                    .get_snapshot(&position.symbol, position.market, date)
                    .await?
                else {
                    tracing::debug!("No features found for {} on {date}", position.symbol);
                    return Ok(None);
                };
                let previous = self
                    .snapshots
                    .latest_snapshot_before(&position.symbol, position.market, date)
                    .await?;

                let decision = score_signal(&current, previous.as_ref());
                self.decisions.put_decision(portfolio_id, &decision).await?;
                Ok(Some(decision))
            }
            .await;

            match result {
                Ok(Some(decision)) => {
                    summary.processed += 1;
                    *summary
                        .signal_counts
                        .entry(decision.signal.as_str().to_string())
                        .or_insert(0) += 1;
                    summary.decisions.push(decision);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("Failed to score {}: {err}", position.symbol);
                    summary
                        .errors
                        .push(format!("{} ({}): {err}", position.symbol, position.market));
                }
            }
        }

        tracing::info!(
            "Portfolio {portfolio_id}: {} positions analyzed, signals: {:?}",
            summary.processed,
            summary.signal_counts
        );
        Ok(summary)
    }

    /// Generate deep-dive reports for every STRONG_* decision of the day.
    /// Report failures are collected, never fatal.
    async fn run_deep_dive_stage(
        &self,
        date: NaiveDate,
        decision_passes: &[DecisionPassSummary],
    ) -> (Vec<DeepDiveReport>, Vec<String>) {
        let flagged: Vec<&SignalDecision> = decision_passes
            .iter()
            .flat_map(|pass| pass.decisions.iter())
            .filter(|d| d.signal.is_strong())
            .collect();

        tracing::info!(
            "Found {} flagged symbols (STRONG_BUY/STRONG_SELL)",
            flagged.len()
        );

        let mut reports = Vec::new();
        let mut errors = Vec::new();
        let start = date - Duration::days(DEEP_DIVE_LOOKBACK_DAYS);

        for decision in flagged {
            let result: Result<DeepDiveReport, AnalysisError> = async {
                let history = self
                    .snapshots
                    .snapshots_in_range(&decision.symbol, decision.market, start, date)
                    .await?;
                generate_report(decision, &history)
            }
            .await;

            match result {
                Ok(report) => {
                    tracing::info!(
                        "Generated report for {}: {} ({}%)",
                        report.symbol,
                        report.signal,
                        report.confidence
                    );
                    reports.push(report);
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to generate report for {}: {err}",
                        decision.symbol
                    );
                    errors.push(format!("{}: {err}", decision.symbol));
                }
            }
        }

        (reports, errors)
    }
}
