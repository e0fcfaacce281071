//! Day-over-day delta report: price movement counts, signal
//! upgrades/downgrades, and stop-loss raises between two trading days.
//! Pure derivation over caller-supplied data; nothing is fetched here.

use std::collections::{BTreeMap, HashMap};

use analysis_core::decimal::{pct_diff, round2_dec};
use analysis_core::{FeatureSnapshot, Market, Signal, SignalDecision, StopLossState};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A decision together with the portfolio that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDecision {
    pub portfolio_id: String,
    pub decision: SignalDecision,
}

/// Everything the delta computation needs, for both days
#[derive(Debug, Clone, Copy)]
pub struct DeltaInputs<'a> {
    pub date: NaiveDate,
    pub market: Option<Market>,
    pub current_snapshots: &'a [FeatureSnapshot],
    pub previous_snapshots: &'a [FeatureSnapshot],
    pub current_decisions: &'a [PortfolioDecision],
    pub previous_decisions: &'a [PortfolioDecision],
    /// Stop states written on the current date
    pub current_stops: &'a [StopLossState],
    /// Stop states as they stood at the end of the previous date
    pub previous_stops: &'a [StopLossState],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolChange {
    pub symbol: String,
    pub change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChanges {
    pub total_symbols: usize,
    pub gainers: usize,
    pub losers: usize,
    pub unchanged: usize,
    pub avg_change: Decimal,
    pub top_gainers: Vec<SymbolChange>,
    pub top_losers: Vec<SymbolChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChanges {
    pub total_positions: usize,
    pub upgraded: usize,
    pub downgraded: usize,
    pub new_signals: usize,
    pub signal_summary: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossChanges {
    pub total_stops: usize,
    pub raised: usize,
    pub unchanged: usize,
    pub avg_raise: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDelta {
    pub date: NaiveDate,
    pub market: Option<Market>,
    pub price_changes: PriceChanges,
    pub signal_changes: SignalChanges,
    pub stop_loss_changes: StopLossChanges,
    pub summary: String,
}

pub fn compute_daily_delta(inputs: DeltaInputs<'_>) -> DailyDelta {
    let price_changes = price_changes(&inputs);
    let signal_changes = signal_changes(&inputs);
    let stop_loss_changes = stop_loss_changes(&inputs);
    let summary = build_summary(&price_changes, &signal_changes, &stop_loss_changes);

    DailyDelta {
        date: inputs.date,
        market: inputs.market,
        price_changes,
        signal_changes,
        stop_loss_changes,
        summary,
    }
}

fn in_market(snapshot: &FeatureSnapshot, market: Option<Market>) -> bool {
    market.map_or(true, |m| snapshot.market == m)
}

fn price_changes(inputs: &DeltaInputs<'_>) -> PriceChanges {
    // Moves within ±0.1% count as unchanged
    let flat = Decimal::new(1, 1);

    let previous_close: HashMap<(&str, Market), Decimal> = inputs
        .previous_snapshots
        .iter()
        .filter(|s| in_market(s, inputs.market))
        .filter_map(|s| s.close_price.map(|c| ((s.symbol.as_str(), s.market), c)))
        .collect();

    let mut changes: Vec<SymbolChange> = Vec::new();
    let mut gainers = 0;
    let mut losers = 0;
    let mut unchanged = 0;
    let mut total_change = Decimal::ZERO;
    let mut total_symbols = 0;

    for current in inputs
        .current_snapshots
        .iter()
        .filter(|s| in_market(s, inputs.market))
    {
        total_symbols += 1;
        let Some(close) = current.close_price else {
            continue;
        };
        let Some(previous) = previous_close.get(&(current.symbol.as_str(), current.market)) else {
            continue;
        };

        let change = pct_diff(close, *previous);
        total_change += change;

        if change > flat {
            gainers += 1;
        } else if change < -flat {
            losers += 1;
        } else {
            unchanged += 1;
        }

        changes.push(SymbolChange {
            symbol: current.symbol.clone(),
            change,
        });
    }

    changes.sort_by(|a, b| b.change.cmp(&a.change));

    let top_gainers: Vec<SymbolChange> = changes
        .iter()
        .take(5)
        .map(|c| SymbolChange {
            symbol: c.symbol.clone(),
            change: round2_dec(c.change),
        })
        .collect();
    let top_losers: Vec<SymbolChange> = changes
        .iter()
        .rev()
        .take(5)
        .map(|c| SymbolChange {
            symbol: c.symbol.clone(),
            change: round2_dec(c.change),
        })
        .collect();

    let avg_change = if changes.is_empty() {
        Decimal::ZERO
    } else {
        round2_dec(total_change / Decimal::from(changes.len() as u64))
    };

    PriceChanges {
        total_symbols,
        gainers,
        losers,
        unchanged,
        avg_change,
        top_gainers,
        top_losers,
    }
}

fn signal_changes(inputs: &DeltaInputs<'_>) -> SignalChanges {
    let previous_signal: HashMap<(&str, &str, Market), Signal> = inputs
        .previous_decisions
        .iter()
        .map(|d| {
            (
                (
                    d.portfolio_id.as_str(),
                    d.decision.symbol.as_str(),
                    d.decision.market,
                ),
                d.decision.signal,
            )
        })
        .collect();

    let mut upgraded = 0;
    let mut downgraded = 0;
    let mut new_signals = 0;
    let mut signal_summary: BTreeMap<String, usize> = BTreeMap::new();

    for current in inputs.current_decisions {
        *signal_summary
            .entry(current.decision.signal.as_str().to_string())
            .or_insert(0) += 1;

        let key = (
            current.portfolio_id.as_str(),
            current.decision.symbol.as_str(),
            current.decision.market,
        );
        match previous_signal.get(&key) {
            None => new_signals += 1,
            Some(previous) if *previous != current.decision.signal => {
                if current.decision.signal.rank() > previous.rank() {
                    upgraded += 1;
                } else {
                    downgraded += 1;
                }
            }
            Some(_) => {}
        }
    }

    SignalChanges {
        total_positions: inputs.current_decisions.len(),
        upgraded,
        downgraded,
        new_signals,
        signal_summary,
    }
}

fn stop_loss_changes(inputs: &DeltaInputs<'_>) -> StopLossChanges {
    let previous_stop: HashMap<(&str, &str), Decimal> = inputs
        .previous_stops
        .iter()
        .map(|s| {
            (
                (s.portfolio_id.as_str(), s.symbol_id.as_str()),
                s.current_stop_loss,
            )
        })
        .collect();

    let mut raised = 0;
    let mut unchanged = 0;
    let mut total_raise = Decimal::ZERO;

    for current in inputs.current_stops {
        let key = (current.portfolio_id.as_str(), current.symbol_id.as_str());
        let Some(previous) = previous_stop.get(&key) else {
            continue;
        };
        if current.current_stop_loss > *previous {
            raised += 1;
            total_raise += current.current_stop_loss - previous;
        } else {
            unchanged += 1;
        }
    }

    let avg_raise = if raised > 0 {
        round2_dec(total_raise / Decimal::from(raised as u64))
    } else {
        Decimal::ZERO
    };

    StopLossChanges {
        total_stops: inputs.current_stops.len(),
        raised,
        unchanged,
        avg_raise,
    }
}

fn build_summary(
    prices: &PriceChanges,
    signals: &SignalChanges,
    stops: &StopLossChanges,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    let sign = if prices.avg_change > Decimal::ZERO { "+" } else { "" };
    parts.push(format!(
        "Market: {} gainers, {} losers (avg change: {sign}{}%).",
        prices.gainers, prices.losers, prices.avg_change
    ));

    if signals.upgraded > 0 || signals.downgraded > 0 {
        parts.push(format!(
            "Signals: {} upgraded, {} downgraded.",
            signals.upgraded, signals.downgraded
        ));
    }

    if stops.raised > 0 {
        parts.push(format!(
            "Stops: {} raised (avg: ${}).",
            stops.raised, stops.avg_raise
        ));
    }

    parts.join(" ")
}
