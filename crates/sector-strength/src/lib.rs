//! Sector strength aggregation over one day's feature snapshots.
//!
//! Symbols are grouped by their externally-assigned sector tag; each sector
//! with at least one snapshot on the target date gets a composite 0-100
//! score. Sectors with no snapshots on the date are excluded, not scored as
//! zero.

use std::collections::HashMap;

use analysis_core::decimal::{pct_diff, round2_dec};
use analysis_core::{FeatureSnapshot, Market, SectorStrength, SectorTag};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Aggregate per-symbol features into ranked sector strengths for `date`.
///
/// `market` restricts both the tags and the snapshots considered. The
/// output is ordered by score descending with 1-based ranks; the sort is
/// stable, so sectors with equal scores keep their first-seen tag order.
pub fn aggregate_sector_strength(
    date: NaiveDate,
    market: Option<Market>,
    snapshots: &[FeatureSnapshot],
    tags: &[SectorTag],
) -> Vec<SectorStrength> {
    tracing::debug!("Calculating sector strength for {date}");

    // Index the day's snapshots by (symbol, market)
    let by_symbol: HashMap<(&str, Market), &FeatureSnapshot> = snapshots
        .iter()
        .filter(|s| s.date == date && market.map_or(true, |m| s.market == m))
        .map(|s| ((s.symbol.as_str(), s.market), s))
        .collect();

    // Group tagged symbols by sector, preserving first-seen sector order so
    // rank ties stay deterministic
    let mut sector_order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&FeatureSnapshot>> = HashMap::new();
    for tag in tags {
        if market.map_or(false, |m| tag.market != m) {
            continue;
        }
        if !groups.contains_key(tag.sector.as_str()) {
            sector_order.push(tag.sector.as_str());
            groups.insert(tag.sector.as_str(), Vec::new());
        }
        if let Some(snapshot) = by_symbol.get(&(tag.symbol.as_str(), tag.market)) {
            if let Some(group) = groups.get_mut(tag.sector.as_str()) {
                group.push(snapshot);
            }
        }
    }

    let mut strengths: Vec<SectorStrength> = Vec::new();
    for sector in sector_order {
        let Some(features) = groups.get(sector) else {
            continue;
        };
        if features.is_empty() {
            tracing::debug!("No features found for sector {sector} on {date}");
            continue;
        }
        strengths.push(score_sector(sector, date, market, features));
    }

    strengths.sort_by(|a, b| b.score.cmp(&a.score));
    for (index, strength) in strengths.iter_mut().enumerate() {
        strength.rank = index as u32 + 1;
    }
    strengths
}

fn score_sector(
    sector: &str,
    date: NaiveDate,
    market: Option<Market>,
    features: &[&FeatureSnapshot],
) -> SectorStrength {
    let rsi_values: Vec<Decimal> = features.iter().filter_map(|f| f.rsi_14).collect();
    let sma_dist_values: Vec<Decimal> = features
        .iter()
        .filter_map(|f| match (f.close_price, f.sma_20) {
            (Some(close), Some(sma20)) => Some(pct_diff(close, sma20)),
            _ => None,
        })
        .collect();
    let vol_ratio_values: Vec<Decimal> = features.iter().filter_map(|f| f.volume_ratio).collect();

    let avg_rsi = average(&rsi_values);
    let avg_sma20_dist = average(&sma_dist_values);
    let avg_vol_ratio = average(&vol_ratio_values);

    let strong_symbols = rsi_values.iter().filter(|r| **r > Decimal::from(60)).count();
    let weak_symbols = rsi_values.iter().filter(|r| **r < Decimal::from(40)).count();
    let total = Decimal::from(features.len() as u64);

    let mut score = Decimal::from(50);
    if let Some(rsi) = avg_rsi {
        // RSI contribution, -25 to +25
        score += (rsi - Decimal::from(50)) * Decimal::new(5, 1);
    }
    if let Some(dist) = avg_sma20_dist {
        score += dist * Decimal::new(5, 1);
    }
    if let Some(ratio) = avg_vol_ratio {
        score += (ratio - Decimal::ONE) * Decimal::TEN;
    }
    score += Decimal::from(strong_symbols as u64) / total * Decimal::TEN;
    score -= Decimal::from(weak_symbols as u64) / total * Decimal::TEN;

    score = score.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

    SectorStrength {
        sector: sector.to_string(),
        market,
        date,
        symbol_count: features.len(),
        avg_rsi: avg_rsi.map(round2_dec),
        avg_sma20_dist: avg_sma20_dist.map(round2_dec),
        avg_vol_ratio: avg_vol_ratio.map(round2_dec),
        strong_symbols,
        weak_symbols,
        score: round2_dec(score),
        rank: 0,
    }
}

fn average(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len() as u64))
}
