use analysis_core::{
    AnalysisError, BbPosition, FeatureSnapshot, Market, Signal, SignalDecision,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::classify::{
    atr_percent, classify_momentum, classify_trend, classify_volatility, classify_volume,
    Momentum, Trend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

/// Rendered classification lines, one per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalNarrative {
    pub trend: String,
    pub momentum: String,
    pub volatility: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub current_price: Option<Decimal>,
    pub sma_20: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub atr: Option<Decimal>,
    pub volume_ratio: Option<Decimal>,
}

/// Narrative report generated for high-conviction (STRONG_*) signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveReport {
    pub symbol: String,
    pub market: Market,
    pub date: NaiveDate,
    pub signal: Signal,
    pub confidence: u8,
    pub summary: String,
    pub technical_analysis: TechnicalNarrative,
    pub key_metrics: KeyMetrics,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    pub supporting_data: serde_json::Value,
}

/// Assemble the deep-dive report for a flagged decision from the trailing
/// snapshot history (callers pass roughly the last 30 days; the day's own
/// snapshot must be among them).
pub fn generate_report(
    decision: &SignalDecision,
    snapshots: &[FeatureSnapshot],
) -> Result<DeepDiveReport, AnalysisError> {
    tracing::info!(
        "Generating deep dive report for {} ({})",
        decision.symbol,
        decision.market
    );

    let current = snapshots
        .iter()
        .find(|s| {
            s.symbol == decision.symbol && s.market == decision.market && s.date == decision.date
        })
        .ok_or_else(|| {
            AnalysisError::NotFound(format!(
                "No features for {} ({}) on {}",
                decision.symbol, decision.market, decision.date
            ))
        })?;

    let (trend, trend_text) = classify_trend(current);
    let (momentum, momentum_text) = classify_momentum(current);
    let (_, volatility_text) = classify_volatility(current);
    let (_, volume_text) = classify_volume(current);

    let risk_assessment = assess_risk(current, decision.confidence);
    let recommendations =
        build_recommendations(decision.signal, momentum, trend, &risk_assessment);
    let summary = build_summary(decision, &trend_text, &momentum_text);

    Ok(DeepDiveReport {
        symbol: decision.symbol.clone(),
        market: decision.market,
        date: decision.date,
        signal: decision.signal,
        confidence: decision.confidence,
        summary,
        technical_analysis: TechnicalNarrative {
            trend: trend_text,
            momentum: momentum_text,
            volatility: volatility_text,
            volume: volume_text,
        },
        key_metrics: KeyMetrics {
            current_price: current.close_price,
            sma_20: current.sma_20,
            sma_50: current.sma_50,
            sma_200: current.sma_200,
            rsi: current.rsi_14,
            atr: current.atr_14,
            volume_ratio: current.volume_ratio,
        },
        risk_assessment,
        recommendations,
        supporting_data: json!({
            "reasons": decision.reasons,
            "historical_data_points": snapshots.len(),
            "bb_position": bollinger_position(current),
        }),
    })
}

/// Additive risk score: high volatility +2, moderate +1, RSI extreme +1,
/// confidence below 60 +1, volume under 0.5x +1. Mapped LOW (<2),
/// MEDIUM (2-3), HIGH (>=4).
fn assess_risk(current: &FeatureSnapshot, confidence: u8) -> RiskAssessment {
    let mut factors: Vec<String> = Vec::new();
    let mut risk_score = 0u8;

    if let Some(percent) = atr_percent(current) {
        if percent > Decimal::from(3) {
            factors.push("High volatility (ATR > 3% of price)".to_string());
            risk_score += 2;
        } else if percent > Decimal::new(15, 1) {
            factors.push("Moderate volatility".to_string());
            risk_score += 1;
        }
    }

    if let Some(rsi) = current.rsi_14 {
        if rsi > Decimal::from(70) {
            factors.push("Overbought conditions (RSI > 70)".to_string());
            risk_score += 1;
        } else if rsi < Decimal::from(30) {
            factors.push("Oversold conditions (RSI < 30)".to_string());
            risk_score += 1;
        }
    }

    if confidence < 60 {
        factors.push("Low signal confidence (<60%)".to_string());
        risk_score += 1;
    }

    if let Some(ratio) = current.volume_ratio {
        if ratio < Decimal::new(5, 1) {
            factors.push("Low volume (< 0.5x average)".to_string());
            risk_score += 1;
        }
    }

    let level = if risk_score >= 4 {
        RiskLevel::High
    } else if risk_score >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if factors.is_empty() {
        factors.push("No significant risk factors identified".to_string());
    }

    RiskAssessment { level, factors }
}

/// Templated recommendations keyed on signal, momentum band, risk level and
/// trend/signal alignment
fn build_recommendations(
    signal: Signal,
    momentum: Momentum,
    trend: Trend,
    risk: &RiskAssessment,
) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    match signal {
        Signal::StrongBuy => {
            recommendations
                .push("STRONG BUY: Consider entering or adding to position".to_string());
            if risk.level == RiskLevel::High {
                recommendations.push("Use smaller position size due to high risk".to_string());
            }
        }
        Signal::StrongSell => {
            recommendations
                .push("STRONG SELL: Consider exiting position or avoiding entry".to_string());
        }
        _ => {}
    }

    if signal.is_buy() {
        match momentum {
            Momentum::Overbought => recommendations
                .push("Wait for pullback before entering (overbought conditions)".to_string()),
            Momentum::Oversold => {
                recommendations.push("Good entry opportunity (oversold conditions)".to_string())
            }
            _ => {}
        }
    }

    match risk.level {
        RiskLevel::High => {
            recommendations.push("Implement tight stop-loss due to high volatility".to_string());
            recommendations.push("Consider using smaller position size".to_string());
        }
        RiskLevel::Medium => {
            recommendations.push("Standard stop-loss recommended".to_string());
        }
        RiskLevel::Low => {}
    }

    if trend == Trend::StrongUptrend && signal.is_buy() {
        recommendations.push("Signal aligned with strong uptrend - high conviction".to_string());
    } else if matches!(trend, Trend::Downtrend | Trend::StrongDowntrend) && signal.is_buy() {
        recommendations
            .push("CAUTION: Buy signal against downtrend - counter-trend trade".to_string());
    }

    recommendations.push("Monitor RSI and volume for confirmation".to_string());
    recommendations.push("Review position daily for changes in technical setup".to_string());

    recommendations
}

fn build_summary(decision: &SignalDecision, trend_text: &str, momentum_text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!(
        "{} generated a {} signal with {}% confidence.",
        decision.symbol, decision.signal, decision.confidence
    ));
    parts.push(format!("The stock is in a {trend_text}."));
    parts.push(format!("Momentum is {momentum_text}."));

    if !decision.reasons.is_empty() {
        let key_factors: Vec<&str> = decision
            .reasons
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        parts.push(format!("Key factors: {}.", key_factors.join(", ")));
    }

    parts.join(" ")
}

fn bollinger_position(current: &FeatureSnapshot) -> Option<BbPosition> {
    let (Some(price), Some(upper), Some(middle), Some(lower)) = (
        current.close_price,
        current.bb_upper,
        current.bb_middle,
        current.bb_lower,
    ) else {
        return None;
    };

    if price > upper {
        Some(BbPosition::AboveUpper)
    } else if price < lower {
        Some(BbPosition::BelowLower)
    } else if price > middle {
        Some(BbPosition::AboveMiddle)
    } else {
        Some(BbPosition::BelowMiddle)
    }
}
