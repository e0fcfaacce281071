use analysis_core::{ChangeDetails, FeatureSnapshot, Market, Signal, SignalDecision};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::classify::*;
use crate::report::{generate_report, RiskLevel};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 19).unwrap()
}

fn blank_snapshot(symbol: &str, date: NaiveDate) -> FeatureSnapshot {
    FeatureSnapshot {
        symbol: symbol.to_string(),
        market: Market::Us,
        date,
        close_price: None,
        volume: None,
        sma_20: None,
        sma_50: None,
        sma_200: None,
        ema_12: None,
        ema_26: None,
        rsi_14: None,
        macd: None,
        macd_signal: None,
        macd_histogram: None,
        bb_upper: None,
        bb_middle: None,
        bb_lower: None,
        atr_14: None,
        volume_sma_20: None,
        volume_ratio: None,
        engine_version: "1.0.0".to_string(),
    }
}

fn uptrend_snapshot(symbol: &str, date: NaiveDate) -> FeatureSnapshot {
    let mut snapshot = blank_snapshot(symbol, date);
    snapshot.close_price = Some(dec!(110));
    snapshot.sma_20 = Some(dec!(105));
    snapshot.sma_50 = Some(dec!(100));
    snapshot.sma_200 = Some(dec!(90));
    snapshot.rsi_14 = Some(dec!(65));
    snapshot.atr_14 = Some(dec!(1.1));
    snapshot.volume_ratio = Some(dec!(1.2));
    snapshot.bb_upper = Some(dec!(115));
    snapshot.bb_middle = Some(dec!(105));
    snapshot.bb_lower = Some(dec!(95));
    snapshot
}

fn decision(symbol: &str, signal: Signal, confidence: u8) -> SignalDecision {
    SignalDecision {
        symbol: symbol.to_string(),
        market: Market::Us,
        date: day(),
        signal,
        confidence,
        reasons: vec![
            "RSI strong (>60)".to_string(),
            "Price above SMA20".to_string(),
            "Golden Cross confirmed (SMA20 > SMA50)".to_string(),
            "MACD histogram positive".to_string(),
        ],
        change_details: ChangeDetails::default(),
    }
}

#[test]
fn trend_classification_covers_alignments() {
    let aligned = uptrend_snapshot("AAPL", day());
    assert_eq!(classify_trend(&aligned).0, Trend::StrongUptrend);

    let mut no_sma200 = uptrend_snapshot("AAPL", day());
    no_sma200.sma_200 = None;
    assert_eq!(classify_trend(&no_sma200).0, Trend::Uptrend);

    let mut down = blank_snapshot("AAPL", day());
    down.close_price = Some(dec!(80));
    down.sma_20 = Some(dec!(90));
    down.sma_50 = Some(dec!(95));
    down.sma_200 = Some(dec!(100));
    assert_eq!(classify_trend(&down).0, Trend::StrongDowntrend);

    let mut mixed = blank_snapshot("AAPL", day());
    mixed.close_price = Some(dec!(100));
    mixed.sma_20 = Some(dec!(105));
    mixed.sma_50 = Some(dec!(95));
    assert_eq!(classify_trend(&mixed).0, Trend::Mixed);

    assert_eq!(
        classify_trend(&blank_snapshot("AAPL", day())).0,
        Trend::InsufficientData
    );
}

#[test]
fn momentum_bands() {
    let mut snapshot = blank_snapshot("AAPL", day());

    snapshot.rsi_14 = Some(dec!(75));
    assert_eq!(classify_momentum(&snapshot).0, Momentum::Overbought);
    snapshot.rsi_14 = Some(dec!(65));
    assert_eq!(classify_momentum(&snapshot).0, Momentum::Strong);
    snapshot.rsi_14 = Some(dec!(50));
    assert_eq!(classify_momentum(&snapshot).0, Momentum::Neutral);
    snapshot.rsi_14 = Some(dec!(35));
    assert_eq!(classify_momentum(&snapshot).0, Momentum::Weak);
    snapshot.rsi_14 = Some(dec!(25));
    assert_eq!(classify_momentum(&snapshot).0, Momentum::Oversold);
}

#[test]
fn volatility_bands_on_atr_percent_of_price() {
    let mut snapshot = blank_snapshot("AAPL", day());
    snapshot.close_price = Some(dec!(100));

    snapshot.atr_14 = Some(dec!(4));
    let (band, text) = classify_volatility(&snapshot);
    assert_eq!(band, Volatility::High);
    assert!(text.contains("4.0%"));

    snapshot.atr_14 = Some(dec!(2));
    assert_eq!(classify_volatility(&snapshot).0, Volatility::Moderate);

    snapshot.atr_14 = Some(dec!(1));
    assert_eq!(classify_volatility(&snapshot).0, Volatility::Low);
}

#[test]
fn volume_bands() {
    let mut snapshot = blank_snapshot("AAPL", day());

    snapshot.volume_ratio = Some(dec!(2.5));
    assert_eq!(classify_volume(&snapshot).0, VolumeActivity::HighSpike);
    snapshot.volume_ratio = Some(dec!(1.7));
    assert_eq!(classify_volume(&snapshot).0, VolumeActivity::Elevated);
    snapshot.volume_ratio = Some(dec!(1.0));
    assert_eq!(classify_volume(&snapshot).0, VolumeActivity::Normal);
    snapshot.volume_ratio = Some(dec!(0.4));
    assert_eq!(classify_volume(&snapshot).0, VolumeActivity::Low);
}

#[test]
fn aligned_strong_buy_reports_high_conviction() {
    let snapshots = vec![uptrend_snapshot("AAPL", day())];
    let report = generate_report(&decision("AAPL", Signal::StrongBuy, 85), &snapshots).unwrap();

    assert_eq!(report.signal, Signal::StrongBuy);
    assert_eq!(report.risk_assessment.level, RiskLevel::Low);
    assert!(report
        .recommendations
        .contains(&"STRONG BUY: Consider entering or adding to position".to_string()));
    assert!(report
        .recommendations
        .contains(&"Signal aligned with strong uptrend - high conviction".to_string()));
    assert!(report
        .recommendations
        .contains(&"Monitor RSI and volume for confirmation".to_string()));
    assert!(report.summary.contains("AAPL generated a STRONG_BUY signal with 85% confidence."));
    assert!(report.summary.contains("Key factors: RSI strong (>60), Price above SMA20, Golden Cross confirmed (SMA20 > SMA50)."));
}

#[test]
fn risky_setup_accumulates_factors_to_high() {
    let mut snapshot = uptrend_snapshot("MEME", day());
    snapshot.atr_14 = Some(dec!(5)); // 4.5% of price: high volatility
    snapshot.rsi_14 = Some(dec!(78));
    snapshot.volume_ratio = Some(dec!(0.3));

    let report = generate_report(&decision("MEME", Signal::StrongBuy, 55), &[snapshot]).unwrap();

    // 2 (volatility) + 1 (RSI) + 1 (confidence) + 1 (volume) = 5
    assert_eq!(report.risk_assessment.level, RiskLevel::High);
    assert_eq!(report.risk_assessment.factors.len(), 4);
    assert!(report
        .recommendations
        .contains(&"Use smaller position size due to high risk".to_string()));
    assert!(report
        .recommendations
        .contains(&"Implement tight stop-loss due to high volatility".to_string()));
    assert!(report
        .recommendations
        .contains(&"Wait for pullback before entering (overbought conditions)".to_string()));
}

#[test]
fn counter_trend_buy_gets_caution() {
    let mut snapshot = blank_snapshot("FALL", day());
    snapshot.close_price = Some(dec!(80));
    snapshot.sma_20 = Some(dec!(90));
    snapshot.sma_50 = Some(dec!(95));
    snapshot.rsi_14 = Some(dec!(25));
    snapshot.atr_14 = Some(dec!(1));
    snapshot.volume_ratio = Some(dec!(1));

    let report = generate_report(&decision("FALL", Signal::StrongBuy, 80), &[snapshot]).unwrap();

    assert!(report
        .recommendations
        .contains(&"CAUTION: Buy signal against downtrend - counter-trend trade".to_string()));
    assert!(report
        .recommendations
        .contains(&"Good entry opportunity (oversold conditions)".to_string()));
}

#[test]
fn all_null_snapshot_reports_no_risk_factors() {
    let snapshots = vec![blank_snapshot("EMPTY", day())];
    let report = generate_report(&decision("EMPTY", Signal::StrongSell, 90), &snapshots).unwrap();

    assert_eq!(report.technical_analysis.trend, "INSUFFICIENT_DATA");
    assert_eq!(report.technical_analysis.momentum, "INSUFFICIENT_DATA");
    assert_eq!(report.risk_assessment.level, RiskLevel::Low);
    assert_eq!(
        report.risk_assessment.factors,
        vec!["No significant risk factors identified"]
    );
    assert!(report
        .recommendations
        .contains(&"STRONG SELL: Consider exiting position or avoiding entry".to_string()));
}

#[test]
fn missing_current_snapshot_is_not_found() {
    let snapshots = vec![uptrend_snapshot("AAPL", day() - chrono::Duration::days(1))];
    let err = generate_report(&decision("AAPL", Signal::StrongBuy, 80), &snapshots).unwrap_err();
    assert!(matches!(err, analysis_core::AnalysisError::NotFound(_)));
}

#[test]
fn supporting_data_carries_reasons_and_bb_position() {
    let snapshots = vec![uptrend_snapshot("AAPL", day())];
    let report = generate_report(&decision("AAPL", Signal::StrongBuy, 85), &snapshots).unwrap();

    assert_eq!(report.supporting_data["historical_data_points"], 1);
    assert_eq!(report.supporting_data["bb_position"], "ABOVE_MIDDLE");
    assert_eq!(
        report.supporting_data["reasons"][0],
        "RSI strong (>60)"
    );
}
