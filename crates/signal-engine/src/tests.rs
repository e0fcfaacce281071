use analysis_core::{BbPosition, FeatureSnapshot, Market, Signal, SmaBreakout};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::scorer::{score_signal, signal_for_score};

fn blank_snapshot() -> FeatureSnapshot {
    FeatureSnapshot {
        symbol: "TEST".to_string(),
        market: Market::Us,
        date: NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
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

#[test]
fn score_to_signal_mapping_is_deterministic() {
    assert_eq!(signal_for_score(45), (Signal::StrongBuy, 90));
    assert_eq!(signal_for_score(40), (Signal::StrongBuy, 90));
    assert_eq!(signal_for_score(25), (Signal::Buy, 70));
    assert_eq!(signal_for_score(20), (Signal::Buy, 66));
    assert_eq!(signal_for_score(-25), (Signal::Sell, 70));
    assert_eq!(signal_for_score(-20), (Signal::Sell, 66));
    assert_eq!(signal_for_score(-40), (Signal::StrongSell, 90));
    assert_eq!(signal_for_score(-100), (Signal::StrongSell, 90));
    assert_eq!(signal_for_score(0), (Signal::Hold, 70));
    assert_eq!(signal_for_score(10), (Signal::Hold, 50));
    assert_eq!(signal_for_score(-19), (Signal::Hold, 40));
}

#[test]
fn all_null_snapshot_holds_with_default_confidence() {
    let decision = score_signal(&blank_snapshot(), None);
    assert_eq!(decision.signal, Signal::Hold);
    assert_eq!(decision.confidence, 70);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.change_details.rsi_change, None);
    assert_eq!(decision.change_details.price_change, None);
}

#[test]
fn bullish_snapshot_produces_strong_buy_with_ordered_reasons() {
    let mut current = blank_snapshot();
    current.close_price = Some(dec!(110));
    current.rsi_14 = Some(dec!(25));
    current.sma_20 = Some(dec!(100));
    current.sma_50 = Some(dec!(90));
    current.bb_upper = Some(dec!(125));
    current.bb_middle = Some(dec!(120));
    current.bb_lower = Some(dec!(115));
    current.volume_ratio = Some(dec!(2.5));
    current.macd = Some(dec!(1.2));
    current.macd_histogram = Some(dec!(0.5));

    let mut previous = blank_snapshot();
    previous.rsi_14 = Some(dec!(10));
    previous.close_price = Some(dec!(100));

    let decision = score_signal(&current, Some(&previous));

    // 20 + 10 + 10 + 15 + 15 + 10 + 10 + 5 = 95
    assert_eq!(decision.signal, Signal::StrongBuy);
    assert_eq!(decision.confidence, 90);
    assert_eq!(
        decision.reasons,
        vec![
            "RSI oversold (<30)",
            "RSI surge (+15.0)",
            "Price well above SMA20 (+10.0%)",
            "Golden Cross confirmed (SMA20 > SMA50)",
            "Price below lower Bollinger Band",
            "High volume spike (2.5x avg)",
            "Strong price gain (+10.0%)",
            "MACD histogram positive",
        ]
    );
    assert_eq!(decision.change_details.sma_breakout, Some(SmaBreakout::AboveSma20));
    assert_eq!(decision.change_details.bb_position, Some(BbPosition::BelowLower));
    assert!(decision.change_details.volume_spike);
    assert_eq!(decision.change_details.rsi_change, Some(dec!(15)));
}

#[test]
fn bearish_snapshot_produces_strong_sell() {
    let mut current = blank_snapshot();
    current.close_price = Some(dec!(80));
    current.rsi_14 = Some(dec!(75));
    current.sma_20 = Some(dec!(100));
    current.sma_50 = Some(dec!(103));
    current.bb_upper = Some(dec!(105));
    current.bb_middle = Some(dec!(95));
    current.bb_lower = Some(dec!(75));
    current.macd = Some(dec!(-0.8));
    current.macd_histogram = Some(dec!(-0.5));

    let mut previous = blank_snapshot();
    previous.close_price = Some(dec!(90));

    let decision = score_signal(&current, Some(&previous));

    // -15 - 10 - 15 - 15 - 5 = -60
    assert_eq!(decision.signal, Signal::StrongSell);
    assert_eq!(decision.confidence, 90);
    assert_eq!(
        decision.reasons,
        vec![
            "RSI overbought (>70)",
            "Price well below SMA20 (-20.0%)",
            "Death Cross confirmed (SMA20 < SMA50)",
            "Sharp price drop (-11.1%)",
            "MACD histogram negative",
        ]
    );
    assert_eq!(decision.change_details.sma_breakout, Some(SmaBreakout::BelowSma20));
    assert_eq!(decision.change_details.bb_position, Some(BbPosition::BelowMiddle));
    assert!(!decision.change_details.volume_spike);
}

#[test]
fn missing_previous_snapshot_degrades_gracefully() {
    let mut current = blank_snapshot();
    current.rsi_14 = Some(dec!(65));
    current.close_price = Some(dec!(100));

    let decision = score_signal(&current, None);

    // Only the RSI level rule can fire: +10 -> HOLD at 70 - 20
    assert_eq!(decision.signal, Signal::Hold);
    assert_eq!(decision.confidence, 50);
    assert_eq!(decision.reasons, vec!["RSI strong (>60)"]);
    assert_eq!(decision.change_details.price_change, None);
}

#[test]
fn sma_rules_need_both_averages() {
    let mut current = blank_snapshot();
    current.close_price = Some(dec!(110));
    current.sma_20 = Some(dec!(100));
    // sma_50 missing: the whole SMA block is skipped

    let decision = score_signal(&current, None);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.change_details.sma_breakout, None);
}

#[test]
fn near_sma_distances_score_half() {
    let mut current = blank_snapshot();
    current.close_price = Some(dec!(102));
    current.sma_20 = Some(dec!(100));
    current.sma_50 = Some(dec!(100));

    let decision = score_signal(&current, None);
    assert_eq!(decision.reasons, vec!["Price above SMA20"]);
    assert_eq!(decision.signal, Signal::Hold);
    // +5 -> 70 - 10
    assert_eq!(decision.confidence, 60);
}

#[test]
fn elevated_volume_scores_without_spike_flag() {
    let mut current = blank_snapshot();
    current.volume_ratio = Some(dec!(1.7));

    let decision = score_signal(&current, None);
    assert_eq!(decision.reasons, vec!["Elevated volume (1.7x avg)"]);
    assert!(!decision.change_details.volume_spike);
}

#[test]
fn macd_rule_needs_macd_line_present() {
    let mut current = blank_snapshot();
    current.macd_histogram = Some(dec!(0.4));
    // macd line missing: rule skipped

    let decision = score_signal(&current, None);
    assert!(decision.reasons.is_empty());
}

#[test]
fn zero_histogram_counts_as_negative() {
    let mut current = blank_snapshot();
    current.macd = Some(dec!(0.3));
    current.macd_histogram = Some(Decimal::ZERO);

    let decision = score_signal(&current, None);
    assert_eq!(decision.reasons, vec!["MACD histogram negative"]);
}

#[test]
fn price_change_recorded_even_when_small() {
    let mut current = blank_snapshot();
    current.close_price = Some(dec!(101));
    let mut previous = blank_snapshot();
    previous.close_price = Some(dec!(100));

    let decision = score_signal(&current, Some(&previous));
    assert_eq!(decision.change_details.price_change, Some(dec!(1)));
    assert!(decision.reasons.is_empty());
}
