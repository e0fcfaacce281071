//! Additive signal scoring over a day's feature snapshot.
//!
//! Rules are evaluated in a fixed order (RSI level, RSI momentum, price vs
//! SMA20, SMA cross, Bollinger position, volume, day-over-day price change,
//! MACD histogram) and each triggered rule appends its reason string, so the
//! reason list order is part of the contract. A rule whose inputs are
//! missing is skipped; the score only accumulates over available signals.

use analysis_core::decimal::pct_diff;
use analysis_core::{
    BbPosition, ChangeDetails, FeatureSnapshot, Signal, SignalDecision, SmaBreakout,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Map a final score to its signal and confidence.
///
/// Brackets are checked in this order, first match wins:
/// >= 40 STRONG_BUY, >= 20 BUY, <= -40 STRONG_SELL, <= -20 SELL, else HOLD.
pub fn signal_for_score(score: i32) -> (Signal, u8) {
    let magnitude = score.abs() as f64;
    let (signal, confidence) = if score >= 40 {
        (Signal::StrongBuy, 90.0_f64.min(50.0 + magnitude))
    } else if score >= 20 {
        (Signal::Buy, 80.0_f64.min(50.0 + magnitude * 0.8))
    } else if score <= -40 {
        (Signal::StrongSell, 90.0_f64.min(50.0 + magnitude))
    } else if score <= -20 {
        (Signal::Sell, 80.0_f64.min(50.0 + magnitude * 0.8))
    } else {
        (Signal::Hold, 40.0_f64.max(70.0 - magnitude * 2.0))
    };
    (signal, confidence.round() as u8)
}

/// Score one snapshot against the prior trading day's snapshot.
///
/// `previous` is best effort: without it the day-over-day rules (RSI
/// momentum, price change) simply don't fire.
pub fn score_signal(
    current: &FeatureSnapshot,
    previous: Option<&FeatureSnapshot>,
) -> SignalDecision {
    let mut score: i32 = 0;
    let mut reasons: Vec<String> = Vec::new();
    let mut details = ChangeDetails::default();

    // 1. RSI level
    if let Some(rsi) = current.rsi_14 {
        details.rsi_change = previous.and_then(|p| p.rsi_14).map(|prev| rsi - prev);

        if rsi > dec!(70) {
            reasons.push("RSI overbought (>70)".to_string());
            score -= 15;
        } else if rsi < dec!(30) {
            reasons.push("RSI oversold (<30)".to_string());
            score += 20;
        } else if rsi > dec!(60) {
            reasons.push("RSI strong (>60)".to_string());
            score += 10;
        } else if rsi < dec!(40) {
            reasons.push("RSI weak (<40)".to_string());
            score -= 10;
        }

        // RSI day-over-day momentum
        if let Some(change) = details.rsi_change {
            if change > dec!(10) {
                reasons.push(format!("RSI surge (+{change:.1})"));
                score += 10;
            } else if change < dec!(-10) {
                reasons.push(format!("RSI drop ({change:.1})"));
                score -= 10;
            }
        }
    }

    // 2. Price vs SMA20, then the SMA20/SMA50 cross
    if let (Some(price), Some(sma20), Some(sma50)) =
        (current.close_price, current.sma_20, current.sma_50)
    {
        let distance = pct_diff(price, sma20);
        if price > sma20 {
            if distance > dec!(5) {
                reasons.push(format!("Price well above SMA20 (+{distance:.1}%)"));
                score += 10;
            } else {
                reasons.push("Price above SMA20".to_string());
                score += 5;
            }
            details.sma_breakout = Some(SmaBreakout::AboveSma20);
        } else {
            let below = -distance;
            if below > dec!(5) {
                reasons.push(format!("Price well below SMA20 (-{below:.1}%)"));
                score -= 10;
            } else {
                reasons.push("Price below SMA20".to_string());
                score -= 5;
            }
            details.sma_breakout = Some(SmaBreakout::BelowSma20);
        }

        let cross = pct_diff(sma20, sma50);
        if sma20 > sma50 {
            if cross > dec!(2) {
                reasons.push("Golden Cross confirmed (SMA20 > SMA50)".to_string());
                score += 15;
            }
        } else if -cross > dec!(2) {
            reasons.push("Death Cross confirmed (SMA20 < SMA50)".to_string());
            score -= 15;
        }
    }

    // 3. Bollinger Band position
    if let (Some(price), Some(upper), Some(middle), Some(lower)) = (
        current.close_price,
        current.bb_upper,
        current.bb_middle,
        current.bb_lower,
    ) {
        if price < lower {
            reasons.push("Price below lower Bollinger Band".to_string());
            score += 15;
            details.bb_position = Some(BbPosition::BelowLower);
        } else if price > upper {
            reasons.push("Price above upper Bollinger Band".to_string());
            score -= 10;
            details.bb_position = Some(BbPosition::AboveUpper);
        } else if price > middle {
            details.bb_position = Some(BbPosition::AboveMiddle);
        } else {
            details.bb_position = Some(BbPosition::BelowMiddle);
        }
    }

    // 4. Volume
    if let Some(ratio) = current.volume_ratio {
        if ratio > dec!(2) {
            reasons.push(format!("High volume spike ({ratio:.1}x avg)"));
            score += 10;
            details.volume_spike = true;
        } else if ratio > dec!(1.5) {
            reasons.push(format!("Elevated volume ({ratio:.1}x avg)"));
            score += 5;
        }
    }

    // 5. Day-over-day price change
    if let (Some(price), Some(prev_close)) = (
        current.close_price,
        previous.and_then(|p| p.close_price),
    ) {
        let change = pct_diff(price, prev_close);
        details.price_change = Some(change);

        if change > dec!(5) {
            reasons.push(format!("Strong price gain (+{change:.1}%)"));
            score += 10;
        } else if change < dec!(-5) {
            reasons.push(format!("Sharp price drop ({change:.1}%)"));
            score -= 15;
        }
    }

    // 6. MACD histogram
    if let (Some(_), Some(histogram)) = (current.macd, current.macd_histogram) {
        if histogram > Decimal::ZERO {
            reasons.push("MACD histogram positive".to_string());
            score += 5;
        } else {
            reasons.push("MACD histogram negative".to_string());
            score -= 5;
        }
    }

    let (signal, confidence) = signal_for_score(score);
    tracing::debug!(
        "Scored {} ({}) on {}: {} (score {score}, confidence {confidence})",
        current.symbol,
        current.market,
        current.date,
        signal
    );

    SignalDecision {
        symbol: current.symbol.clone(),
        market: current.market,
        date: current.date,
        signal,
        confidence,
        reasons,
        change_details: details,
    }
}
