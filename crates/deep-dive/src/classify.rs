//! Trend/momentum/volatility/volume banding for deep-dive reports. Each
//! classifier returns the band plus the descriptive line rendered into the
//! report, driven by the same thresholds the signal scorer uses.

use analysis_core::FeatureSnapshot;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    StrongUptrend,
    Uptrend,
    StrongDowntrend,
    Downtrend,
    Mixed,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Momentum {
    Overbought,
    Strong,
    Oversold,
    Weak,
    Neutral,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    High,
    Moderate,
    Low,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeActivity {
    HighSpike,
    Elevated,
    Normal,
    Low,
    InsufficientData,
}

/// SMA alignment: price/SMA20/SMA50 ordering, with SMA200 deciding whether
/// a trend counts as strong
pub fn classify_trend(current: &FeatureSnapshot) -> (Trend, String) {
    let (Some(price), Some(sma20), Some(sma50)) =
        (current.close_price, current.sma_20, current.sma_50)
    else {
        return (Trend::InsufficientData, "INSUFFICIENT_DATA".to_string());
    };

    if price > sma20 && sma20 > sma50 {
        if current.sma_200.map_or(false, |sma200| sma50 > sma200) {
            (
                Trend::StrongUptrend,
                "STRONG_UPTREND (all SMAs aligned)".to_string(),
            )
        } else {
            (Trend::Uptrend, "UPTREND (price > SMA20 > SMA50)".to_string())
        }
    } else if price < sma20 && sma20 < sma50 {
        if current.sma_200.map_or(false, |sma200| sma50 < sma200) {
            (
                Trend::StrongDowntrend,
                "STRONG_DOWNTREND (all SMAs aligned)".to_string(),
            )
        } else {
            (
                Trend::Downtrend,
                "DOWNTREND (price < SMA20 < SMA50)".to_string(),
            )
        }
    } else {
        (Trend::Mixed, "MIXED (SMAs not aligned)".to_string())
    }
}

/// RSI banding: 70/60/40/30
pub fn classify_momentum(current: &FeatureSnapshot) -> (Momentum, String) {
    let Some(rsi) = current.rsi_14 else {
        return (Momentum::InsufficientData, "INSUFFICIENT_DATA".to_string());
    };

    if rsi > Decimal::from(70) {
        (
            Momentum::Overbought,
            "OVERBOUGHT (RSI > 70) - potential pullback".to_string(),
        )
    } else if rsi > Decimal::from(60) {
        (
            Momentum::Strong,
            "STRONG (RSI > 60) - bullish momentum".to_string(),
        )
    } else if rsi < Decimal::from(30) {
        (
            Momentum::Oversold,
            "OVERSOLD (RSI < 30) - potential bounce".to_string(),
        )
    } else if rsi < Decimal::from(40) {
        (
            Momentum::Weak,
            "WEAK (RSI < 40) - bearish momentum".to_string(),
        )
    } else {
        (Momentum::Neutral, "NEUTRAL (RSI 40-60)".to_string())
    }
}

/// ATR as a percentage of price, banded at 1.5% and 3%
pub fn classify_volatility(current: &FeatureSnapshot) -> (Volatility, String) {
    let Some(percent) = atr_percent(current) else {
        return (
            Volatility::InsufficientData,
            "INSUFFICIENT_DATA".to_string(),
        );
    };

    if percent > Decimal::from(3) {
        (
            Volatility::High,
            format!("HIGH (ATR {percent:.1}% of price) - significant daily swings"),
        )
    } else if percent > Decimal::new(15, 1) {
        (
            Volatility::Moderate,
            format!("MODERATE (ATR {percent:.1}% of price)"),
        )
    } else {
        (
            Volatility::Low,
            format!("LOW (ATR {percent:.1}% of price) - stable price action"),
        )
    }
}

/// Volume ratio banded at 0.8x / 1.5x / 2x average
pub fn classify_volume(current: &FeatureSnapshot) -> (VolumeActivity, String) {
    let Some(ratio) = current.volume_ratio else {
        return (
            VolumeActivity::InsufficientData,
            "INSUFFICIENT_DATA".to_string(),
        );
    };

    if ratio > Decimal::from(2) {
        (
            VolumeActivity::HighSpike,
            format!("HIGH SPIKE ({ratio:.1}x average) - strong interest"),
        )
    } else if ratio > Decimal::new(15, 1) {
        (
            VolumeActivity::Elevated,
            format!("ELEVATED ({ratio:.1}x average) - increased activity"),
        )
    } else if ratio > Decimal::new(8, 1) {
        (
            VolumeActivity::Normal,
            format!("NORMAL ({ratio:.1}x average)"),
        )
    } else {
        (
            VolumeActivity::Low,
            format!("LOW ({ratio:.1}x average) - reduced interest"),
        )
    }
}

/// ATR as a percent of the close, when both exist and the close is nonzero
pub fn atr_percent(current: &FeatureSnapshot) -> Option<Decimal> {
    match (current.atr_14, current.close_price) {
        (Some(atr), Some(price)) if !price.is_zero() => {
            Some(atr / price * Decimal::ONE_HUNDRED)
        }
        _ => None,
    }
}
