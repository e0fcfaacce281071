use analysis_core::decimal::{round0, round2};
use analysis_core::{Bar, FeatureSnapshot, Market};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use technical_indicators::{atr, bollinger_bands, ema, macd, rsi, sma, MacdState};

/// Stamped into every snapshot so stored features can be traced back to the
/// computation that produced them.
pub const ENGINE_VERSION: &str = "1.0.0";

/// Build the feature snapshot for `date` from the bar window ending at
/// `date`. The caller supplies the lookback window; nothing is fetched here.
///
/// `previous` is the prior trading day's snapshot. Its `ema_12`, `ema_26`
/// and `macd_signal` fields seed the EMAs so the MACD line and its signal
/// line stay continuous across daily runs; without it the EMAs re-seed from
/// SMA and the signal line starts its warm-up.
///
/// Deterministic and idempotent: the same inputs always produce the same
/// snapshot. An empty bar window yields an all-`None` snapshot rather than
/// an error.
pub fn compute_snapshot(
    symbol: &str,
    market: Market,
    date: NaiveDate,
    bars: &[Bar],
    previous: Option<&FeatureSnapshot>,
) -> FeatureSnapshot {
    let Some(latest) = bars.last() else {
        return empty_snapshot(symbol, market, date);
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let prev_ema_12 = previous.and_then(|p| p.ema_12).and_then(|d| d.to_f64());
    let prev_ema_26 = previous.and_then(|p| p.ema_26).and_then(|d| d.to_f64());
    let prev_signal = previous.and_then(|p| p.macd_signal).and_then(|d| d.to_f64());

    let sma_20 = sma(&closes, 20);
    let sma_50 = sma(&closes, 50);
    let sma_200 = sma(&closes, 200);
    let ema_12 = ema(&closes, 12, prev_ema_12);
    let ema_26 = ema(&closes, 26, prev_ema_26);

    let rsi_14 = rsi(&closes, 14);
    let macd_out = macd(
        &closes,
        12,
        26,
        9,
        MacdState {
            fast_ema: prev_ema_12,
            slow_ema: prev_ema_26,
            signal_ema: prev_signal,
        },
    );
    // First MACD observation seeds the signal EMA; smoothing (and the
    // histogram) starts on the next run.
    let macd_signal = macd_out.signal.or(macd_out.macd);

    let bands = bollinger_bands(&closes, 20, 2.0);
    let atr_14 = atr(bars, 14);

    let volume_sma_20 = sma(&volumes, 20);
    let volume_ratio = match volume_sma_20 {
        Some(avg) if avg > 0.0 => Some(latest.volume / avg),
        _ => None,
    };

    FeatureSnapshot {
        symbol: symbol.to_string(),
        market,
        date,
        close_price: round2(latest.close),
        volume: round0(latest.volume),
        sma_20: sma_20.and_then(round2),
        sma_50: sma_50.and_then(round2),
        sma_200: sma_200.and_then(round2),
        ema_12: ema_12.and_then(round2),
        ema_26: ema_26.and_then(round2),
        rsi_14: rsi_14.and_then(round2),
        macd: macd_out.macd.and_then(round2),
        macd_signal: macd_signal.and_then(round2),
        macd_histogram: macd_out.histogram.and_then(round2),
        bb_upper: bands.upper.and_then(round2),
        bb_middle: bands.middle.and_then(round2),
        bb_lower: bands.lower.and_then(round2),
        atr_14: atr_14.and_then(round2),
        volume_sma_20: volume_sma_20.and_then(round0),
        volume_ratio: volume_ratio.and_then(round2),
        engine_version: ENGINE_VERSION.to_string(),
    }
}

fn empty_snapshot(symbol: &str, market: Market, date: NaiveDate) -> FeatureSnapshot {
    FeatureSnapshot {
        symbol: symbol.to_string(),
        market,
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
        engine_version: ENGINE_VERSION.to_string(),
    }
}
