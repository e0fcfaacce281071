//! Latest-value technical indicators over a daily bar window.
//!
//! Every function takes the full available history and returns the
//! indicator's value for the most recent bar, or `None` when the window is
//! too short for the period. Nothing here panics on short input, and no
//! result is ever NaN or infinite for finite inputs. All math is `f64`;
//! rounding to storage precision is the feature calculator's job.

use analysis_core::Bar;

/// Simple Moving Average over the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Exponential Moving Average.
///
/// With a `previous` EMA this is the standard one-step update
/// `(latest - previous) * k + previous` with `k = 2/(period+1)`. Without one
/// it seeds from the SMA, so a cold start needs `period` values.
pub fn ema(values: &[f64], period: usize, previous: Option<f64>) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let latest = *values.last()?;
    match previous {
        Some(prev) => {
            let multiplier = 2.0 / (period as f64 + 1.0);
            Some((latest - prev) * multiplier + prev)
        }
        None => sma(values, period),
    }
}

/// Relative Strength Index over the last `period` deltas.
///
/// Cutler's form: simple averages of gains and losses, not Wilder
/// smoothing. Returns exactly 100 when there are no losses in the window.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &changes[changes.len() - period..];

    let avg_gain: f64 = recent.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let avg_loss: f64 =
        recent.iter().filter(|c| **c < 0.0).map(|c| c.abs()).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// EMA state carried between daily runs so the MACD line and its signal
/// line are continuous across the pipeline instead of re-seeding from SMA
/// on every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdState {
    pub fast_ema: Option<f64>,
    pub slow_ema: Option<f64>,
    pub signal_ema: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdOutput {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// MACD line with its signal line and histogram.
///
/// The signal line is an EMA over historical MACD values, so it only exists
/// when `state.signal_ema` carries the prior run's value; on a cold start
/// the line (and histogram) stay `None` until the next run.
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    state: MacdState,
) -> MacdOutput {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || values.len() < slow_period {
        return MacdOutput::default();
    }

    let fast_ema = ema(values, fast_period, state.fast_ema);
    let slow_ema = ema(values, slow_period, state.slow_ema);

    let (Some(fast), Some(slow)) = (fast_ema, slow_ema) else {
        return MacdOutput::default();
    };

    let macd_line = fast - slow;

    let signal_line = state.signal_ema.map(|prev| {
        let multiplier = 2.0 / (signal_period as f64 + 1.0);
        (macd_line - prev) * multiplier + prev
    });
    let histogram = signal_line.map(|signal| macd_line - signal);

    MacdOutput {
        macd: Some(macd_line),
        signal: signal_line,
        histogram,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BollingerBands {
    pub upper: Option<f64>,
    pub middle: Option<f64>,
    pub lower: Option<f64>,
}

/// Bollinger Bands: SMA middle band, population standard deviation over the
/// same window, upper/lower at `middle ± std_dev_multiplier * stddev`
pub fn bollinger_bands(values: &[f64], period: usize, std_dev_multiplier: f64) -> BollingerBands {
    let Some(middle) = sma(values, period) else {
        return BollingerBands::default();
    };

    let window = &values[values.len() - period..];
    let variance: f64 =
        window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    BollingerBands {
        upper: Some(middle + std_dev * std_dev_multiplier),
        middle: Some(middle),
        lower: Some(middle - std_dev * std_dev_multiplier),
    }
}

/// Average True Range: simple average of the last `period` true ranges,
/// where TR = max(high-low, |high-prevClose|, |low-prevClose|)
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            let high_low = w[1].high - w[1].low;
            let high_close = (w[1].high - w[0].close).abs();
            let low_close = (w[1].low - w[0].close).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect();

    let recent = &true_ranges[true_ranges.len() - period..];
    Some(recent.iter().sum::<f64>() / period as f64)
}
