//! Bar-aligned indicator series.
//!
//! Every function returns a vector the same length as its input; position `i`
//! holds the indicator value at bar `i`, or `None` while the window is still
//! filling. Non-finite results are mapped to `None`.

use analysis_core::stats::{finite, mean, mean_abs_deviation, std_dev};
use analysis_core::PriceBar;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = finite(sum / period as f64);
    }
    result
}

/// Rolling mean over an optional series; defined only where the whole window is.
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }

    for i in period - 1..values.len() {
        let window: Option<Vec<f64>> = values[i + 1 - period..=i].iter().copied().collect();
        if let Some(window) = window {
            result[i] = finite(mean(&window));
        }
    }
    result
}

/// Exponential Moving Average over an optional series.
///
/// Seeded with the SMA of the first `period` defined values, then
/// `ema = (x - prev) * 2/(period+1) + prev`. Leading `None`s are skipped.
pub fn ema(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut seed: Vec<f64> = Vec::with_capacity(period);
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(x) = *value else {
            continue;
        };
        match prev {
            Some(p) => {
                let next = (x - p) * multiplier + p;
                prev = Some(next);
                result[i] = finite(next);
            }
            None => {
                seed.push(x);
                if seed.len() == period {
                    let start = mean(&seed);
                    prev = Some(start);
                    result[i] = finite(start);
                }
            }
        }
    }

    result
}

/// Relative Strength Index (Wilder smoothing)
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += change.abs();
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = finite(rsi_from_averages(avg_gain, avg_loss));

    for i in period + 1..data.len() {
        let change = data[i] - data[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, change.abs()) };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        result[i] = finite(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // Flat series is neutral; all-gain series is maximally strong.
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let n = data.len();
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period <= fast_period {
        return MacdResult {
            macd_line: vec![None; n],
            signal_line: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let closes: Vec<Option<f64>> = data.iter().copied().map(Some).collect();
    let ema_fast = ema(&closes, fast_period);
    let ema_slow = ema(&closes, slow_period);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => finite(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema(&macd_line, signal_period);

    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => finite(m - s),
            _ => None,
        })
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    /// %B: position of the close inside the bands (0 = lower, 1 = upper)
    pub percent_b: Vec<Option<f64>>,
    /// Band width as a percentage of the middle band
    pub width: Vec<Option<f64>>,
}

/// Bands use the sample standard deviation (n - 1) of the window.
pub fn bollinger_bands(data: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let n = data.len();
    let mut bands = BollingerBands {
        upper: vec![None; n],
        middle: vec![None; n],
        lower: vec![None; n],
        percent_b: vec![None; n],
        width: vec![None; n],
    };
    if period == 0 || n < period {
        return bands;
    }

    for i in period - 1..n {
        let slice = &data[i + 1 - period..=i];
        let mid = mean(slice);
        let std = std_dev(slice);
        let upper = mid + num_std * std;
        let lower = mid - num_std * std;

        bands.upper[i] = finite(upper);
        bands.middle[i] = finite(mid);
        bands.lower[i] = finite(lower);
        bands.percent_b[i] = if upper - lower != 0.0 {
            finite((data[i] - lower) / (upper - lower))
        } else {
            Some(0.5)
        };
        bands.width[i] = if mid != 0.0 {
            finite((upper - lower) / mid * 100.0)
        } else {
            None
        };
    }

    bands
}

/// Average True Range (Wilder smoothing)
pub fn atr(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return result;
    }

    let true_range = |i: usize| {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        high_low.max(high_close).max(low_close)
    };

    let mut atr = (1..=period).map(true_range).sum::<f64>() / period as f64;
    result[period] = finite(atr);

    for i in period + 1..bars.len() {
        atr = (atr * (period - 1) as f64 + true_range(i)) / period as f64;
        result[i] = finite(atr);
    }

    result
}

/// Highest high and lowest low over the window ending at `i`.
fn range_extremes(bars: &[PriceBar], i: usize, period: usize) -> (f64, f64) {
    let slice = &bars[i + 1 - period..=i];
    let highest = slice.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = slice.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    (highest, lowest)
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

pub fn stochastic(bars: &[PriceBar], k_period: usize, d_period: usize) -> StochasticResult {
    let mut k_values = vec![None; bars.len()];
    if k_period == 0 || bars.len() < k_period {
        return StochasticResult {
            d: vec![None; bars.len()],
            k: k_values,
        };
    }

    for i in k_period - 1..bars.len() {
        let (highest, lowest) = range_extremes(bars, i, k_period);
        k_values[i] = if highest == lowest {
            Some(50.0)
        } else {
            finite(100.0 * (bars[i].close - lowest) / (highest - lowest))
        };
    }

    let d_values = rolling_mean(&k_values, d_period);

    StochasticResult {
        k: k_values,
        d: d_values,
    }
}

/// Williams %R, in [-100, 0]
pub fn williams_r(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return result;
    }

    for i in period - 1..bars.len() {
        let (highest, lowest) = range_extremes(bars, i, period);
        result[i] = if highest == lowest {
            Some(-50.0)
        } else {
            finite(-100.0 * (highest - bars[i].close) / (highest - lowest))
        };
    }
    result
}

/// Commodity Channel Index
pub fn cci(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return result;
    }

    let typical: Vec<f64> = bars.iter().map(PriceBar::typical_price).collect();
    for i in period - 1..bars.len() {
        let window = &typical[i + 1 - period..=i];
        let mad = mean_abs_deviation(window);
        result[i] = if mad == 0.0 {
            Some(0.0)
        } else {
            finite((typical[i] - mean(window)) / (0.015 * mad))
        };
    }
    result
}

/// Rate of change in percent over `period` bars
pub fn roc(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 {
        return result;
    }

    for i in period..data.len() {
        let prev = data[i - period];
        if prev != 0.0 {
            result[i] = finite((data[i] / prev - 1.0) * 100.0);
        }
    }
    result
}

/// Current volume divided by the rolling average volume (current bar included)
pub fn volume_ratio(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    sma(&volumes, period)
        .into_iter()
        .zip(&volumes)
        .map(|(avg, &vol)| match avg {
            Some(avg) if avg > 0.0 => finite(vol / avg),
            _ => None,
        })
        .collect()
}

/// On-Balance Volume, starting at 0 on the first bar
pub fn obv(bars: &[PriceBar]) -> Vec<Option<f64>> {
    if bars.is_empty() {
        return vec![];
    }

    let mut obv_values = Vec::with_capacity(bars.len());
    let mut running = 0.0;
    obv_values.push(Some(running));

    for i in 1..bars.len() {
        if bars[i].close > bars[i - 1].close {
            running += bars[i].volume;
        } else if bars[i].close < bars[i - 1].close {
            running -= bars[i].volume;
        }
        obv_values.push(finite(running));
    }

    obv_values
}
