//! Series helpers shared by the catalogue and the rolling scalers.
//!
//! Rolling statistics are evaluated directly on each full window rather than
//! with running sums. That keeps a value at row `t` bit-identical no matter how
//! much history precedes the window, which is what lets a buffered transform
//! reproduce a batch computation exactly.

use crate::domain::Bar;

/// Extract one field of every bar as f64.
pub fn field(bars: &[Bar], f: impl Fn(&Bar) -> f64) -> Vec<f64> {
    bars.iter().map(f).collect()
}

pub fn closes(bars: &[Bar]) -> Vec<f64> {
    field(bars, |b| b.close)
}

pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    field(bars, |b| b.volume as f64)
}

/// (high + low + close) / 3
pub fn typical_price(bars: &[Bar]) -> Vec<f64> {
    field(bars, |b| (b.high + b.low + b.close) / 3.0)
}

/// (high + low) / 2
pub fn median_price(bars: &[Bar]) -> Vec<f64> {
    field(bars, |b| (b.high + b.low) / 2.0)
}

/// Apply `f` to every full trailing window of `window` values.
///
/// Rows before the first full window, and windows containing NaN, are NaN.
pub fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(slice);
    }
    result
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> f64 {
    let n = values.len();
    if n <= ddof {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - ddof) as f64).sqrt()
}

pub fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, mean)
}

pub fn rolling_sum(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().sum())
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, max_of)
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, min_of)
}

/// Rolling sample standard deviation (ddof = 1).
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| std_dev(w, 1))
}

/// Linearly weighted moving average, newest value weighted `period`.
pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    let denom = (period * (period + 1)) as f64 / 2.0;
    rolling(values, period, |w| {
        w.iter()
            .enumerate()
            .map(|(k, v)| (k + 1) as f64 * v)
            .sum::<f64>()
            / denom
    })
}

/// Recursive smoother seeded with the mean of the first `period` consecutive
/// defined values. Leading NaN are skipped; a NaN after the seed taints the
/// rest of the series.
pub fn seeded_smooth(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            run = 0;
            continue;
        }
        run += 1;
        if run == period {
            seed_end = Some(i + 1);
            break;
        }
    }
    let Some(seed_end) = seed_end else {
        return result;
    };

    let mut prev = mean(&values[seed_end - period..seed_end]);
    result[seed_end - 1] = prev;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Exponential moving average, alpha = 2 / (period + 1).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    seeded_smooth(values, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder smoothing, alpha = 1 / period.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    seeded_smooth(values, period, 1.0 / period as f64)
}

/// True range. Row 0 has no previous close and falls back to high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let range = bar.high - bar.low;
        if i == 0 {
            tr.push(range);
            continue;
        }
        let pc = bars[i - 1].close;
        tr.push(range.max((bar.high - pc).abs()).max((bar.low - pc).abs()));
    }
    tr
}

/// `values[t] - values[t - lag]`.
pub fn diff(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                f64::NAN
            } else {
                values[i] - values[i - lag]
            }
        })
        .collect()
}

/// `values[t - lag]`; the first `lag` rows are NaN.
pub fn shift(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i < lag { f64::NAN } else { values[i - lag] })
        .collect()
}

/// Element-wise combination of two equal-length series.
pub fn zip_with(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect()
}

/// `a / b`, NaN where `b` is zero.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        f64::NAN
    } else {
        a / b
    }
}

/// `a / b`, zero where `b` is zero.
///
/// For per-bar ratios over the bar's own range or volume: a flat or idle
/// bar is a valid observation and must not open a NaN hole.
pub fn div_or_zero(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}
