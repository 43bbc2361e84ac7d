//! Momentum and oscillator indicators.

use super::series::{
    self, closes, diff, ema, field, median_price, rolling, rolling_max, rolling_min, rolling_sum,
    safe_div, shift, sma, typical_price, wilder, zip_with,
};
use super::{require_bars, single, IndicatorColumn, IndicatorResult};
use crate::domain::Bar;

/// Positive part of a change, NaN preserved.
fn gain(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else {
        v.max(0.0)
    }
}

/// Negative part of a change as a positive number, NaN preserved.
fn loss(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else {
        (-v).max(0.0)
    }
}

/// Percentage rate of change over `period` rows.
pub fn rate_of_change(values: &[f64], period: usize) -> Vec<f64> {
    let past = shift(values, period);
    zip_with(values, &past, |now, then| 100.0 * safe_div(now - then, then))
}

pub fn roc(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("roc", rate_of_change(&closes(bars), 12))
}

pub fn mom(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("mom", diff(&closes(bars), 10))
}

/// Chande momentum oscillator (9).
pub fn cmo(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let d = diff(&closes(bars), 1);
    let up = rolling_sum(&d.iter().map(|&v| gain(v)).collect::<Vec<_>>(), 9);
    let down = rolling_sum(&d.iter().map(|&v| loss(v)).collect::<Vec<_>>(), 9);
    single("cmo", zip_with(&up, &down, |u, d| 100.0 * safe_div(u - d, u + d)))
}

/// Kaufman efficiency ratio (10): net change over the sum of absolute changes.
pub fn er(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let c = closes(bars);
    let change: Vec<f64> = diff(&c, 10).iter().map(|v| v.abs()).collect();
    let noise = rolling_sum(&diff(&c, 1).iter().map(|v| v.abs()).collect::<Vec<_>>(), 10);
    single("er", zip_with(&change, &noise, safe_div))
}

/// Williams %R (14).
pub fn williams(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let hh = rolling_max(&field(bars, |b| b.high), 14);
    let ll = rolling_min(&field(bars, |b| b.low), 14);
    let values = (0..bars.len())
        .map(|i| -100.0 * safe_div(hh[i] - bars[i].close, hh[i] - ll[i]))
        .collect();
    single("williams", values)
}

/// Stochastic oscillator: %K(14) and %D = SMA(%K, 3).
pub fn stoch(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let hh = rolling_max(&field(bars, |b| b.high), 14);
    let ll = rolling_min(&field(bars, |b| b.low), 14);
    let k: Vec<f64> = (0..bars.len())
        .map(|i| 100.0 * safe_div(bars[i].close - ll[i], hh[i] - ll[i]))
        .collect();
    let d = sma(&k, 3);
    Ok(vec![IndicatorColumn::new("k", k), IndicatorColumn::new("d", d)])
}

/// Ultimate oscillator over 7, 14 and 28 rows.
pub fn uo(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let pc = shift(&closes(bars), 1);
    let mut bp = Vec::with_capacity(bars.len());
    let mut tr = Vec::with_capacity(bars.len());
    for (bar, &prev) in bars.iter().zip(pc.iter()) {
        if prev.is_nan() {
            bp.push(f64::NAN);
            tr.push(f64::NAN);
            continue;
        }
        let floor = bar.low.min(prev);
        bp.push(bar.close - floor);
        tr.push(bar.high.max(prev) - floor);
    }
    let avg = |p: usize| zip_with(&rolling_sum(&bp, p), &rolling_sum(&tr, p), safe_div);
    let (a7, a14, a28) = (avg(7), avg(14), avg(28));
    let values = (0..bars.len())
        .map(|i| 100.0 * (4.0 * a7[i] + 2.0 * a14[i] + a28[i]) / 7.0)
        .collect();
    single("uo", values)
}

/// Awesome oscillator: SMA(median, 5) - SMA(median, 34).
pub fn ao(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let mp = median_price(bars);
    single("ao", zip_with(&sma(&mp, 5), &sma(&mp, 34), |f, s| f - s))
}

/// Coppock curve: WMA(ROC(14) + ROC(11), 10).
pub fn copp(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let c = closes(bars);
    let sum = zip_with(&rate_of_change(&c, 14), &rate_of_change(&c, 11), |a, b| a + b);
    single("copp", series::wma(&sum, 10))
}

/// Commodity channel index (20).
pub fn cci(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let values = rolling(&typical_price(bars), 20, |w| {
        let m = series::mean(w);
        let mad = w.iter().map(|v| (v - m).abs()).sum::<f64>() / w.len() as f64;
        safe_div(w[w.len() - 1] - m, 0.015 * mad)
    });
    single("cci", values)
}

/// Wilder RSI of an arbitrary series.
///
/// avg_loss == 0 → 100.
pub fn relative_strength(values: &[f64], period: usize) -> Vec<f64> {
    let d = diff(values, 1);
    let gains = wilder(&d.iter().map(|&v| gain(v)).collect::<Vec<_>>(), period);
    let losses = wilder(&d.iter().map(|&v| loss(v)).collect::<Vec<_>>(), period);
    zip_with(&gains, &losses, |g, l| {
        if g.is_nan() || l.is_nan() {
            f64::NAN
        } else if l == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        }
    })
}

pub fn rsi(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("rsi", relative_strength(&closes(bars), 14))
}

/// Stochastic RSI: position of RSI(14) within its 14-row range.
pub fn stochrsi(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let r = relative_strength(&closes(bars), 14);
    let hi = rolling_max(&r, 14);
    let lo = rolling_min(&r, 14);
    let values = (0..r.len()).map(|i| safe_div(r[i] - lo[i], hi[i] - lo[i])).collect();
    single("stochrsi", values)
}

/// Line, signal and histogram from a fast/slow spread.
fn oscillator(line: Vec<f64>, signal_period: usize) -> IndicatorResult {
    let signal = ema(&line, signal_period);
    let histogram = zip_with(&line, &signal, |l, s| l - s);
    Ok(vec![
        IndicatorColumn::new("line", line),
        IndicatorColumn::new("signal", signal),
        IndicatorColumn::new("histogram", histogram),
    ])
}

/// MACD(12, 26, 9).
pub fn macd(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let c = closes(bars);
    let line = zip_with(&ema(&c, 12), &ema(&c, 26), |f, s| f - s);
    oscillator(line, 9)
}

/// Percentage price oscillator(12, 26, 9).
pub fn ppo(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let c = closes(bars);
    let line = zip_with(&ema(&c, 12), &ema(&c, 26), |f, s| 100.0 * safe_div(f - s, s));
    oscillator(line, 9)
}

/// True strength index(25, 13) with a 13-row signal.
pub fn tsi(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let d = diff(&closes(bars), 1);
    let abs: Vec<f64> = d.iter().map(|v| v.abs()).collect();
    let num = ema(&ema(&d, 25), 13);
    let den = ema(&ema(&abs, 25), 13);
    let line = zip_with(&num, &den, |n, d| 100.0 * safe_div(n, d));
    let signal = ema(&line, 13);
    Ok(vec![
        IndicatorColumn::new("line", line),
        IndicatorColumn::new("signal", signal),
    ])
}

/// TRIX(20): one-row percentage change of a triple EMA.
pub fn trix(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let triple = ema(&ema(&ema(&closes(bars), 20), 20), 20);
    single("trix", rate_of_change(&triple, 1))
}
