//! Volatility bands and ranges.
//!
//! Bollinger-family entries share one SMA(20) ± 2σ computation (sample σ).
//! ATR and everything built on it use Wilder smoothing of the true range, with
//! row 0 left undefined because it has no previous close.

use super::series::{
    closes, ema, field, rolling_max, rolling_min, rolling_std, rolling_sum, safe_div, sma,
    true_range, wilder, zip_with,
};
use super::{require_bars, single, IndicatorColumn, IndicatorResult};
use crate::domain::Bar;

const BB_PERIOD: usize = 20;
const BB_WIDTH: f64 = 2.0;

/// True range with row 0 undefined.
fn strict_true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    tr
}

/// Wilder ATR.
pub fn average_true_range(bars: &[Bar], period: usize) -> Vec<f64> {
    wilder(&strict_true_range(bars), period)
}

pub fn tr(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("tr", strict_true_range(bars))
}

pub fn atr(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("atr", average_true_range(bars, 14))
}

struct Bands {
    upper: Vec<f64>,
    middle: Vec<f64>,
    lower: Vec<f64>,
}

fn bollinger(bars: &[Bar]) -> Bands {
    let c = closes(bars);
    let middle = sma(&c, BB_PERIOD);
    let sd = rolling_std(&c, BB_PERIOD);
    Bands {
        upper: zip_with(&middle, &sd, |m, s| m + BB_WIDTH * s),
        lower: zip_with(&middle, &sd, |m, s| m - BB_WIDTH * s),
        middle,
    }
}

pub fn bbands(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let b = bollinger(bars);
    Ok(vec![
        IndicatorColumn::new("upper", b.upper),
        IndicatorColumn::new("middle", b.middle),
        IndicatorColumn::new("lower", b.lower),
    ])
}

/// Band width relative to the middle band.
pub fn bbwidth(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let b = bollinger(bars);
    let values = (0..bars.len())
        .map(|i| safe_div(b.upper[i] - b.lower[i], b.middle[i]))
        .collect();
    single("bbwidth", values)
}

/// Position of the close inside the bands (0 = lower, 1 = upper).
pub fn percent_b(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let b = bollinger(bars);
    let values = (0..bars.len())
        .map(|i| safe_div(bars[i].close - b.lower[i], b.upper[i] - b.lower[i]))
        .collect();
    single("percent_b", values)
}

/// Donchian channel (20).
pub fn donchian(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let upper = rolling_max(&field(bars, |b| b.high), 20);
    let lower = rolling_min(&field(bars, |b| b.low), 20);
    let middle = zip_with(&upper, &lower, |u, l| (u + l) / 2.0);
    Ok(vec![
        IndicatorColumn::new("upper", upper),
        IndicatorColumn::new("middle", middle),
        IndicatorColumn::new("lower", lower),
    ])
}

/// Moving standard deviation of the close (21).
pub fn msd(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("msd", rolling_std(&closes(bars), 21))
}

/// Vortex indicator (14): VI+ and VI-.
pub fn vortex(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let n = bars.len();
    let mut vm_plus = vec![f64::NAN; n];
    let mut vm_minus = vec![f64::NAN; n];
    for i in 1..n {
        vm_plus[i] = (bars[i].high - bars[i - 1].low).abs();
        vm_minus[i] = (bars[i].low - bars[i - 1].high).abs();
    }
    let tr_sum = rolling_sum(&strict_true_range(bars), 14);
    Ok(vec![
        IndicatorColumn::new("vip", zip_with(&rolling_sum(&vm_plus, 14), &tr_sum, safe_div)),
        IndicatorColumn::new("vim", zip_with(&rolling_sum(&vm_minus, 14), &tr_sum, safe_div)),
    ])
}

/// Keltner channel: EMA(20) ± 2·ATR(10).
pub fn keltner(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let middle = ema(&closes(bars), 20);
    let range = average_true_range(bars, 10);
    let upper = zip_with(&middle, &range, |m, a| m + 2.0 * a);
    let lower = zip_with(&middle, &range, |m, a| m - 2.0 * a);
    Ok(vec![
        IndicatorColumn::new("upper", upper),
        IndicatorColumn::new("middle", middle),
        IndicatorColumn::new("lower", lower),
    ])
}

/// Chandelier exit (22, 3×ATR).
pub fn chandelier(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let range = average_true_range(bars, 22);
    let hh = rolling_max(&field(bars, |b| b.high), 22);
    let ll = rolling_min(&field(bars, |b| b.low), 22);
    Ok(vec![
        IndicatorColumn::new("long", zip_with(&hh, &range, |h, a| h - 3.0 * a)),
        IndicatorColumn::new("short", zip_with(&ll, &range, |l, a| l + 3.0 * a)),
    ])
}

/// Mass index: 25-row sum of EMA9(range) / EMA9(EMA9(range)).
pub fn mass_index(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let range = field(bars, |b| b.high - b.low);
    let single_ema = ema(&range, 9);
    let double_ema = ema(&single_ema, 9);
    let ratio = zip_with(&single_ema, &double_ema, safe_div);
    single("mi", rolling_sum(&ratio, 25))
}
