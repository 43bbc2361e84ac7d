//! Moving averages of the close.
//!
//! Windowed: SMA(41), WMA(9), Hull(16), triangular(18), moving median(9).
//! Recursive: EMA(9) and its double/triple compositions.

use super::series::{self, closes, rolling, zip_with};
use super::{require_bars, single, IndicatorResult};
use crate::domain::Bar;

pub const SMA_PERIOD: usize = 41;
pub const WMA_PERIOD: usize = 9;
pub const HMA_PERIOD: usize = 16;
pub const TRIMA_PERIOD: usize = 18;
pub const SMM_PERIOD: usize = 9;
pub const EMA_PERIOD: usize = 9;

pub fn sma(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("sma", series::sma(&closes(bars), SMA_PERIOD))
}

pub fn wma(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("wma", series::wma(&closes(bars), WMA_PERIOD))
}

/// Hull moving average: WMA(2·WMA(n/2) − WMA(n), √n).
pub fn hull(values: &[f64], period: usize) -> Vec<f64> {
    let half = series::wma(values, period / 2);
    let full = series::wma(values, period);
    let raw = zip_with(&half, &full, |h, f| 2.0 * h - f);
    let root = (period as f64).sqrt().floor() as usize;
    series::wma(&raw, root)
}

pub fn hma(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("hma", hull(&closes(bars), HMA_PERIOD))
}

pub fn trima(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let inner = series::sma(&closes(bars), TRIMA_PERIOD);
    single("trima", series::sma(&inner, TRIMA_PERIOD))
}

fn median(window: &[f64]) -> f64 {
    let mut sorted = window.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Simple moving median.
pub fn smm(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("smm", rolling(&closes(bars), SMM_PERIOD, median))
}

pub fn ema(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("ema", series::ema(&closes(bars), EMA_PERIOD))
}

/// 2·EMA − EMA(EMA)
pub fn dema(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let e1 = series::ema(&closes(bars), EMA_PERIOD);
    let e2 = series::ema(&e1, EMA_PERIOD);
    single("dema", zip_with(&e1, &e2, |a, b| 2.0 * a - b))
}

/// 3·EMA − 3·EMA(EMA) + EMA(EMA(EMA))
pub fn tema(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let e1 = series::ema(&closes(bars), EMA_PERIOD);
    let e2 = series::ema(&e1, EMA_PERIOD);
    let e3 = series::ema(&e2, EMA_PERIOD);
    let values = (0..e1.len())
        .map(|i| 3.0 * e1[i] - 3.0 * e2[i] + e3[i])
        .collect();
    single("tema", values)
}
