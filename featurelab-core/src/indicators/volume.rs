//! Volume-weighted indicators.
//!
//! Cumulative classics (OBV, accumulation/distribution, VWAP) are computed over
//! a 20-row rolling window so their value at a row depends on a bounded
//! history. Chaikin keeps the cumulative line and is registered as recursive.
//!
//! Every entry refuses a window whose volume is zero throughout (indices and
//! FX pairs are delivered with volume 0).

use super::series::{
    closes, diff, div_or_zero, ema, field, median_price, rolling_sum, safe_div, shift, sma,
    typical_price, volumes, zip_with,
};
use super::{require_bars, single, IndicatorError, IndicatorResult};
use crate::domain::Bar;

const ROLLING_PERIOD: usize = 20;
const EMV_SCALE: f64 = 100_000_000.0;

fn require_volume(bars: &[Bar], indicator: &'static str) -> Result<(), IndicatorError> {
    require_bars(bars)?;
    if bars.iter().all(|b| b.volume == 0) {
        return Err(IndicatorError::NoVolume { indicator });
    }
    Ok(())
}

/// Close location value times volume. A bar with high == low contributes 0.
fn money_flow_volume(bars: &[Bar]) -> Vec<f64> {
    field(bars, |b| {
        let range = b.high - b.low;
        if range == 0.0 {
            0.0
        } else {
            ((b.close - b.low) - (b.high - b.close)) / range * b.volume as f64
        }
    })
}

/// On-balance volume over a rolling window.
pub fn obv(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "obv")?;
    let change = diff(&closes(bars), 1);
    let signed = zip_with(&change, &volumes(bars), |c, v| {
        if c.is_nan() {
            f64::NAN
        } else if c > 0.0 {
            v
        } else if c < 0.0 {
            -v
        } else {
            0.0
        }
    });
    single("obv", rolling_sum(&signed, ROLLING_PERIOD))
}

/// Accumulation/distribution line over a rolling window.
pub fn adl(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "adl")?;
    single("adl", rolling_sum(&money_flow_volume(bars), ROLLING_PERIOD))
}

/// Volume-weighted typical price over a rolling window.
pub fn vwap(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "vwap")?;
    let v = volumes(bars);
    let pv = zip_with(&typical_price(bars), &v, |p, v| p * v);
    let values = zip_with(
        &rolling_sum(&pv, ROLLING_PERIOD),
        &rolling_sum(&v, ROLLING_PERIOD),
        safe_div,
    );
    single("vwap", values)
}

/// Money flow index (14). No negative flow → 100.
pub fn mfi(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "mfi")?;
    let tp = typical_price(bars);
    let prev = shift(&tp, 1);
    let n = bars.len();
    let mut positive = vec![f64::NAN; n];
    let mut negative = vec![f64::NAN; n];
    for i in 1..n {
        let flow = tp[i] * bars[i].volume as f64;
        positive[i] = if tp[i] > prev[i] { flow } else { 0.0 };
        negative[i] = if tp[i] < prev[i] { flow } else { 0.0 };
    }
    let pos = rolling_sum(&positive, 14);
    let neg = rolling_sum(&negative, 14);
    let values = zip_with(&pos, &neg, |p, n| {
        if p.is_nan() || n.is_nan() {
            f64::NAN
        } else if n == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + p / n)
        }
    });
    single("mfi", values)
}

/// Ease of movement (14).
pub fn emv(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "emv")?;
    let distance = diff(&median_price(bars), 1);
    // distance / (scaled volume / range), written so a flat or idle bar is 0
    let raw = bars
        .iter()
        .zip(&distance)
        .map(|(b, &d)| div_or_zero(d * (b.high - b.low), b.volume as f64 / EMV_SCALE))
        .collect::<Vec<_>>();
    single("emv", sma(&raw, 14))
}

/// Elder force index: EMA(13) of close change × volume.
pub fn efi(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "efi")?;
    let force = zip_with(&diff(&closes(bars), 1), &volumes(bars), |d, v| d * v);
    single("efi", ema(&force, 13))
}

/// Chaikin oscillator: EMA(3) - EMA(10) of the cumulative A/D line.
pub fn chaikin(bars: &[Bar]) -> IndicatorResult {
    require_volume(bars, "chaikin")?;
    let line: Vec<f64> = money_flow_volume(bars)
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect();
    single("chaikin", zip_with(&ema(&line, 3), &ema(&line, 10), |f, s| f - s))
}
