//! Trend-following and price-structure indicators.

use super::series::{
    div_or_zero, field, rolling_max, rolling_min, safe_div, shift, sma, typical_price, wilder,
    zip_with,
};
use super::volatility::average_true_range;
use super::{require_bars, single, IndicatorColumn, IndicatorResult};
use crate::domain::Bar;

const AROON_PERIOD: usize = 25;
const ICHIMOKU_DISPLACEMENT: usize = 26;

/// Aroon up/down (25): how recently the window's extreme occurred.
///
/// Aroon Up = 100 * (period - bars_since_highest_high) / period.
/// Ties resolve to the most recent bar.
pub fn aroon(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let n = bars.len();
    let period = AROON_PERIOD;
    let mut up = vec![f64::NAN; n];
    let mut down = vec![f64::NAN; n];

    for i in period..n {
        let window = &bars[i - period..=i];
        let mut max_val = f64::NEG_INFINITY;
        let mut max_offset = 0;
        let mut min_val = f64::INFINITY;
        let mut min_offset = 0;
        for (j, bar) in window.iter().enumerate() {
            if bar.high >= max_val {
                max_val = bar.high;
                max_offset = j;
            }
            if bar.low <= min_val {
                min_val = bar.low;
                min_offset = j;
            }
        }
        // offset == period means the extreme is the current bar
        up[i] = 100.0 * max_offset as f64 / period as f64;
        down[i] = 100.0 * min_offset as f64 / period as f64;
    }

    Ok(vec![
        IndicatorColumn::new("up", up),
        IndicatorColumn::new("down", down),
    ])
}

/// Midpoint of the highest high and lowest low over `period`.
fn midpoint(bars: &[Bar], period: usize) -> Vec<f64> {
    let hh = rolling_max(&field(bars, |b| b.high), period);
    let ll = rolling_min(&field(bars, |b| b.low), period);
    zip_with(&hh, &ll, |h, l| (h + l) / 2.0)
}

/// Ichimoku cloud (9, 26, 52). The lagging span is omitted: it is the close
/// shifted into the past, i.e. future data at every row.
pub fn ichimoku(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let tenkan = midpoint(bars, 9);
    let kijun = midpoint(bars, 26);
    let senkou_a = shift(
        &zip_with(&tenkan, &kijun, |t, k| (t + k) / 2.0),
        ICHIMOKU_DISPLACEMENT,
    );
    let senkou_b = shift(&midpoint(bars, 52), ICHIMOKU_DISPLACEMENT);
    Ok(vec![
        IndicatorColumn::new("tenkan", tenkan),
        IndicatorColumn::new("kijun", kijun),
        IndicatorColumn::new("senkou_a", senkou_a),
        IndicatorColumn::new("senkou_b", senkou_b),
    ])
}

/// Q-stick (14): SMA of close - open.
pub fn qstick(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("qstick", sma(&field(bars, |b| b.close - b.open), 14))
}

/// Classic floor pivots from the previous bar.
pub fn pivot(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let pp = shift(&typical_price(bars), 1);
    let range = shift(&field(bars, |b| b.high - b.low), 1);
    let prev_high = shift(&field(bars, |b| b.high), 1);
    let prev_low = shift(&field(bars, |b| b.low), 1);
    Ok(vec![
        IndicatorColumn::new("r1", zip_with(&pp, &prev_low, |p, l| 2.0 * p - l)),
        IndicatorColumn::new("s1", zip_with(&pp, &prev_high, |p, h| 2.0 * p - h)),
        IndicatorColumn::new("r2", zip_with(&pp, &range, |p, r| p + r)),
        IndicatorColumn::new("s2", zip_with(&pp, &range, |p, r| p - r)),
        IndicatorColumn::new("pp", pp),
    ])
}

/// Balance of power: (close - open) / (high - low). A flat bar scores 0.
pub fn bop(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single(
        "bop",
        field(bars, |b| div_or_zero(b.close - b.open, b.high - b.low)),
    )
}

pub fn tp(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("tp", typical_price(bars))
}

struct Directional {
    plus_di: Vec<f64>,
    minus_di: Vec<f64>,
}

/// Wilder +DI / -DI.
fn directional(bars: &[Bar], period: usize) -> Directional {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };
    }

    let smooth_tr = average_true_range(bars, period);
    let smooth_plus = wilder(&plus_dm, period);
    let smooth_minus = wilder(&minus_dm, period);
    Directional {
        plus_di: zip_with(&smooth_plus, &smooth_tr, |dm, tr| 100.0 * safe_div(dm, tr)),
        minus_di: zip_with(&smooth_minus, &smooth_tr, |dm, tr| 100.0 * safe_div(dm, tr)),
    }
}

/// Average directional index (14).
pub fn adx(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let d = directional(bars, 14);
    let dx = zip_with(&d.plus_di, &d.minus_di, |p, m| {
        if p.is_nan() || m.is_nan() {
            f64::NAN
        } else if p + m == 0.0 {
            0.0
        } else {
            100.0 * (p - m).abs() / (p + m)
        }
    });
    single("adx", wilder(&dx, 14))
}

/// Directional movement index (14): +DI and -DI.
pub fn dmi(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let d = directional(bars, 14);
    Ok(vec![
        IndicatorColumn::new("plus", d.plus_di),
        IndicatorColumn::new("minus", d.minus_di),
    ])
}

/// Parabolic SAR (0.02, 0.02, 0.20).
pub fn sar(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    single("sar", parabolic_sar(bars, 0.02, 0.02, 0.20))
}

/// Wilder's stop-and-reverse. Direction starts from the first two closes.
pub fn parabolic_sar(bars: &[Bar], af_start: f64, af_step: f64, af_max: f64) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if n < 2 {
        return result;
    }

    let mut is_long = bars[1].close >= bars[0].close;
    let mut af = af_start;
    let (mut sar, mut ep) = if is_long {
        (bars[0].low, bars[1].high)
    } else {
        (bars[0].high, bars[1].low)
    };
    result[1] = sar;

    for i in 2..n {
        let mut next = sar + af * (ep - sar);
        if is_long {
            next = next.min(bars[i - 1].low).min(bars[i - 2].low);
            if bars[i].low < next {
                is_long = false;
                next = ep;
                ep = bars[i].low;
                af = af_start;
            } else if bars[i].high > ep {
                ep = bars[i].high;
                af = (af + af_step).min(af_max);
            }
        } else {
            next = next.max(bars[i - 1].high).max(bars[i - 2].high);
            if bars[i].high > next {
                is_long = true;
                next = ep;
                ep = bars[i].high;
                af = af_start;
            } else if bars[i].low < ep {
                ep = bars[i].low;
                af = (af + af_step).min(af_max);
            }
        }
        sar = next;
        result[i] = sar;
    }
    result
}

/// Supertrend (10, 3×ATR): the active trailing band.
pub fn supertrend(bars: &[Bar]) -> IndicatorResult {
    require_bars(bars)?;
    let n = bars.len();
    let multiplier = 3.0;
    let atr = average_true_range(bars, 10);
    let mut result = vec![f64::NAN; n];

    let Some(start) = atr.iter().position(|v| !v.is_nan()) else {
        return single("supertrend", result);
    };

    let hl2 = |b: &Bar| (b.high + b.low) / 2.0;
    let mut upper = hl2(&bars[start]) + multiplier * atr[start];
    let mut lower = hl2(&bars[start]) - multiplier * atr[start];
    let mut trending_up = true;
    result[start] = lower;

    for i in (start + 1)..n {
        let basic_upper = hl2(&bars[i]) + multiplier * atr[i];
        let basic_lower = hl2(&bars[i]) - multiplier * atr[i];
        let prev_close = bars[i - 1].close;
        upper = if prev_close <= upper {
            basic_upper.min(upper)
        } else {
            basic_upper
        };
        lower = if prev_close >= lower {
            basic_lower.max(lower)
        } else {
            basic_lower
        };

        if trending_up && bars[i].close < lower {
            trending_up = false;
        } else if !trending_up && bars[i].close > upper {
            trending_up = true;
        }
        result[i] = if trending_up { lower } else { upper };
    }

    single("supertrend", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, make_wavy_bars, DEFAULT_EPSILON};

    #[test]
    fn aroon_rising_series_is_100_up() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let cols = aroon(&make_bars(&closes)).unwrap();
        assert!(cols[0].values[24].is_nan());
        assert_approx(cols[0].values[30], 100.0, DEFAULT_EPSILON);
        // lowest low is the oldest bar in the window
        assert_approx(cols[1].values[30], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ichimoku_senkou_is_displaced() {
        let bars = make_wavy_bars(120);
        let cols = ichimoku(&bars).unwrap();
        let (tenkan, kijun, senkou_a) = (&cols[0].values, &cols[1].values, &cols[2].values);
        for i in 51..120 {
            let j = i - ICHIMOKU_DISPLACEMENT;
            assert_approx(senkou_a[i], (tenkan[j] + kijun[j]) / 2.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn pivot_levels_bracket_pp() {
        let bars = make_wavy_bars(30);
        let cols = pivot(&bars).unwrap();
        let pp = &cols[4].values;
        assert_eq!(cols[4].label, "pp");
        for i in 1..30 {
            assert!(cols[0].values[i] > pp[i]);
            assert!(cols[1].values[i] < pp[i]);
        }
    }

    #[test]
    fn bop_flat_bar_is_zero() {
        let mut bars = make_bars(&[10.0, 11.0]);
        bars[1].high = 11.0;
        bars[1].low = 11.0;
        bars[1].open = 11.0;
        let out = &bop(&bars).unwrap()[0].values;
        assert_eq!(out[1], 0.0);
        assert_approx(out[0], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sar_below_price_in_uptrend() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
        let bars = make_bars(&closes);
        let out = parabolic_sar(&bars, 0.02, 0.02, 0.20);
        for i in 2..30 {
            assert!(out[i] < closes[i], "sar {} above close {} at {i}", out[i], closes[i]);
        }
    }

    #[test]
    fn supertrend_uptrend_below_price() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let bars = make_bars(&closes);
        let out = &supertrend(&bars).unwrap()[0].values;
        assert!(out[9].is_nan());
        for i in 10..40 {
            assert!(out[i] < bars[i].close);
        }
    }

    #[test]
    fn adx_strong_trend_is_high() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + 3.0 * i as f64).collect();
        let out = &adx(&make_bars(&closes)).unwrap()[0].values;
        assert!(out[79] > 50.0, "adx {}", out[79]);
        let dmi = dmi(&make_bars(&closes)).unwrap();
        assert!(dmi[0].values[79] > dmi[1].values[79]);
    }
}
