//! Supervised targets: did the next session close above its open?
//!
//! For each row the "next day" is one row toward the future, which is the
//! previous row when the table is sorted descending and the following row
//! when ascending. The most recent row has no next day and gets NaN.

use crate::domain::{PriceTable, SortOrder};

/// `close - open` per row.
pub fn daily_evolution(prices: &PriceTable) -> Vec<f64> {
    prices.bars().iter().map(|b| b.close - b.open).collect()
}

/// Next-day `(close - open) / open` per row; NaN where there is no next day.
pub fn next_day_ratio(prices: &PriceTable, order: SortOrder) -> Vec<f64> {
    let bars = prices.bars();
    let evolution = daily_evolution(prices);
    (0..bars.len())
        .map(|i| {
            let next = match order {
                SortOrder::Descending => i.checked_sub(1),
                SortOrder::Ascending => Some(i + 1).filter(|&j| j < bars.len()),
            };
            next.map_or(f64::NAN, |j| evolution[j] / bars[j].open)
        })
        .collect()
}

/// `NaN` stays `NaN`, below `breakeven` is 0, anything else is 1.
pub fn label(ratio: f64, breakeven: f64) -> f64 {
    if ratio.is_nan() {
        f64::NAN
    } else if ratio < breakeven {
        0.0
    } else {
        1.0
    }
}

pub fn make_labels(prices: &PriceTable, order: SortOrder, breakeven: f64) -> Vec<f64> {
    next_day_ratio(prices, order)
        .into_iter()
        .map(|r| label(r, breakeven))
        .collect()
}
