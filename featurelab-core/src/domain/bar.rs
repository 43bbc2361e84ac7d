//! Bar and PriceTable, the raw market data the pipeline consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol on a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Direction in which rows are sorted by date.
///
/// The pipeline is positional: it never reorders rows, and "trailing rows"
/// always means the end of the table in whatever direction it was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("dates not strictly {order:?} at row {row}: {prev} then {next}")]
    Unordered {
        order: SortOrder,
        row: usize,
        prev: NaiveDate,
        next: NaiveDate,
    },

    #[error("insane OHLC values on {date}")]
    Insane { date: NaiveDate },
}

/// Ordered sequence of bars, the canonical price input of every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    bars: Vec<Bar>,
}

impl PriceTable {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    /// Build a table from unsorted bars, sorting them in the given direction.
    pub fn sorted(mut bars: Vec<Bar>, order: SortOrder) -> Self {
        match order {
            SortOrder::Ascending => bars.sort_by_key(|b| b.date),
            SortOrder::Descending => bars.sort_by(|a, b| b.date.cmp(&a.date)),
        }
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Rows `start..end` as a new table.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.bars.len());
        let start = start.min(end);
        Self {
            bars: self.bars[start..end].to_vec(),
        }
    }

    /// Split into the first `len - n` rows and the last `n` rows.
    pub fn split_tail(&self, n: usize) -> (Self, Self) {
        let cut = self.bars.len().saturating_sub(n);
        (self.slice(0, cut), self.slice(cut, self.bars.len()))
    }

    /// Check that dates are unique and strictly ordered, and OHLC values are sane.
    pub fn validate(&self, order: SortOrder) -> Result<(), BarError> {
        for (row, pair) in self.bars.windows(2).enumerate() {
            let (prev, next) = (pair[0].date, pair[1].date);
            let ok = match order {
                SortOrder::Ascending => prev < next,
                SortOrder::Descending => prev > next,
            };
            if !ok {
                return Err(BarError::Unordered {
                    order,
                    row: row + 1,
                    prev,
                    next,
                });
            }
        }
        if let Some(bar) = self.bars.iter().find(|b| !b.is_sane()) {
            return Err(BarError::Insane { date: bar.date });
        }
        Ok(())
    }
}

impl From<Bar> for PriceTable {
    /// Promote a single bar (e.g. a live quote) to a one-row table.
    fn from(bar: Bar) -> Self {
        Self { bars: vec![bar] }
    }
}

impl From<Vec<Bar>> for PriceTable {
    fn from(bars: Vec<Bar>) -> Self {
        Self { bars }
    }
}
