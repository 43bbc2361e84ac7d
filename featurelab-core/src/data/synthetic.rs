//! Deterministic random-walk prices for offline work and tests.
//!
//! The RNG is seeded from a BLAKE3 hash of the symbol, so the same symbol
//! always produces the same series.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{
    DataError, DataProvider, DataSource, FetchRequest, FetchResult, Metadata, OutputSize,
};
use crate::domain::{Bar, PriceTable, SortOrder};

const COMPACT_SESSIONS: usize = 100;
const FULL_SESSIONS: usize = 1_500;

/// `sessions` weekday bars ending on or before `end`, sorted per `order`.
pub fn synthetic_prices(symbol: &str, end: NaiveDate, sessions: usize, order: SortOrder) -> PriceTable {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut dates = Vec::with_capacity(sessions);
    let mut day = end;
    while dates.len() < sessions {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(day);
        }
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    dates.reverse();

    let mut price = 100.0_f64;
    let mut bars = Vec::with_capacity(dates.len());
    for date in dates {
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price * (1.0 + rng.gen_range(-0.005..0.005));
        let close = open * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);
        bars.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }

    PriceTable::sorted(bars, order)
}

/// Provider that serves [`synthetic_prices`] ending at a fixed date.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    end: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(end: NaiveDate) -> Self {
        Self { end }
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        let sessions = match request.output_size {
            OutputSize::Compact => COMPACT_SESSIONS,
            OutputSize::Full => FULL_SESSIONS,
        };
        let table = synthetic_prices(&request.symbol, self.end, sessions, request.order);
        let last = table
            .bars()
            .iter()
            .map(|b| b.date)
            .max()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: request.symbol.clone(),
            })?;
        Ok(FetchResult {
            table,
            metadata: Metadata {
                symbol: request.symbol.clone(),
                timezone: "US/Eastern".into(),
                last_refreshed: last.to_string(),
            },
            source: DataSource::Synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    #[test]
    fn same_symbol_same_series() {
        let a = synthetic_prices("SPY", end(), 50, SortOrder::Descending);
        let b = synthetic_prices("SPY", end(), 50, SortOrder::Descending);
        let c = synthetic_prices("QQQ", end(), 50, SortOrder::Descending);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn bars_are_sane_weekdays_in_order() {
        let t = synthetic_prices("SPY", end(), 200, SortOrder::Descending);
        assert_eq!(t.len(), 200);
        assert!(t.validate(SortOrder::Descending).is_ok());
        assert_eq!(t.bars()[0].date, end());
        assert!(t
            .bars()
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));

        let asc = synthetic_prices("SPY", end(), 200, SortOrder::Ascending);
        assert_eq!(asc.bars()[199], t.bars()[0]);
    }

    #[test]
    fn provider_honours_output_size() {
        let provider = SyntheticProvider::new(end());
        let mut request = FetchRequest::daily("SPY");
        request.output_size = OutputSize::Compact;
        let result = provider.fetch(&request).unwrap();
        assert_eq!(result.table.len(), COMPACT_SESSIONS);
        assert_eq!(result.source, DataSource::Synthetic);
        assert_eq!(result.metadata.last_refreshed, "2024-06-28");
    }
}
