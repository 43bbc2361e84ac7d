//! Technical-indicator catalogue.
//!
//! Every indicator is a plain function over a bar slice, registered once in
//! [`CATALOGUE`] with its output arity and lookback. The generator iterates the
//! registry uniformly; adding an indicator means adding one entry.
//!
//! Entries are classified by [`Memory`]:
//! - `Windowed`: the value at row `t` depends only on rows `t - lookback ..= t`.
//!   These reproduce exactly on any window holding `lookback` prior rows.
//! - `Recursive`: seeded smoothers and cumulative sums whose value depends on
//!   the whole history. `lookback` is their warm-up; recomputing them on a
//!   trailing window converges to the full-history value but is not
//!   bit-identical.

pub mod momentum;
pub mod moving_average;
pub mod series;
pub mod trend;
pub mod volatility;
pub mod volume;

use thiserror::Error;

use crate::domain::Bar;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("no bars to compute on")]
    EmptyInput,

    #[error("{indicator}: volume is zero across the whole window")]
    NoVolume { indicator: &'static str },
}

/// One output series of an indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub label: &'static str,
    pub values: Vec<f64>,
}

impl IndicatorColumn {
    pub fn new(label: &'static str, values: Vec<f64>) -> Self {
        Self { label, values }
    }
}

pub type IndicatorResult = Result<Vec<IndicatorColumn>, IndicatorError>;
pub type IndicatorFn = fn(&[Bar]) -> IndicatorResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Windowed,
    Recursive,
}

#[derive(Debug, Clone, Copy)]
pub struct IndicatorEntry {
    pub name: &'static str,
    pub function: IndicatorFn,
    pub arity: usize,
    pub lookback: usize,
    pub memory: Memory,
}

impl IndicatorEntry {
    pub fn is_windowed(&self) -> bool {
        self.memory == Memory::Windowed
    }

    /// Name of the output column carrying `label`.
    ///
    /// A lone output labelled like its entry keeps the entry name; anything
    /// else is prefixed with it.
    pub fn column_name(&self, label: &str) -> String {
        if self.arity == 1 && label == self.name {
            self.name.to_string()
        } else {
            format!("{}_{}", self.name, label)
        }
    }
}

const fn windowed(name: &'static str, function: IndicatorFn, arity: usize, lookback: usize) -> IndicatorEntry {
    IndicatorEntry {
        name,
        function,
        arity,
        lookback,
        memory: Memory::Windowed,
    }
}

const fn recursive(name: &'static str, function: IndicatorFn, arity: usize, lookback: usize) -> IndicatorEntry {
    IndicatorEntry {
        name,
        function,
        arity,
        lookback,
        memory: Memory::Recursive,
    }
}

/// The full indicator registry, in output order.
pub static CATALOGUE: &[IndicatorEntry] = &[
    // moving averages
    windowed("sma", moving_average::sma, 1, 40),
    windowed("wma", moving_average::wma, 1, 8),
    windowed("hma", moving_average::hma, 1, 18),
    windowed("trima", moving_average::trima, 1, 34),
    windowed("smm", moving_average::smm, 1, 8),
    recursive("ema", moving_average::ema, 1, 8),
    recursive("dema", moving_average::dema, 1, 16),
    recursive("tema", moving_average::tema, 1, 24),
    // momentum
    windowed("roc", momentum::roc, 1, 12),
    windowed("mom", momentum::mom, 1, 10),
    windowed("cmo", momentum::cmo, 1, 9),
    windowed("er", momentum::er, 1, 10),
    windowed("williams", momentum::williams, 1, 13),
    windowed("stoch", momentum::stoch, 2, 15),
    windowed("uo", momentum::uo, 1, 28),
    windowed("ao", momentum::ao, 1, 33),
    windowed("copp", momentum::copp, 1, 23),
    windowed("cci", momentum::cci, 1, 19),
    recursive("rsi", momentum::rsi, 1, 14),
    recursive("stochrsi", momentum::stochrsi, 1, 27),
    recursive("macd", momentum::macd, 3, 33),
    recursive("ppo", momentum::ppo, 3, 33),
    recursive("tsi", momentum::tsi, 2, 49),
    recursive("trix", momentum::trix, 1, 58),
    // volatility
    windowed("tr", volatility::tr, 1, 1),
    windowed("bbands", volatility::bbands, 3, 19),
    windowed("bbwidth", volatility::bbwidth, 1, 19),
    windowed("percent_b", volatility::percent_b, 1, 19),
    windowed("donchian", volatility::donchian, 3, 19),
    windowed("msd", volatility::msd, 1, 20),
    windowed("vortex", volatility::vortex, 2, 14),
    recursive("atr", volatility::atr, 1, 14),
    recursive("kc", volatility::keltner, 3, 19),
    recursive("chandelier", volatility::chandelier, 2, 22),
    recursive("mi", volatility::mass_index, 1, 40),
    // trend
    windowed("aroon", trend::aroon, 2, 25),
    windowed("ichimoku", trend::ichimoku, 4, 77),
    windowed("qstick", trend::qstick, 1, 13),
    windowed("pivot", trend::pivot, 5, 1),
    windowed("bop", trend::bop, 1, 0),
    windowed("tp", trend::tp, 1, 0),
    recursive("adx", trend::adx, 1, 27),
    recursive("dmi", trend::dmi, 2, 14),
    recursive("sar", trend::sar, 1, 1),
    recursive("supertrend", trend::supertrend, 1, 10),
    // volume
    windowed("obv", volume::obv, 1, 20),
    windowed("adl", volume::adl, 1, 19),
    windowed("vwap", volume::vwap, 1, 19),
    windowed("mfi", volume::mfi, 1, 14),
    windowed("emv", volume::emv, 1, 14),
    recursive("efi", volume::efi, 1, 13),
    recursive("chaikin", volume::chaikin, 1, 9),
];

pub fn catalogue() -> &'static [IndicatorEntry] {
    CATALOGUE
}

/// Windowed entries only.
pub fn finite_memory() -> Vec<IndicatorEntry> {
    CATALOGUE.iter().copied().filter(|e| e.is_windowed()).collect()
}

pub fn lookup(name: &str) -> Option<&'static IndicatorEntry> {
    CATALOGUE.iter().find(|e| e.name == name)
}

pub fn max_lookback(entries: &[IndicatorEntry]) -> usize {
    entries.iter().map(|e| e.lookback).max().unwrap_or(0)
}

pub(crate) fn require_bars(bars: &[Bar]) -> Result<(), IndicatorError> {
    if bars.is_empty() {
        Err(IndicatorError::EmptyInput)
    } else {
        Ok(())
    }
}

pub(crate) fn single(label: &'static str, values: Vec<f64>) -> IndicatorResult {
    Ok(vec![IndicatorColumn::new(label, values)])
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Wavy, trending closes with varying volume: every indicator is defined
/// once its warm-up has passed.
#[cfg(test)]
pub fn make_wavy_bars(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.05 * t + 6.0 * (t * 0.21).sin() + 2.5 * (t * 0.73).cos()
        })
        .collect();
    let mut bars = make_bars(&closes);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.volume = 1_000 + ((i * 7_919) % 3_001) as u64;
    }
    bars
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    fn first_defined(values: &[f64]) -> Option<usize> {
        values.iter().position(|v| !v.is_nan())
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = CATALOGUE.iter().map(|e| e.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOGUE.len());
    }

    #[test]
    fn every_entry_returns_declared_arity_and_length() {
        let bars = make_wavy_bars(150);
        for entry in CATALOGUE {
            let cols = (entry.function)(&bars).unwrap();
            assert_eq!(cols.len(), entry.arity, "{}", entry.name);
            for col in &cols {
                assert_eq!(col.values.len(), bars.len(), "{}_{}", entry.name, col.label);
            }
        }
    }

    #[test]
    fn declared_lookback_is_the_warm_up() {
        let bars = make_wavy_bars(150);
        for entry in CATALOGUE {
            let cols = (entry.function)(&bars).unwrap();
            let warm_up = cols
                .iter()
                .map(|c| first_defined(&c.values).unwrap_or(usize::MAX))
                .max()
                .unwrap();
            assert_eq!(warm_up, entry.lookback, "{}", entry.name);
        }
    }

    #[test]
    fn every_entry_rejects_empty_input() {
        for entry in CATALOGUE {
            assert_eq!((entry.function)(&[]), Err(IndicatorError::EmptyInput), "{}", entry.name);
        }
    }

    #[test]
    fn column_name_rule() {
        let tp = lookup("tp").unwrap();
        assert_eq!(tp.column_name("tp"), "tp");
        let bb = lookup("bbands").unwrap();
        assert_eq!(bb.column_name("upper"), "bbands_upper");
    }

    #[test]
    fn finite_memory_subset() {
        let subset = finite_memory();
        assert!(!subset.is_empty());
        assert!(subset.iter().all(|e| e.memory == Memory::Windowed));
        assert!(max_lookback(&subset) <= 98);
        assert!(max_lookback(CATALOGUE) <= 98);
    }
}
