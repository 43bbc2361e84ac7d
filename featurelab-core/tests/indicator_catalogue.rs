//! Catalogue-wide indicator invariants.
//!
//! 1. No look-ahead: the value at row t never depends on rows after t.
//!    Computed on a truncated series (0..150) and on the full series (0..300);
//!    the first 150 rows must agree.
//! 2. Windowed entries reproduce on a trailing buffer: recomputing on the last
//!    99 rows gives the full-history values for every row past the lookback.

use chrono::NaiveDate;
use featurelab_core::data::synthetic_prices;
use featurelab_core::domain::{Bar, SortOrder};
use featurelab_core::features::DEFAULT_BUFFER_SIZE;
use featurelab_core::indicators::{catalogue, finite_memory, max_lookback, IndicatorEntry};

fn bars(n: usize) -> Vec<Bar> {
    let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
    synthetic_prices("TEST", end, n, SortOrder::Ascending).into_bars()
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= 1e-10 * a.abs().max(1.0)
}

fn compute(entry: &IndicatorEntry, bars: &[Bar]) -> Vec<Vec<f64>> {
    let columns = (entry.function)(bars)
        .unwrap_or_else(|e| panic!("{} failed on {} bars: {e}", entry.name, bars.len()));
    assert_eq!(columns.len(), entry.arity, "{}: arity", entry.name);
    columns.into_iter().map(|c| c.values).collect()
}

#[test]
fn no_entry_looks_ahead() {
    let full_bars = bars(300);
    for entry in catalogue() {
        let full = compute(entry, &full_bars);
        let truncated = compute(entry, &full_bars[..150]);
        for (col, (t, f)) in truncated.iter().zip(&full).enumerate() {
            assert_eq!(t.len(), 150, "{}: truncated length", entry.name);
            for i in 0..150 {
                assert!(
                    same(t[i], f[i]),
                    "{} column {col}: look-ahead at bar {i} (truncated={}, full={})",
                    entry.name,
                    t[i],
                    f[i]
                );
            }
        }
    }
}

#[test]
fn windowed_entries_reproduce_on_the_buffer() {
    let full_bars = bars(300);
    let start = full_bars.len() - DEFAULT_BUFFER_SIZE;
    for entry in finite_memory() {
        let full = compute(&entry, &full_bars);
        let window = compute(&entry, &full_bars[start..]);
        for (col, (w, f)) in window.iter().zip(&full).enumerate() {
            for i in entry.lookback..w.len() {
                assert!(
                    same(w[i], f[start + i]),
                    "{} column {col}: row {} differs on the buffer ({} vs {})",
                    entry.name,
                    start + i,
                    w[i],
                    f[start + i]
                );
            }
        }
    }
}

#[test]
fn default_buffer_covers_every_lookback() {
    assert!(max_lookback(catalogue()) < DEFAULT_BUFFER_SIZE);
}

#[test]
fn finite_memory_is_the_windowed_subset() {
    let windowed = finite_memory();
    assert!(!windowed.is_empty());
    assert!(windowed.len() < catalogue().len());
    assert!(windowed.iter().all(|e| e.is_windowed()));
}

#[test]
fn volume_entries_reject_zero_volume() {
    let mut zero = bars(60);
    for bar in &mut zero {
        bar.volume = 0;
    }
    let obv = catalogue().iter().find(|e| e.name == "obv").unwrap();
    assert!((obv.function)(&zero).is_err());
}
