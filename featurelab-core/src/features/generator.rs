//! Buffered indicator generator.
//!
//! Turns a price table into the raw OHLCV columns followed by every catalogue
//! indicator. A failing entry is skipped, never fatal: partial coverage is
//! reported through [`GenerationReport`].

use tracing::{debug, info};

use super::buffer::TailBuffer;
use super::error::PipelineError;
use super::table::FeatureTable;
use crate::domain::PriceTable;
use crate::indicators::{self, IndicatorEntry};

/// Default buffer: the largest catalogue lookback plus the current row.
pub const DEFAULT_BUFFER_SIZE: usize = 99;

/// Outcome of one catalogue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub total: usize,
    pub failed: usize,
}

impl GenerationReport {
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorGenerator {
    entries: Vec<IndicatorEntry>,
    buffer: TailBuffer<PriceTable>,
    last_report: Option<GenerationReport>,
}

impl IndicatorGenerator {
    /// Generator over the full catalogue.
    pub fn new(buffer_size: usize) -> Self {
        Self::with_entries(indicators::catalogue().to_vec(), buffer_size)
    }

    pub fn with_entries(entries: Vec<IndicatorEntry>, buffer_size: usize) -> Self {
        Self {
            entries,
            buffer: TailBuffer::new(buffer_size),
            last_report: None,
        }
    }

    pub fn entries(&self) -> &[IndicatorEntry] {
        &self.entries
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn last_report(&self) -> Option<GenerationReport> {
        self.last_report
    }

    /// Store the trailing rows as lookback for the next transform.
    pub fn fit(&mut self, prices: &PriceTable) {
        self.buffer.store(prices);
    }

    /// Drop the buffered lookback and the last report.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_report = None;
    }

    /// Compute on buffer ++ input and return only the input's rows.
    pub fn transform(&mut self, prices: &PriceTable) -> Result<FeatureTable, PipelineError> {
        let (window, skip) = self.buffer.window(prices)?;
        let table = self.compute(&window)?;
        self.buffer.store(&window);
        Ok(table.skip_rows(skip))
    }

    /// Compute on the input as-is, then keep its tail as the buffer.
    pub fn fit_transform(&mut self, prices: &PriceTable) -> Result<FeatureTable, PipelineError> {
        let table = self.compute(prices)?;
        self.fit(prices);
        Ok(table)
    }

    fn compute(&mut self, window: &PriceTable) -> Result<FeatureTable, PipelineError> {
        let mut table = FeatureTable::from(window);
        let mut report = GenerationReport {
            total: self.entries.len(),
            failed: 0,
        };

        for entry in &self.entries {
            match evaluate(entry, window, &table) {
                Ok(columns) => {
                    for (name, values) in columns {
                        table.push_column(name, values)?;
                    }
                }
                Err(reason) => {
                    debug!(indicator = entry.name, %reason, "indicator skipped");
                    report.failed += 1;
                }
            }
        }

        info!(
            rows = window.len(),
            columns = table.n_cols(),
            failed = report.failed,
            total = report.total,
            "generated indicators ({:.1}% failed)",
            100.0 * report.failure_ratio()
        );
        self.last_report = Some(report);
        Ok(table)
    }
}

/// Run one entry and name its columns, or explain why it was skipped.
fn evaluate(
    entry: &IndicatorEntry,
    window: &PriceTable,
    table: &FeatureTable,
) -> Result<Vec<(String, Vec<f64>)>, String> {
    let outputs = (entry.function)(window.bars()).map_err(|e| e.to_string())?;
    if outputs.len() != entry.arity {
        return Err(format!(
            "returned {} columns, declared {}",
            outputs.len(),
            entry.arity
        ));
    }

    let mut named = Vec::with_capacity(outputs.len());
    for output in outputs {
        if output.values.len() != window.len() {
            return Err(format!(
                "column '{}' has {} rows, window has {}",
                output.label,
                output.values.len(),
                window.len()
            ));
        }
        let mut name = entry.column_name(output.label);
        if table.contains(&name) {
            name = format!("{}_{}", entry.name, name);
        }
        let values = output
            .values
            .into_iter()
            .map(|v| if v.is_finite() { v } else { f64::NAN })
            .collect();
        named.push((name, values));
    }

    let names: Vec<String> = named.iter().map(|(n, _)| n.clone()).collect();
    if let Some(dup) = FeatureTable::first_duplicate(&names) {
        return Err(format!("duplicate output column '{dup}'"));
    }
    if let Some((name, _)) = named.iter().find(|(n, _)| table.contains(n)) {
        return Err(format!("column '{name}' already exists"));
    }
    Ok(named)
}
