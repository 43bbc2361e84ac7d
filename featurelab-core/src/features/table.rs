//! FeatureTable: a column-major matrix of f64 keyed by date.
//!
//! NaN marks an undefined value. Column names are unique within a table and
//! their order is significant: two tables with the same names in a different
//! order have different schemas.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::PipelineError;
use crate::domain::PriceTable;

/// Ordered list of column names produced by a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Vec<String>);

impl Schema {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

impl From<Vec<String>> for Schema {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for Schema {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Table with row keys and no columns yet.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, PipelineError> {
        let mut table = Self::new(dates);
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn schema(&self) -> Schema {
        Schema(self.names.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Iterate `(name, values)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .zip(self.columns.iter())
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    /// Append a column, rejecting duplicate names and wrong lengths.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if values.len() != self.n_rows() {
            return Err(PipelineError::ColumnLength {
                column: name,
                expected: self.n_rows(),
                actual: values.len(),
            });
        }
        if self.contains(&name) {
            return Err(PipelineError::DuplicateColumn(name));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Take exactly the columns of `schema`, in its order.
    pub fn select(&self, schema: &Schema) -> Result<Self, PipelineError> {
        let mut out = Self::new(self.dates.clone());
        for name in schema.iter() {
            let values = self
                .column(name)
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
            out.names.push(name.to_string());
            out.columns.push(values.to_vec());
        }
        Ok(out)
    }

    /// Rows `start..end` (clamped to the table).
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.n_rows());
        let start = start.min(end);
        Self {
            dates: self.dates[start..end].to_vec(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c[start..end].to_vec()).collect(),
        }
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let len = self.n_rows();
        self.slice(len.saturating_sub(n), len)
    }

    /// Everything after the first `n` rows.
    pub fn skip_rows(&self, n: usize) -> Self {
        self.slice(n, self.n_rows())
    }

    /// Stack `other` below `self`; both must share the same schema.
    pub fn vstack(&self, other: &Self) -> Result<Self, PipelineError> {
        if self.names != other.names {
            return Err(PipelineError::SchemaMismatch {
                expected: self.names.clone(),
                actual: other.names.clone(),
            });
        }
        let mut dates = self.dates.clone();
        dates.extend_from_slice(&other.dates);
        let columns = self
            .columns
            .iter()
            .zip(other.columns.iter())
            .map(|(a, b)| {
                let mut col = a.clone();
                col.extend_from_slice(b);
                col
            })
            .collect();
        Ok(Self {
            dates,
            names: self.names.clone(),
            columns,
        })
    }

    pub fn has_nan(&self) -> bool {
        self.columns.iter().flatten().any(|v| v.is_nan())
    }

    /// Same dates and schema, and every value within `tolerance` (NaN equals NaN).
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.dates == other.dates
            && self.names == other.names
            && self
                .columns
                .iter()
                .flatten()
                .zip(other.columns.iter().flatten())
                .all(|(a, b)| (a.is_nan() && b.is_nan()) || (a - b).abs() <= tolerance)
    }

    /// Returns the first name that appears twice, if any.
    pub(crate) fn first_duplicate(names: &[String]) -> Option<&String> {
        let mut seen = HashSet::new();
        names.iter().find(|n| !seen.insert(n.as_str()))
    }
}

impl From<&PriceTable> for FeatureTable {
    /// The raw OHLCV columns of a price table.
    fn from(prices: &PriceTable) -> Self {
        let bars = prices.bars();
        let field = |f: fn(&crate::domain::Bar) -> f64| bars.iter().map(f).collect::<Vec<_>>();
        Self {
            dates: prices.dates(),
            names: ["open", "high", "low", "close", "volume"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            columns: vec![
                field(|b| b.open),
                field(|b| b.high),
                field(|b| b.low),
                field(|b| b.close),
                field(|b| b.volume as f64),
            ],
        }
    }
}
