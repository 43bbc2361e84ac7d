//! Signed distances from a smoothed reference: `x - reference(x)` per column.
//!
//! The reference is either a trailing SMA or the causal lowess. Both only look
//! back a bounded number of rows, so a buffer of that many rows keeps
//! incremental calls equal to the batch result. Robust lowess (more than one
//! iteration) reweights with residual statistics of the whole window and is
//! only approximately buffer-equivalent.

use super::buffer::TailBuffer;
use super::error::PipelineError;
use super::lowess::lowess;
use super::scalers::Passthrough;
use super::table::FeatureTable;
use super::transformer::Transformer;
use super::union::FeatureUnion;
use crate::config::DistanceConfig;
use crate::indicators::series::sma;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Sma { window: usize },
    Lowess { span: usize, iterations: usize },
}

impl Reference {
    /// Branch id, e.g. `dist_sma20` or `dist_lowess10`.
    pub fn branch_name(&self) -> String {
        match self {
            Reference::Sma { window } => format!("dist_sma{window}"),
            Reference::Lowess { span, .. } => format!("dist_lowess{span}"),
        }
    }

    fn lookback(&self) -> usize {
        match *self {
            Reference::Sma { window } => window,
            Reference::Lowess { span, .. } => span,
        }
    }

    fn apply(&self, values: &[f64]) -> Vec<f64> {
        match *self {
            Reference::Sma { window } => sma(values, window),
            Reference::Lowess { span, iterations } => smooth_finite_runs(values, span, iterations),
        }
    }
}

impl From<&DistanceConfig> for Reference {
    fn from(config: &DistanceConfig) -> Self {
        match *config {
            DistanceConfig::Sma { window } => Reference::Sma { window },
            DistanceConfig::Lowess { span, iterations } => Reference::Lowess { span, iterations },
        }
    }
}

/// Lowess over each maximal run of finite values; gaps stay NaN.
fn smooth_finite_runs(values: &[f64], span: usize, iterations: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < values.len() {
        if !values[start].is_finite() {
            start += 1;
            continue;
        }
        let end = values[start..]
            .iter()
            .position(|v| !v.is_finite())
            .map_or(values.len(), |p| start + p);
        out[start..end].copy_from_slice(&lowess(&values[start..end], span, iterations));
        start = end;
    }
    out
}

#[derive(Debug, Clone)]
pub struct SignedDistance {
    name: String,
    reference: Reference,
    buffer: TailBuffer<FeatureTable>,
}

impl SignedDistance {
    pub fn new(reference: Reference) -> Result<Self, PipelineError> {
        match reference {
            Reference::Sma { window } if window < 2 => {
                return Err(PipelineError::InvalidParameter(format!(
                    "sma distance window must be at least 2, got {window}"
                )))
            }
            Reference::Lowess { span, iterations } if span < 2 || iterations == 0 => {
                return Err(PipelineError::InvalidParameter(format!(
                    "lowess distance needs span >= 2 and iterations >= 1, got {span}/{iterations}"
                )))
            }
            _ => {}
        }
        Ok(Self {
            name: reference.branch_name(),
            reference,
            buffer: TailBuffer::new(reference.lookback()),
        })
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    fn compute(&self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let mut out = FeatureTable::new(table.dates().to_vec());
        for (name, values) in table.iter_columns() {
            let reference = self.reference.apply(values);
            let distance = values.iter().zip(&reference).map(|(x, r)| x - r).collect();
            out.push_column(name, distance)?;
        }
        Ok(out)
    }
}

impl Transformer for SignedDistance {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<(), PipelineError> {
        self.buffer.store(table);
        Ok(())
    }

    fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let (window, skip) = self.buffer.window(table)?;
        let out = self.compute(&window)?;
        self.buffer.store(&window);
        Ok(out.skip_rows(skip))
    }

    fn fit_transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let out = self.compute(table)?;
        self.buffer.store(table);
        Ok(out)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Passthrough plus one branch per configured distance, or `None` when no
/// distance is configured.
pub fn distance_union(configs: &[DistanceConfig]) -> Result<Option<FeatureUnion>, PipelineError> {
    if configs.is_empty() {
        return Ok(None);
    }
    let mut branches: Vec<Box<dyn Transformer>> = vec![Box::new(Passthrough)];
    for config in configs {
        branches.push(Box::new(SignedDistance::new(Reference::from(config))?));
    }
    FeatureUnion::new(branches).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(values: Vec<f64>) -> FeatureTable {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| base + chrono::Duration::days(i as i64))
            .collect();
        FeatureTable::from_columns(dates, vec![("x".into(), values)]).unwrap()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 20.0 + 0.3 * i as f64 + 4.0 * (i as f64 * 0.5).sin())
            .collect()
    }

    #[test]
    fn sma_distance_by_hand() {
        let mut d = SignedDistance::new(Reference::Sma { window: 2 }).unwrap();
        let out = d.fit_transform(&table(vec![1.0, 3.0, 8.0])).unwrap();
        let col = out.column("x").unwrap();
        assert!(col[0].is_nan());
        assert_eq!(&col[1..], &[1.0, 2.5]);
    }

    #[test]
    fn lowess_distance_of_a_line_is_zero() {
        let line: Vec<f64> = (0..30).map(|i| 5.0 + 2.0 * i as f64).collect();
        let mut d = SignedDistance::new(Reference::Lowess { span: 6, iterations: 1 }).unwrap();
        let out = d.fit_transform(&table(line)).unwrap();
        for v in out.column("x").unwrap() {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn leading_nan_does_not_poison_lowess() {
        let mut values = wave(20);
        values[0] = f64::NAN;
        values[1] = f64::NAN;
        let smoothed = smooth_finite_runs(&values, 5, 1);
        assert!(smoothed[0].is_nan() && smoothed[1].is_nan());
        assert_eq!(smoothed[2], values[2]);
        assert!(smoothed[10].is_finite());
    }

    #[test]
    fn distances_are_buffer_equivalent() {
        let values = wave(50);
        let full = table(values.clone());
        for reference in [
            Reference::Sma { window: 7 },
            Reference::Lowess { span: 6, iterations: 1 },
        ] {
            let expected = SignedDistance::new(reference)
                .unwrap()
                .fit_transform(&full)
                .unwrap();
            let mut split = SignedDistance::new(reference).unwrap();
            let mut acc = split.fit_transform(&full.slice(0, 40)).unwrap();
            for i in 40..50 {
                let row = split.transform(&full.slice(i, i + 1)).unwrap();
                acc = acc.vstack(&row).unwrap();
            }
            assert!(acc.approx_eq(&expected, 0.0), "{reference:?}");
        }
    }

    #[test]
    fn union_names_columns_by_distance() {
        let configs = vec![
            DistanceConfig::Sma { window: 20 },
            DistanceConfig::Lowess { span: 10, iterations: 3 },
        ];
        let mut union = distance_union(&configs).unwrap().unwrap();
        let out = union.fit_transform(&table(wave(30))).unwrap();
        let names: Vec<&str> = out.names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["x", "x_dist_sma20", "x_dist_lowess10"]);
        assert!(distance_union(&[]).unwrap().is_none());
    }

    #[test]
    fn invalid_parameters() {
        assert!(SignedDistance::new(Reference::Sma { window: 1 }).is_err());
        assert!(SignedDistance::new(Reference::Lowess { span: 5, iterations: 0 }).is_err());
    }
}
