//! Scaler branches: passthrough, whole-history and rolling-window normalizers.
//!
//! Global scalers fix one location/scale pair per column at fit time and hold
//! no buffer. Rolling scalers recompute their statistics on every window and
//! carry the trailing `window` rows between calls.

use super::buffer::TailBuffer;
use super::error::PipelineError;
use super::table::{FeatureTable, Schema};
use super::transformer::Transformer;
use crate::config::ScalerConfig;
use crate::indicators::series::{max_of, mean, min_of, rolling, std_dev};

pub const PASSTHROUGH: &str = "passthrough";
pub const STANDARD: &str = "standard_scaler";
pub const MIN_MAX: &str = "minmax_scaler";
pub const MOVING_STANDARD: &str = "moving_standard_scaler";
pub const MOVING_MIN_MAX: &str = "moving_minmax_scaler";

/// Relative threshold under which a standard deviation counts as zero.
const ZERO_STD_TOLERANCE: f64 = 1e-12;

/// Build the branch described by `config`.
pub fn build_scaler(config: &ScalerConfig) -> Result<Box<dyn Transformer>, PipelineError> {
    Ok(match *config {
        ScalerConfig::Passthrough => Box::new(Passthrough),
        ScalerConfig::Standard => Box::new(StandardScaler::default()),
        ScalerConfig::MinMax => Box::new(MinMaxScaler::default()),
        ScalerConfig::MovingStandard {
            window,
            with_mean,
            with_std,
        } => Box::new(MovingStandardScaler::new(window, with_mean, with_std)?),
        ScalerConfig::MovingMinMax { window } => Box::new(MovingMinMaxScaler::new(window)?),
    })
}

/// Identity branch. Its columns keep their names inside a union.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transformer for Passthrough {
    fn name(&self) -> &str {
        PASSTHROUGH
    }

    fn fit(&mut self, _table: &FeatureTable) -> Result<(), PipelineError> {
        Ok(())
    }

    fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        Ok(table.clone())
    }
}

/// Per-column `(location, scale)` frozen at fit.
#[derive(Debug, Clone)]
struct FittedColumns {
    schema: Schema,
    params: Vec<(f64, f64)>,
}

impl FittedColumns {
    fn fit(table: &FeatureTable, stat: impl Fn(&[f64]) -> (f64, f64)) -> Self {
        let params = table
            .iter_columns()
            .map(|(_, values)| {
                let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                stat(&defined)
            })
            .collect();
        Self {
            schema: table.schema(),
            params,
        }
    }

    fn apply(&self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        if table.schema() != self.schema {
            return Err(PipelineError::SchemaMismatch {
                expected: self.schema.names().to_vec(),
                actual: table.names().to_vec(),
            });
        }
        let mut out = FeatureTable::new(table.dates().to_vec());
        for ((name, values), &(loc, scale)) in table.iter_columns().zip(self.params.iter()) {
            out.push_column(name, values.iter().map(|v| (v - loc) / scale).collect())?;
        }
        Ok(out)
    }
}

/// A zero or undefined spread scales by 1.
fn usable_scale(scale: f64) -> f64 {
    if scale == 0.0 || scale.is_nan() {
        1.0
    } else {
        scale
    }
}

/// Whole-history z-score: NaN-ignoring mean and population std.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    fitted: Option<FittedColumns>,
}

impl Transformer for StandardScaler {
    fn name(&self) -> &str {
        STANDARD
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<(), PipelineError> {
        self.fitted = Some(FittedColumns::fit(table, |defined| {
            if defined.is_empty() {
                return (f64::NAN, 1.0);
            }
            (mean(defined), usable_scale(std_dev(defined, 0)))
        }));
        Ok(())
    }

    fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        self.fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted(STANDARD))?
            .apply(table)
    }

    fn reset(&mut self) {
        self.fitted = None;
    }
}

/// Whole-history min-max to [0, 1] on the training range.
#[derive(Debug, Clone, Default)]
pub struct MinMaxScaler {
    fitted: Option<FittedColumns>,
}

impl Transformer for MinMaxScaler {
    fn name(&self) -> &str {
        MIN_MAX
    }

    fn fit(&mut self, table: &FeatureTable) -> Result<(), PipelineError> {
        self.fitted = Some(FittedColumns::fit(table, |defined| {
            if defined.is_empty() {
                return (f64::NAN, 1.0);
            }
            let lo = min_of(defined);
            (lo, usable_scale(max_of(defined) - lo))
        }));
        Ok(())
    }

    fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        self.fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted(MIN_MAX))?
            .apply(table)
    }

    fn reset(&mut self) {
        self.fitted = None;
    }
}

fn check_window(window: usize) -> Result<(), PipelineError> {
    if window < 2 {
        return Err(PipelineError::InvalidParameter(format!(
            "rolling window must be at least 2, got {window}"
        )));
    }
    Ok(())
}

/// Apply a per-window statistic to every column.
fn map_rolling(
    table: &FeatureTable,
    window: usize,
    f: impl Fn(&[f64]) -> f64 + Copy,
) -> Result<FeatureTable, PipelineError> {
    let mut out = FeatureTable::new(table.dates().to_vec());
    for (name, values) in table.iter_columns() {
        out.push_column(name, rolling(values, window, f))?;
    }
    Ok(out)
}

/// `(x - rolling_mean) / rolling_std` over a trailing window (sample std).
#[derive(Debug, Clone)]
pub struct MovingStandardScaler {
    window: usize,
    with_mean: bool,
    with_std: bool,
    buffer: TailBuffer<FeatureTable>,
}

impl MovingStandardScaler {
    pub fn new(window: usize, with_mean: bool, with_std: bool) -> Result<Self, PipelineError> {
        check_window(window)?;
        Ok(Self {
            window,
            with_mean,
            with_std,
            buffer: TailBuffer::new(window),
        })
    }

    fn compute(&self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let (with_mean, with_std) = (self.with_mean, self.with_std);
        map_rolling(table, self.window, move |w| {
            let x = w[w.len() - 1];
            let m = mean(w);
            let centered = if with_mean { x - m } else { x };
            if !with_std {
                return centered;
            }
            let s = std_dev(w, 1);
            if s <= ZERO_STD_TOLERANCE * m.abs().max(1.0) {
                centered
            } else {
                centered / s
            }
        })
    }
}

impl Transformer for MovingStandardScaler {
    fn name(&self) -> &str {
        MOVING_STANDARD
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

/// `(x - rolling_min) / (rolling_max - rolling_min)` over a trailing window.
#[derive(Debug, Clone)]
pub struct MovingMinMaxScaler {
    window: usize,
    buffer: TailBuffer<FeatureTable>,
}

impl MovingMinMaxScaler {
    pub fn new(window: usize) -> Result<Self, PipelineError> {
        check_window(window)?;
        Ok(Self {
            window,
            buffer: TailBuffer::new(window),
        })
    }

    fn compute(&self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        map_rolling(table, self.window, |w| {
            let lo = min_of(w);
            (w[w.len() - 1] - lo) / usable_scale(max_of(w) - lo)
        })
    }
}

impl Transformer for MovingMinMaxScaler {
    fn name(&self) -> &str {
        MOVING_MIN_MAX
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(columns: Vec<(&str, Vec<f64>)>) -> FeatureTable {
        let n = columns[0].1.len();
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect();
        FeatureTable::from_columns(
            dates,
            columns.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        )
        .unwrap()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 50.0 + 10.0 * (i as f64 * 0.4).sin()).collect()
    }

    #[test]
    fn passthrough_is_identity() {
        let t = table(vec![("a", vec![1.0, f64::NAN, 3.0])]);
        let out = Passthrough.fit_transform(&t).unwrap();
        assert_eq!(out.names(), t.names());
        assert_eq!(out.column("a").unwrap()[2], 3.0);
        assert!(out.column("a").unwrap()[1].is_nan());
    }

    #[test]
    fn standard_scaler_ignores_nan() {
        let t = table(vec![("a", vec![f64::NAN, 1.0, 3.0])]);
        let mut s = StandardScaler::default();
        let out = s.fit_transform(&t).unwrap();
        let col = out.column("a").unwrap();
        assert!(col[0].is_nan());
        // mean 2, population std 1
        assert_eq!(&col[1..], &[-1.0, 1.0]);
    }

    #[test]
    fn standard_scaler_constant_column_scales_by_one() {
        let t = table(vec![("a", vec![5.0, 5.0, 5.0])]);
        let out = StandardScaler::default().fit_transform(&t).unwrap();
        assert_eq!(out.column("a").unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn global_scaler_keeps_fitted_params() {
        let mut s = MinMaxScaler::default();
        s.fit(&table(vec![("a", vec![0.0, 10.0])])).unwrap();
        let out = s.transform(&table(vec![("a", vec![5.0, 20.0])])).unwrap();
        assert_eq!(out.column("a").unwrap(), &[0.5, 2.0]);
    }

    #[test]
    fn global_scaler_rejects_other_schema() {
        let mut s = StandardScaler::default();
        s.fit(&table(vec![("a", vec![0.0, 10.0])])).unwrap();
        let err = s.transform(&table(vec![("b", vec![1.0, 2.0])])).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn global_scaler_before_fit() {
        let err = MinMaxScaler::default()
            .transform(&table(vec![("a", vec![1.0])]))
            .unwrap_err();
        assert_eq!(err, PipelineError::NotFitted(MIN_MAX));
    }

    #[test]
    fn moving_standard_constant_input_is_zero_after_warm_up() {
        let t = table(vec![("close", vec![100.1; 10])]);
        let mut s = MovingStandardScaler::new(3, true, true).unwrap();
        let out = s.fit_transform(&t).unwrap();
        let col = out.column("close").unwrap();
        assert!(col[0].is_nan() && col[1].is_nan());
        for v in &col[2..] {
            assert!(v.abs() < 1e-9, "expected 0, got {v}");
        }
    }

    #[test]
    fn moving_standard_matches_hand_computation() {
        let t = table(vec![("a", vec![1.0, 2.0, 4.0])]);
        let mut s = MovingStandardScaler::new(3, true, true).unwrap();
        let out = s.fit_transform(&t).unwrap();
        let m = 7.0 / 3.0;
        let sd = (((1.0 - m) * (1.0 - m) + (2.0 - m) * (2.0 - m) + (4.0 - m) * (4.0 - m)) / 2.0_f64).sqrt();
        assert!((out.column("a").unwrap()[2] - (4.0 - m) / sd).abs() < 1e-12);
    }

    #[test]
    fn moving_standard_switches() {
        let t = table(vec![("a", vec![1.0, 2.0, 4.0])]);
        let centered = MovingStandardScaler::new(3, true, false)
            .unwrap()
            .fit_transform(&t)
            .unwrap();
        assert!((centered.column("a").unwrap()[2] - (4.0 - 7.0 / 3.0)).abs() < 1e-12);
        let raw = MovingStandardScaler::new(3, false, false)
            .unwrap()
            .fit_transform(&t)
            .unwrap();
        assert_eq!(raw.column("a").unwrap()[2], 4.0);
    }

    #[test]
    fn moving_minmax_bounds_and_flat_windows() {
        let t = table(vec![("a", vec![1.0, 3.0, 2.0, 2.0, 2.0])]);
        let out = MovingMinMaxScaler::new(2).unwrap().fit_transform(&t).unwrap();
        let col = out.column("a").unwrap();
        assert!(col[0].is_nan());
        assert_eq!(&col[1..], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn nan_in_window_is_nan() {
        let t = table(vec![("a", vec![1.0, f64::NAN, 3.0, 4.0, 5.0])]);
        let out = MovingMinMaxScaler::new(2).unwrap().fit_transform(&t).unwrap();
        let col = out.column("a").unwrap();
        assert!(col[1].is_nan() && col[2].is_nan());
        assert_eq!(col[3], 1.0);
    }

    #[test]
    fn rolling_scalers_are_buffer_equivalent() {
        let values = wave(40);
        let full = table(vec![("a", values.clone())]);
        for k in [1, 2, 5, 17] {
            let cut = values.len() - k;
            let head = full.slice(0, cut);
            let tail = full.slice(cut, values.len());

            let mut batch = MovingStandardScaler::new(10, true, true).unwrap();
            let expected = batch.fit_transform(&full).unwrap();
            let mut split = MovingStandardScaler::new(10, true, true).unwrap();
            let first = split.fit_transform(&head).unwrap();
            let second = split.transform(&tail).unwrap();
            assert!(first.vstack(&second).unwrap().approx_eq(&expected, 0.0));

            let mut batch = MovingMinMaxScaler::new(10).unwrap();
            let expected = batch.fit_transform(&full).unwrap();
            let mut split = MovingMinMaxScaler::new(10).unwrap();
            let first = split.fit_transform(&head).unwrap();
            let second = split.transform(&tail).unwrap();
            assert!(first.vstack(&second).unwrap().approx_eq(&expected, 0.0));
        }
    }

    #[test]
    fn reset_drops_the_lookback() {
        let t = table(vec![("a", vec![1.0, 3.0, 2.0, 5.0])]);
        let head = t.slice(0, 3);
        let last = t.slice(3, 4);

        let mut scaler = MovingMinMaxScaler::new(3).unwrap();
        scaler.fit_transform(&head).unwrap();
        assert_eq!(scaler.transform(&last).unwrap().column("a").unwrap()[0], 1.0);

        let mut scaler = MovingMinMaxScaler::new(3).unwrap();
        scaler.fit_transform(&head).unwrap();
        scaler.reset();
        assert!(scaler.transform(&last).unwrap().column("a").unwrap()[0].is_nan());
    }

    #[test]
    fn window_below_two_is_rejected() {
        assert!(matches!(
            MovingMinMaxScaler::new(1),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn factory_uses_branch_ids() {
        let names: Vec<String> = [
            ScalerConfig::Passthrough,
            ScalerConfig::Standard,
            ScalerConfig::MinMax,
            ScalerConfig::MovingStandard {
                window: 10,
                with_mean: true,
                with_std: true,
            },
            ScalerConfig::MovingMinMax { window: 10 },
        ]
        .iter()
        .map(|c| build_scaler(c).unwrap().name().to_string())
        .collect();
        assert_eq!(
            names,
            vec![PASSTHROUGH, STANDARD, MIN_MAX, MOVING_STANDARD, MOVING_MIN_MAX]
        );
    }
}
