//! Feature union: parallel branches over one input, concatenated by column.
//!
//! Columns are renamed `<column>_<branch>`, except for the passthrough branch
//! whose columns keep their names. The per-branch widths and the output schema
//! are frozen at fit into a [`UnionLayout`]; a later transform that disagrees
//! with it is a structural error.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::error::PipelineError;
use super::scalers::PASSTHROUGH;
use super::table::{FeatureTable, Schema};
use super::transformer::Transformer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLayout {
    pub name: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionLayout {
    pub input: Schema,
    pub branches: Vec<BranchLayout>,
    pub output: Schema,
}

/// Output name of `column` produced by `branch`.
pub fn branch_column_name(column: &str, branch: &str) -> String {
    if branch == PASSTHROUGH {
        column.to_string()
    } else {
        format!("{column}_{branch}")
    }
}

pub struct FeatureUnion {
    branches: Vec<Box<dyn Transformer>>,
    layout: Option<UnionLayout>,
}

impl std::fmt::Debug for FeatureUnion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureUnion")
            .field("branches", &self.branch_names())
            .field("layout", &self.layout)
            .finish()
    }
}

impl FeatureUnion {
    /// Branch names must be unique.
    pub fn new(branches: Vec<Box<dyn Transformer>>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for branch in &branches {
            if !seen.insert(branch.name().to_string()) {
                return Err(PipelineError::DuplicateBranch(branch.name().to_string()));
            }
        }
        if branches.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "a feature union needs at least one branch".into(),
            ));
        }
        Ok(Self {
            branches,
            layout: None,
        })
    }

    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name()).collect()
    }

    pub fn layout(&self) -> Option<&UnionLayout> {
        self.layout.as_ref()
    }

    /// Reset every branch and forget the layout.
    pub fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.reset();
        }
        self.layout = None;
    }

    /// Fit every branch, concatenate, and freeze the layout.
    pub fn fit_transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let mut outputs = Vec::with_capacity(self.branches.len());
        for branch in &mut self.branches {
            outputs.push(branch.fit_transform(table)?);
        }
        let (out, branches) = concat(table, &self.branches, outputs)?;
        self.layout = Some(UnionLayout {
            input: table.schema(),
            branches,
            output: out.schema(),
        });
        Ok(out)
    }

    /// Transform through every branch; the result must match the frozen layout.
    pub fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        let layout = self.layout.clone().ok_or(PipelineError::NotFitted("feature union"))?;
        let mut outputs = Vec::with_capacity(self.branches.len());
        for branch in &mut self.branches {
            outputs.push(branch.transform(table)?);
        }
        let (out, branches) = concat(table, &self.branches, outputs)?;
        for (fitted, now) in layout.branches.iter().zip(branches.iter()) {
            if fitted.width != now.width {
                return Err(PipelineError::WidthChanged {
                    branch: now.name.clone(),
                    expected: fitted.width,
                    actual: now.width,
                });
            }
        }
        if out.schema() != layout.output {
            return Err(PipelineError::SchemaMismatch {
                expected: layout.output.names().to_vec(),
                actual: out.names().to_vec(),
            });
        }
        Ok(out)
    }
}

fn concat(
    input: &FeatureTable,
    branches: &[Box<dyn Transformer>],
    outputs: Vec<FeatureTable>,
) -> Result<(FeatureTable, Vec<BranchLayout>), PipelineError> {
    let mut out = FeatureTable::new(input.dates().to_vec());
    let mut layout = Vec::with_capacity(branches.len());
    for (branch, result) in branches.iter().zip(outputs) {
        if result.n_rows() != input.n_rows() {
            return Err(PipelineError::RowCountMismatch {
                branch: branch.name().to_string(),
                expected: input.n_rows(),
                actual: result.n_rows(),
            });
        }
        for (column, values) in result.iter_columns() {
            out.push_column(branch_column_name(column, branch.name()), values.to_vec())?;
        }
        debug!(branch = branch.name(), width = result.n_cols(), "union branch");
        layout.push(BranchLayout {
            name: branch.name().to_string(),
            width: result.n_cols(),
        });
    }
    Ok((out, layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::scalers::{MinMaxScaler, MovingMinMaxScaler, Passthrough};
    use chrono::NaiveDate;

    fn table(n: usize) -> FeatureTable {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect();
        FeatureTable::from_columns(
            dates,
            vec![
                ("x".into(), (0..n).map(|i| i as f64).collect()),
                ("y".into(), (0..n).map(|i| (i * i) as f64).collect()),
            ],
        )
        .unwrap()
    }

    /// Drops one row; used to exercise the row-count check.
    struct Shrink;

    impl Transformer for Shrink {
        fn name(&self) -> &str {
            "shrink"
        }
        fn fit(&mut self, _: &FeatureTable) -> Result<(), PipelineError> {
            Ok(())
        }
        fn transform(&mut self, t: &FeatureTable) -> Result<FeatureTable, PipelineError> {
            Ok(t.skip_rows(1))
        }
    }

    /// Emits one column at fit, two afterwards.
    struct Grow {
        fitted: bool,
    }

    impl Transformer for Grow {
        fn name(&self) -> &str {
            "grow"
        }
        fn fit(&mut self, _: &FeatureTable) -> Result<(), PipelineError> {
            Ok(())
        }
        fn transform(&mut self, t: &FeatureTable) -> Result<FeatureTable, PipelineError> {
            let width = if self.fitted { 2 } else { 1 };
            self.fitted = true;
            t.select(&Schema::new(t.names()[..width].to_vec()))
        }
    }

    #[test]
    fn passthrough_keeps_names_others_get_suffix() {
        let mut union = FeatureUnion::new(vec![
            Box::new(Passthrough),
            Box::new(MinMaxScaler::default()),
        ])
        .unwrap();
        let t = table(5);
        let out = union.fit_transform(&t).unwrap();
        let names: Vec<&str> = out.names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "x_minmax_scaler", "y_minmax_scaler"]);
        assert_eq!(out.column("x").unwrap(), t.column("x").unwrap());

        let layout = union.layout().unwrap();
        assert_eq!(layout.branches.len(), 2);
        assert_eq!(layout.branches[1].width, 2);
        assert_eq!(layout.output, out.schema());
    }

    #[test]
    fn duplicate_branch_is_rejected() {
        let err = FeatureUnion::new(vec![Box::new(Passthrough), Box::new(Passthrough)]).unwrap_err();
        assert_eq!(err, PipelineError::DuplicateBranch(PASSTHROUGH.into()));
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let mut union = FeatureUnion::new(vec![Box::new(Passthrough), Box::new(Shrink)]).unwrap();
        let err = union.fit_transform(&table(4)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RowCountMismatch { expected: 4, actual: 3, .. }
        ));
    }

    #[test]
    fn width_change_after_fit_is_fatal() {
        let mut union = FeatureUnion::new(vec![Box::new(Grow { fitted: false })]).unwrap();
        union.fit_transform(&table(3)).unwrap();
        let err = union.transform(&table(3)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::WidthChanged {
                branch: "grow".into(),
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn transform_before_fit() {
        let mut union = FeatureUnion::new(vec![Box::new(Passthrough)]).unwrap();
        assert_eq!(
            union.transform(&table(2)).unwrap_err(),
            PipelineError::NotFitted("feature union")
        );
    }

    #[test]
    fn reset_forgets_the_layout() {
        let mut union = FeatureUnion::new(vec![
            Box::new(Passthrough),
            Box::new(MovingMinMaxScaler::new(3).unwrap()),
        ])
        .unwrap();
        union.fit_transform(&table(5)).unwrap();
        union.reset();
        assert!(union.layout().is_none());
        assert_eq!(
            union.transform(&table(1)).unwrap_err(),
            PipelineError::NotFitted("feature union")
        );
    }

    #[test]
    fn single_row_transform_keeps_schema() {
        let mut union = FeatureUnion::new(vec![
            Box::new(Passthrough),
            Box::new(MovingMinMaxScaler::new(3).unwrap()),
        ])
        .unwrap();
        let t = table(10);
        let fitted = union.fit_transform(&t.slice(0, 9)).unwrap();
        let next = union.transform(&t.slice(9, 10)).unwrap();
        assert_eq!(next.schema(), fitted.schema());
        assert_eq!(next.n_rows(), 1);
    }
}
