//! Column consistency filter and NaN-offset aligner.
//!
//! A column is consistent when every value after its first defined one is
//! also defined. Once inconsistent columns are gone the only NaN left form a
//! leading run per column, and dropping the longest run makes the table dense.

use super::error::PipelineError;
use super::table::{FeatureTable, Schema};

/// Index of the first non-NaN value.
pub fn first_valid_index(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// True when no NaN follows the first defined value. All-NaN is not consistent.
pub fn is_consistent(values: &[f64]) -> bool {
    match first_valid_index(values) {
        Some(start) => values[start..].iter().all(|v| !v.is_nan()),
        None => values.is_empty(),
    }
}

/// Names of the consistent columns, in table order.
pub fn consistent_columns(table: &FeatureTable) -> Schema {
    Schema::new(
        table
            .iter_columns()
            .filter(|(_, values)| is_consistent(values))
            .map(|(name, _)| name.to_string())
            .collect(),
    )
}

/// Select the frozen schema; any absent column is a structural error.
pub fn apply_filter(table: &FeatureTable, schema: &Schema) -> Result<FeatureTable, PipelineError> {
    table.select(schema)
}

/// Number of leading rows holding a NaN in at least one column.
///
/// An all-NaN column counts as `n_rows`; a table without columns has offset 0.
pub fn nan_offset(table: &FeatureTable) -> usize {
    table
        .iter_columns()
        .map(|(_, values)| first_valid_index(values).unwrap_or(table.n_rows()))
        .max()
        .unwrap_or(0)
}

/// Drop the leading undefined rows. Returns the aligned table and the offset.
pub fn align(table: &FeatureTable) -> (FeatureTable, usize) {
    let offset = nan_offset(table);
    (table.skip_rows(offset), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const NAN: f64 = f64::NAN;

    fn table(columns: Vec<(&str, Vec<f64>)>) -> FeatureTable {
        let n = columns.first().map_or(0, |c| c.1.len());
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect();
        FeatureTable::from_columns(
            dates,
            columns.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn reappearing_nan_drops_column() {
        let t = table(vec![
            ("gappy", vec![NAN, 1.0, 2.0, NAN, 3.0]),
            ("warm", vec![NAN, NAN, 1.0, 2.0, 3.0]),
        ]);
        let schema = consistent_columns(&t);
        assert_eq!(schema.names(), &["warm".to_string()]);
    }

    #[test]
    fn all_nan_column_is_dropped() {
        let t = table(vec![("empty", vec![NAN, NAN]), ("ok", vec![1.0, 2.0])]);
        assert_eq!(consistent_columns(&t).names(), &["ok".to_string()]);
    }

    #[test]
    fn frozen_schema_selects_even_if_more_columns_pass() {
        let fit = table(vec![("a", vec![NAN, 1.0]), ("b", vec![1.0, NAN])]);
        let schema = consistent_columns(&fit);
        let later = table(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0, 2.0])]);
        let out = apply_filter(&later, &schema).unwrap();
        assert_eq!(out.names(), &["a".to_string()]);
    }

    #[test]
    fn missing_frozen_column_is_an_error() {
        let schema = Schema::from(&["a", "gone"][..]);
        let t = table(vec![("a", vec![1.0])]);
        assert_eq!(
            apply_filter(&t, &schema).unwrap_err(),
            PipelineError::MissingColumn("gone".into())
        );
    }

    #[test]
    fn aligner_drops_longest_leading_run() {
        let a = vec![NAN, NAN, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![NAN, NAN, NAN, NAN, NAN, 1.0, 2.0, 3.0];
        let t = table(vec![("a", a), ("b", b)]);
        let (aligned, offset) = align(&t);
        assert_eq!(offset, 5);
        assert_eq!(aligned.n_rows(), 3);
        assert_eq!(aligned.dates(), &t.dates()[5..]);
        assert!(!aligned.has_nan());
    }

    #[test]
    fn offset_edge_cases() {
        assert_eq!(nan_offset(&FeatureTable::new(vec![])), 0);
        let t = table(vec![("a", vec![1.0, 2.0]), ("dead", vec![NAN, NAN])]);
        assert_eq!(nan_offset(&t), 2);
        assert_eq!(align(&t).0.n_rows(), 0);
    }

    fn column_strategy() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(prop_oneof![3 => -1e3..1e3f64, 1 => Just(f64::NAN)], 1..40)
    }

    proptest! {
        #[test]
        fn filtered_then_aligned_has_no_nan(
            cols in prop::collection::vec(column_strategy(), 1..6)
        ) {
            let n = cols.iter().map(|c| c.len()).min().unwrap();
            let named: Vec<(String, Vec<f64>)> = cols
                .into_iter()
                .enumerate()
                .map(|(i, c)| (format!("c{i}"), c[..n].to_vec()))
                .collect();
            let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let dates = (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect();
            let t = FeatureTable::from_columns(dates, named).unwrap();

            let filtered = apply_filter(&t, &consistent_columns(&t)).unwrap();
            for (_, values) in filtered.iter_columns() {
                prop_assert!(is_consistent(values));
            }
            let (aligned, offset) = align(&filtered);
            prop_assert!(!aligned.has_nan());
            prop_assert_eq!(aligned.n_rows() + offset, n);
        }
    }
}
