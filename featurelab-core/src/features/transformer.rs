//! Transformer trait: the seam every table-to-table stage implements.

use super::error::PipelineError;
use super::table::FeatureTable;

/// A fit/transform stage over feature tables.
///
/// `transform` takes `&mut self` because buffered stages replace their buffer
/// on every call. Stages without a buffer simply ignore the mutability.
pub trait Transformer: Send + Sync {
    /// Branch identifier, used as the column suffix inside a union.
    fn name(&self) -> &str;

    /// Learn whatever state later transforms need.
    fn fit(&mut self, table: &FeatureTable) -> Result<(), PipelineError>;

    /// Apply the fitted state to new rows.
    fn transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError>;

    /// Fit and transform the same rows in one pass.
    ///
    /// Buffered stages override this so the rows are not seen twice.
    fn fit_transform(&mut self, table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Forget everything learned; the next call must be a fit.
    fn reset(&mut self) {}
}
