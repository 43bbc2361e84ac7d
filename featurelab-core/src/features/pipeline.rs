//! Pipeline orchestrator.
//!
//! Stage order is fixed: indicator generator, consistency filter, scaler
//! union, optional distance union, NaN-offset aligner. `fit_transform` freezes
//! every stage's schema into [`PipelineState`]; `transform` replays the stages
//! against that state without refitting anything.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::consistency::{align, apply_filter, consistent_columns, nan_offset};
use super::distances::distance_union;
use super::error::PipelineError;
use super::generator::IndicatorGenerator;
use super::scalers::build_scaler;
use super::table::{FeatureTable, Schema};
use super::union::{FeatureUnion, UnionLayout};
use crate::config::FeatureConfig;
use crate::domain::{Bar, PriceTable};
use crate::indicators::{self, IndicatorEntry};

/// Aligned features with their labels trimmed by the same offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSet {
    pub features: FeatureTable,
    pub labels: Vec<f64>,
}

/// Everything frozen at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub indicator_schema: Schema,
    pub filtered_schema: Schema,
    pub scaler_layout: UnionLayout,
    pub distance_layout: Option<UnionLayout>,
    /// Leading rows the aligner dropped from the training output.
    pub nan_offset: usize,
    pub output_schema: Schema,
}

#[derive(Debug)]
pub struct FeaturePipeline {
    generator: IndicatorGenerator,
    scalers: FeatureUnion,
    distances: Option<FeatureUnion>,
    state: Option<PipelineState>,
}

/// Catalogue entries selected by the `[indicators]` section.
pub fn select_entries(config: &FeatureConfig) -> Result<Vec<IndicatorEntry>, PipelineError> {
    for name in &config.indicators.exclude {
        if indicators::lookup(name).is_none() {
            return Err(PipelineError::InvalidParameter(format!(
                "unknown indicator '{name}' in exclude list"
            )));
        }
    }
    Ok(indicators::catalogue()
        .iter()
        .filter(|e| !config.indicators.exclude.iter().any(|x| x == e.name))
        .filter(|e| !config.indicators.finite_memory_only || e.is_windowed())
        .copied()
        .collect())
}

impl FeaturePipeline {
    pub fn new(config: &FeatureConfig) -> Result<Self, PipelineError> {
        Self::with_entries(config, select_entries(config)?)
    }

    /// Same as [`FeaturePipeline::new`] with an explicit indicator list.
    pub fn with_entries(
        config: &FeatureConfig,
        entries: Vec<IndicatorEntry>,
    ) -> Result<Self, PipelineError> {
        if config.indicators.buffer_size == 0 {
            return Err(PipelineError::InvalidParameter("buffer size must be > 0".into()));
        }
        let branches = config
            .scalers
            .iter()
            .map(build_scaler)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            generator: IndicatorGenerator::with_entries(entries, config.indicators.buffer_size),
            scalers: FeatureUnion::new(branches)?,
            distances: distance_union(&config.distances)?,
            state: None,
        })
    }

    pub fn state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn generator(&self) -> &IndicatorGenerator {
        &self.generator
    }

    /// Fit every stage on `prices` and return the aligned training set.
    ///
    /// `labels` must have one value per price row.
    pub fn fit_transform(
        &mut self,
        prices: &PriceTable,
        labels: &[f64],
    ) -> Result<TrainingSet, PipelineError> {
        if labels.len() != prices.len() {
            return Err(PipelineError::LabelLengthMismatch {
                labels: labels.len(),
                rows: prices.len(),
            });
        }

        let generated = self.generator.fit_transform(prices)?;
        let indicator_schema = generated.schema();

        let filtered_schema = consistent_columns(&generated);
        let dropped: Vec<&str> = indicator_schema
            .iter()
            .filter(|name| !filtered_schema.contains(name))
            .collect();
        info!(
            kept = filtered_schema.len(),
            dropped = dropped.len(),
            "consistency filter: dropped {dropped:?}"
        );
        let filtered = apply_filter(&generated, &filtered_schema)?;

        let scaled = self.scalers.fit_transform(&filtered)?;
        let scaler_layout = self.scaled_layout()?;
        info!(rows = scaled.n_rows(), columns = scaled.n_cols(), "scaler union");

        let (combined, distance_layout) = match self.distances.as_mut() {
            Some(union) => {
                let out = union.fit_transform(&scaled)?;
                info!(rows = out.n_rows(), columns = out.n_cols(), "distance union");
                (out, union.layout().cloned())
            }
            None => (scaled, None),
        };

        let (features, offset) = align(&combined);
        info!(
            offset,
            rows = features.n_rows(),
            columns = features.n_cols(),
            "aligned training features"
        );

        self.state = Some(PipelineState {
            indicator_schema,
            filtered_schema,
            scaler_layout,
            distance_layout,
            nan_offset: offset,
            output_schema: features.schema(),
        });

        let labels = labels[offset.min(labels.len())..].to_vec();
        Ok(TrainingSet { features, labels })
    }

    /// Run new rows through the fitted stages.
    ///
    /// Rows that still carry NaN at the front (not enough history buffered)
    /// are dropped with a warning; a NaN after them is an error. Any error
    /// resets the pipeline, since the stages may have advanced their buffers
    /// unevenly: the next call must be `fit_transform`.
    pub fn transform(&mut self, prices: &PriceTable) -> Result<FeatureTable, PipelineError> {
        let state = self.state.as_ref().ok_or(PipelineError::NotFitted("feature pipeline"))?;
        let filtered_schema = state.filtered_schema.clone();
        let output_schema = state.output_schema.clone();

        match self.run_stages(prices, &filtered_schema, &output_schema) {
            Ok(out) => Ok(out),
            Err(e) => {
                warn!(error = %e, "transform failed, pipeline reset");
                self.reset();
                Err(e)
            }
        }
    }

    /// Drop the fitted state and every stage buffer.
    pub fn reset(&mut self) {
        self.generator.reset();
        self.scalers.reset();
        if let Some(union) = self.distances.as_mut() {
            union.reset();
        }
        self.state = None;
    }

    fn run_stages(
        &mut self,
        prices: &PriceTable,
        filtered_schema: &Schema,
        output_schema: &Schema,
    ) -> Result<FeatureTable, PipelineError> {
        let generated = self.generator.transform(prices)?;
        let filtered = apply_filter(&generated, filtered_schema)?;
        let scaled = self.scalers.transform(&filtered)?;
        let combined = match self.distances.as_mut() {
            Some(union) => union.transform(&scaled)?,
            None => scaled,
        };

        let offset = nan_offset(&combined);
        if offset > 0 {
            warn!(
                dropped = offset,
                rows = combined.n_rows(),
                "transform produced undefined leading rows"
            );
        }
        let out = combined.skip_rows(offset);
        if out.schema() != *output_schema {
            return Err(PipelineError::SchemaMismatch {
                expected: output_schema.names().to_vec(),
                actual: out.names().to_vec(),
            });
        }
        if let Some((column, row)) = first_undefined(&out) {
            return Err(PipelineError::UndefinedValue {
                column: column.to_string(),
                date: out.dates()[row],
            });
        }
        Ok(out)
    }

    /// Transform a single bar.
    pub fn transform_bar(&mut self, bar: &Bar) -> Result<FeatureTable, PipelineError> {
        self.transform(&PriceTable::from(bar.clone()))
    }

    fn scaled_layout(&self) -> Result<UnionLayout, PipelineError> {
        self.scalers
            .layout()
            .cloned()
            .ok_or(PipelineError::NotFitted("scaler union"))
    }
}

/// First `(column, row)` holding NaN.
fn first_undefined(table: &FeatureTable) -> Option<(&str, usize)> {
    table
        .iter_columns()
        .find_map(|(name, values)| values.iter().position(|v| v.is_nan()).map(|row| (name, row)))
}
