//! Stateful feature pipeline: buffered stages over [`FeatureTable`]s.

pub mod buffer;
pub mod consistency;
pub mod distances;
pub mod error;
pub mod generator;
pub mod lowess;
pub mod pipeline;
pub mod scalers;
pub mod table;
pub mod transformer;
pub mod union;

pub use buffer::{RowTable, TailBuffer};
pub use error::PipelineError;
pub use generator::{GenerationReport, IndicatorGenerator, DEFAULT_BUFFER_SIZE};
pub use lowess::lowess;
pub use pipeline::{FeaturePipeline, PipelineState, TrainingSet};
pub use table::{FeatureTable, Schema};
pub use transformer::Transformer;
pub use union::{FeatureUnion, UnionLayout};
