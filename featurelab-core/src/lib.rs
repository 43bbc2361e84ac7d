//! FeatureLab Core: turns daily OHLCV series into a dense feature matrix.
//!
//! - Domain types (bars, price tables, sort order)
//! - A static catalogue of technical indicators
//! - Buffered feature stages that give the same answer in one batch or row by row
//! - Column consistency filter, NaN-offset aligner and the pipeline orchestrator
//! - Next-day labels, the Alpha Vantage provider and the Parquet/CSV cache

pub mod config;
pub mod data;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod labels;
