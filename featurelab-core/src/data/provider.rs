//! Data provider trait and structured error types.
//!
//! Providers return a [`PriceTable`] already sorted in the requested order;
//! the cache sits above this trait and providers don't know about it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PriceTable, SortOrder, Symbol};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("gave up on {symbol} after {attempts} attempts: {last_error}")]
    ConnectivityExhausted {
        symbol: Symbol,
        attempts: u32,
        last_error: String,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: Symbol },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv I/O error: {0}")]
    CsvError(String),

    #[error("no cached data for symbol '{symbol}', run `featurelab download {symbol}` first")]
    NoCachedData { symbol: Symbol },
}

/// `compact` returns the latest 100 sessions, `full` the whole history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    Compact,
    #[default]
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub adjusted: bool,
    pub output_size: OutputSize,
    pub order: SortOrder,
}

impl FetchRequest {
    /// Daily, unadjusted, full history, newest first.
    pub fn daily(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            adjusted: false,
            output_size: OutputSize::Full,
            order: SortOrder::Descending,
        }
    }
}

/// Series metadata reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub symbol: Symbol,
    pub timezone: String,
    pub last_refreshed: String,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    AlphaVantage,
    Cache,
    Synthetic,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub table: PriceTable,
    pub metadata: Metadata,
    pub source: DataSource,
}

pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError>;
}
