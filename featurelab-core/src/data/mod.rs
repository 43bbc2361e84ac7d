//! Market data: the Alpha Vantage provider, the on-disk cache and a
//! deterministic synthetic source.

pub mod alpha_vantage;
pub mod cache;
pub mod provider;
pub mod synthetic;

pub use alpha_vantage::AlphaVantageProvider;
pub use cache::{CacheMeta, CacheStatus, DataCache};
pub use provider::{
    DataError, DataProvider, DataSource, FetchRequest, FetchResult, Metadata, OutputSize,
};
pub use synthetic::{synthetic_prices, SyntheticProvider};
