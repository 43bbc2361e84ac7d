//! On-disk cache for prices and processed features.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{prices.parquet, meta.json, features.csv}`
//!
//! - Prices are stored as Parquet in the row order they were fetched, so a
//!   reload returns an identical table.
//! - `meta.json` carries the source metadata and a BLAKE3 hash of the bars,
//!   checked again on load.
//! - Feature tables are CSV with a leading `date` column; NaN is written as
//!   `NaN` and read back as NaN.
//! - Every write goes to a `.tmp` file first and is renamed into place.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::provider::{DataError, DataSource, FetchResult, Metadata};
use crate::domain::{Bar, PriceTable, SortOrder};
use crate::features::FeatureTable;

const PRICES_FILE: &str = "prices.parquet";
const META_FILE: &str = "meta.json";
const FEATURES_FILE: &str = "features.csv";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub timezone: String,
    pub last_refreshed: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub sort_order: SortOrder,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
    pub has_features: bool,
}

pub struct DataCache {
    cache_dir: PathBuf,
}

impl DataCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/symbol={SYMBOL}/`
    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn prices_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join(PRICES_FILE)
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join(META_FILE)
    }

    pub fn features_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join(FEATURES_FILE)
    }

    /// Persist a fetched table and its metadata sidecar.
    pub fn write_prices(&self, fetched: &FetchResult, order: SortOrder) -> Result<CacheMeta, DataError> {
        let table = &fetched.table;
        let (first, last) = match (table.bars().first(), table.bars().last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(DataError::CacheError("no bars to cache".into())),
        };
        let symbol = &fetched.metadata.symbol;
        self.ensure_symbol_dir(symbol)?;

        let df = bars_to_dataframe(table.bars())?;
        atomic_write(&self.prices_path(symbol), |path| write_parquet(&df, path))?;

        let meta = CacheMeta {
            symbol: symbol.clone(),
            timezone: fetched.metadata.timezone.clone(),
            last_refreshed: fetched.metadata.last_refreshed.clone(),
            start_date: first.date.min(last.date),
            end_date: first.date.max(last.date),
            bar_count: table.len(),
            sort_order: order,
            data_hash: hash_bars(table.bars())?,
            source: fetched.source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        atomic_write(&self.meta_path(symbol), |path| {
            fs::write(path, &json).map_err(|e| DataError::CacheError(format!("meta write: {e}")))
        })?;

        info!(symbol = %symbol, bars = meta.bar_count, "cached prices");
        Ok(meta)
    }

    /// Reload cached prices; the table comes back in the stored row order.
    pub fn load_prices(&self, symbol: &str) -> Result<FetchResult, DataError> {
        let path = self.prices_path(symbol);
        let meta = self.get_meta(symbol).filter(|_| path.exists()).ok_or_else(|| {
            DataError::NoCachedData {
                symbol: symbol.to_string(),
            }
        })?;

        let bars = load_parquet(&path)?;
        let hash = hash_bars(&bars)?;
        if hash != meta.data_hash {
            return Err(DataError::ValidationError(format!(
                "{symbol}: cached prices do not match their recorded hash"
            )));
        }
        debug!(symbol, bars = bars.len(), "loaded cached prices");

        Ok(FetchResult {
            table: PriceTable::new(bars),
            metadata: Metadata {
                symbol: meta.symbol,
                timezone: meta.timezone,
                last_refreshed: meta.last_refreshed,
            },
            source: DataSource::Cache,
        })
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Write a feature table as CSV (`date` first, then the table's columns).
    pub fn write_features(&self, symbol: &str, table: &FeatureTable) -> Result<PathBuf, DataError> {
        self.ensure_symbol_dir(symbol)?;
        let path = self.features_path(symbol);
        atomic_write(&path, |tmp| write_feature_csv(table, tmp))?;
        info!(
            symbol,
            rows = table.n_rows(),
            columns = table.n_cols(),
            "wrote features to {}",
            path.display()
        );
        Ok(path)
    }

    pub fn load_features(&self, symbol: &str) -> Result<FeatureTable, DataError> {
        let path = self.features_path(symbol);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }
        read_feature_csv(&path)
    }

    /// Symbols with a cache directory, sorted by name.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            if let Some(symbol) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("symbol="))
            {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                    has_features: self.features_path(sym).exists(),
                }
            })
            .collect()
    }

    fn ensure_symbol_dir(&self, symbol: &str) -> Result<(), DataError> {
        fs::create_dir_all(self.symbol_dir(symbol))
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))
    }
}

/// Write through `{path}.tmp`, then rename into place.
fn atomic_write(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), DataError>,
) -> Result<(), DataError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::CacheError(format!("atomic rename failed: {e}"))
    })
}

fn hash_bars(bars: &[Bar]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }

    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let float = |name: &str| -> Result<Vec<f64>, DataError> {
        let ca = df
            .column(name)
            .map_err(map_err)?
            .f64()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))?;
        Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    };
    let opens = float("open")?;
    let highs = float("high")?;
    let lows = float("low")?;
    let closes = float("close")?;
    let volumes = df
        .column("volume")
        .map_err(map_err)?
        .u64()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        bars.push(Bar {
            date: epoch() + chrono::Duration::days(days as i64),
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}

// ── CSV I/O helpers ─────────────────────────────────────────────────

fn write_feature_csv(table: &FeatureTable, path: &Path) -> Result<(), DataError> {
    let csv_err = |e: csv::Error| DataError::CsvError(e.to_string());
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut header = vec!["date".to_string()];
    header.extend(table.names().iter().cloned());
    writer.write_record(&header).map_err(csv_err)?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut record = vec![date.format(DATE_FORMAT).to_string()];
        record.extend(table.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| DataError::CsvError(format!("flush: {e}")))
}

fn read_feature_csv(path: &Path) -> Result<FeatureTable, DataError> {
    let csv_err = |e: csv::Error| DataError::CsvError(e.to_string());
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let header = reader.headers().map_err(csv_err)?.clone();
    if header.get(0) != Some("date") {
        return Err(DataError::ValidationError(format!(
            "{}: first column must be 'date'",
            path.display()
        )));
    }
    let names: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let date_str = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
            DataError::ValidationError(format!("row {row}: bad date '{date_str}': {e}"))
        })?;
        dates.push(date);
        for (column, field) in columns.iter_mut().zip(record.iter().skip(1)) {
            let value = field.parse::<f64>().map_err(|e| {
                DataError::ValidationError(format!("row {row}: bad value '{field}': {e}"))
            })?;
            column.push(value);
        }
    }

    FeatureTable::from_columns(dates, names.into_iter().zip(columns).collect())
        .map_err(|e| DataError::ValidationError(e.to_string()))
}
