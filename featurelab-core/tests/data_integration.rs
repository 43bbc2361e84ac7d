//! Integration tests for the data layer: synthetic source, cache round trips,
//! configuration files and a full offline build.

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use featurelab_core::config::FeatureConfig;
use featurelab_core::data::{
    DataCache, DataError, DataProvider, DataSource, FetchRequest, SyntheticProvider,
};
use featurelab_core::domain::SortOrder;
use featurelab_core::features::FeaturePipeline;
use featurelab_core::labels::make_labels;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("featurelab_data_test_{}_{id}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn provider() -> SyntheticProvider {
    SyntheticProvider::new(NaiveDate::from_ymd_opt(2024, 6, 28).unwrap())
}

#[test]
fn fetched_prices_survive_the_cache() {
    let cache = DataCache::new(temp_dir());
    let fetched = provider().fetch(&FetchRequest::daily("SPY")).unwrap();
    assert!(fetched.table.validate(SortOrder::Descending).is_ok());

    let meta = cache.write_prices(&fetched, SortOrder::Descending).unwrap();
    assert_eq!(meta.bar_count, fetched.table.len());
    assert_eq!(meta.source, DataSource::Synthetic);

    let loaded = cache.load_prices("SPY").unwrap();
    assert_eq!(loaded.table, fetched.table);
    assert_eq!(loaded.source, DataSource::Cache);
    assert_eq!(loaded.metadata.last_refreshed, "2024-06-28");
}

#[test]
fn offline_build_writes_reloadable_features() {
    let dir = temp_dir();
    let cache = DataCache::new(dir.join("cache"));
    let config = FeatureConfig::default();

    let mut request = FetchRequest::daily("QQQ");
    request.order = config.data.sort_order;
    let fetched = provider().fetch(&request).unwrap();
    cache.write_prices(&fetched, config.data.sort_order).unwrap();

    let prices = cache.load_prices("QQQ").unwrap().table;
    let labels = make_labels(&prices, config.data.sort_order, config.labels.breakeven);
    let mut pipeline = FeaturePipeline::new(&config).unwrap();
    let set = pipeline.fit_transform(&prices, &labels).unwrap();
    assert!(!set.features.has_nan());

    let mut table = set.features.clone();
    table.push_column("label", set.labels.clone()).unwrap();
    let path = cache.write_features("QQQ", &table).unwrap();
    assert!(path.ends_with("symbol=QQQ/features.csv"));

    let reloaded = cache.load_features("QQQ").unwrap();
    assert!(reloaded.approx_eq(&table, 0.0));
    assert!(cache.status(&["QQQ"])[0].has_features);
}

#[test]
fn config_file_drives_the_pipeline() {
    let dir = temp_dir();
    let path = dir.join("featurelab.toml");
    fs::write(
        &path,
        r#"
[data]
sort_order = "ascending"

[indicators]
finite_memory_only = true
exclude = ["ichimoku"]

[[scalers]]
type = "PASSTHROUGH"

[[scalers]]
type = "MOVING_MIN_MAX"
window = 5

[[distances]]
type = "SMA"
window = 10
"#,
    )
    .unwrap();

    let config = FeatureConfig::from_file(&path).unwrap();
    assert_eq!(config.data.sort_order, SortOrder::Ascending);

    let mut request = FetchRequest::daily("IWM");
    request.order = config.data.sort_order;
    let prices = provider().fetch(&request).unwrap().table;
    let labels = make_labels(&prices, config.data.sort_order, 0.0);

    let mut pipeline = FeaturePipeline::new(&config).unwrap();
    let set = pipeline.fit_transform(&prices, &labels).unwrap();
    assert!(set.features.contains("close"));
    assert!(set.features.contains("close_moving_minmax_scaler"));
    assert!(set.features.contains("close_dist_sma10"));
    assert!(!set.features.names().iter().any(|n| n.starts_with("ichimoku")));
}

#[test]
fn missing_cache_entry_is_a_typed_error() {
    let cache = DataCache::new(temp_dir());
    match cache.load_prices("NOPE") {
        Err(DataError::NoCachedData { symbol }) => assert_eq!(symbol, "NOPE"),
        other => panic!("expected NoCachedData, got {other:?}"),
    }
}
