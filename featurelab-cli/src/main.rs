//! FeatureLab CLI: download, build and status commands.
//!
//! Commands:
//! - `download` fetches daily prices from Alpha Vantage and caches them as Parquet
//! - `build` turns cached (or freshly fetched) prices into a labelled feature CSV
//! - `status` reports what the cache holds per symbol

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use featurelab_core::config::FeatureConfig;
use featurelab_core::data::{
    AlphaVantageProvider, DataCache, DataError, DataProvider, FetchRequest, SyntheticProvider,
};
use featurelab_core::domain::PriceTable;
use featurelab_core::features::{FeaturePipeline, FeatureTable};
use featurelab_core::labels::make_labels;

#[derive(Parser)]
#[command(
    name = "featurelab",
    about = "FeatureLab CLI: technical-indicator feature sets from daily prices"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily prices and cache them as Parquet.
    Download {
        /// Symbols to download (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Generate deterministic synthetic prices instead of calling the API.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Build the labelled feature set for one symbol and write features.csv.
    Build {
        symbol: String,

        /// Offline mode: only use cached prices.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic prices when the symbol is not cached.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Fetch again even if the symbol is cached.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Replay the last N rows through `transform` after fitting on the rest.
        #[arg(long, default_value_t = 0)]
        holdout: usize,

        /// Write the fitted pipeline state as JSON to this path.
        #[arg(long)]
        state_out: Option<PathBuf>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Report cached symbols, date ranges and feature files.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download {
            symbols,
            synthetic,
            cache_dir,
        } => run_download(&config, symbols, synthetic, &cache_dir),
        Commands::Build {
            symbol,
            offline,
            synthetic,
            refresh,
            holdout,
            state_out,
            cache_dir,
        } => run_build(
            &config,
            &symbol,
            BuildOptions {
                offline,
                synthetic,
                refresh,
                holdout,
            },
            state_out.as_deref(),
            &cache_dir,
        ),
        Commands::Status { cache_dir } => run_status(&cache_dir),
    }
}

fn load_config(path: Option<&Path>) -> Result<FeatureConfig> {
    match path {
        Some(path) => FeatureConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(FeatureConfig::default()),
    }
}

fn request_for(config: &FeatureConfig, symbol: &str) -> FetchRequest {
    FetchRequest {
        symbol: symbol.to_string(),
        adjusted: config.data.adjusted,
        output_size: config.data.output_size,
        order: config.data.sort_order,
    }
}

fn provider_for(config: &FeatureConfig, synthetic: bool) -> Result<Box<dyn DataProvider>> {
    if synthetic {
        let today = chrono::Local::now().date_naive();
        return Ok(Box::new(SyntheticProvider::new(today)));
    }
    let provider = AlphaVantageProvider::from_env(&config.data.api_key_env)?.with_retry(
        config.data.max_attempts,
        Duration::from_millis(config.data.retry_delay_ms),
    );
    Ok(Box::new(provider))
}

fn run_download(
    config: &FeatureConfig,
    symbols: Vec<String>,
    synthetic: bool,
    cache_dir: &Path,
) -> Result<()> {
    let provider = provider_for(config, synthetic)?;
    let cache = DataCache::new(cache_dir);

    let mut errors: Vec<(String, DataError)> = Vec::new();
    for symbol in &symbols {
        let outcome = provider
            .fetch(&request_for(config, symbol))
            .and_then(|fetched| cache.write_prices(&fetched, config.data.sort_order));
        match outcome {
            Ok(meta) => println!(
                "{symbol}: {} bars, {} to {}",
                meta.bar_count, meta.start_date, meta.end_date
            ),
            Err(e) => errors.push((symbol.clone(), e)),
        }
    }

    if !errors.is_empty() {
        for (sym, err) in &errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

struct BuildOptions {
    offline: bool,
    synthetic: bool,
    refresh: bool,
    holdout: usize,
}

/// Cached prices unless a refresh is requested or the symbol is missing.
fn load_prices(
    config: &FeatureConfig,
    cache: &DataCache,
    symbol: &str,
    opts: &BuildOptions,
) -> Result<PriceTable> {
    if !opts.refresh {
        match cache.load_prices(symbol) {
            Ok(cached) => {
                let order = config.data.sort_order;
                return Ok(PriceTable::sorted(cached.table.into_bars(), order));
            }
            Err(DataError::NoCachedData { .. }) if !opts.offline => {
                info!(symbol, "not cached, fetching");
            }
            Err(e) => return Err(e.into()),
        }
    } else if opts.offline {
        bail!("--refresh and --offline are mutually exclusive");
    }

    let provider = provider_for(config, opts.synthetic)?;
    let fetched = provider.fetch(&request_for(config, symbol))?;
    cache.write_prices(&fetched, config.data.sort_order)?;
    Ok(fetched.table)
}

fn run_build(
    config: &FeatureConfig,
    symbol: &str,
    opts: BuildOptions,
    state_out: Option<&Path>,
    cache_dir: &Path,
) -> Result<()> {
    let cache = DataCache::new(cache_dir);
    let prices = load_prices(config, &cache, symbol, &opts)?;
    let labels = make_labels(&prices, config.data.sort_order, config.labels.breakeven);

    if opts.holdout >= prices.len() {
        bail!(
            "--holdout {} leaves no rows to fit ({} bars available)",
            opts.holdout,
            prices.len()
        );
    }
    let (head, tail) = prices.split_tail(opts.holdout);

    let mut pipeline = FeaturePipeline::new(config)?;
    let set = pipeline.fit_transform(&head, &labels[..head.len()])?;
    let training_rows = set.features.n_rows();
    let mut table = set.features;
    let mut table_labels = set.labels;

    if !tail.is_empty() {
        let replayed = pipeline.transform(&tail)?;
        if replayed.n_rows() < tail.len() {
            warn!(
                symbol,
                requested = tail.len(),
                kept = replayed.n_rows(),
                "holdout rows dropped during replay"
            );
        }
        let start = labels.len() - replayed.n_rows();
        table_labels.extend_from_slice(&labels[start..]);
        table = table.vstack(&replayed)?;
    }

    let replayed_rows = table.n_rows() - training_rows;
    write_output(&cache, symbol, table, table_labels)?;

    if let Some(path) = state_out {
        let state = pipeline
            .state()
            .context("pipeline has no state after fitting")?;
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("State saved to: {}", path.display());
    }

    println!("Built {symbol}: {training_rows} training rows, {replayed_rows} replayed");
    Ok(())
}

fn write_output(
    cache: &DataCache,
    symbol: &str,
    mut table: FeatureTable,
    labels: Vec<f64>,
) -> Result<()> {
    let (rows, cols) = (table.n_rows(), table.n_cols());
    table.push_column("label", labels)?;
    let path = cache.write_features(symbol, &table)?;
    println!("Features ({rows} rows x {cols} columns) saved to: {}", path.display());
    Ok(())
}

fn run_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = DataCache::new(cache_dir);
    let symbols = cache.symbols()?;
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", symbols.len());
    println!();
    println!(
        "{:<8} {:<25} {:<12} {:>8}",
        "Symbol", "Date Range", "Bars", "Features"
    );
    println!("{}", "-".repeat(56));
    for status in cache.status(&refs) {
        let range = match (status.start_date, status.end_date) {
            (Some(start), Some(end)) => format_range(start, end),
            _ => "(no meta)".into(),
        };
        let bars = status
            .bar_count
            .map(|n| format!("{n} bars"))
            .unwrap_or_default();
        let features = if status.has_features { "yes" } else { "no" };
        println!(
            "{:<8} {:<25} {:<12} {:>8}",
            status.symbol, range, bars, features
        );
    }

    Ok(())
}

fn format_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{start} to {end}")
}
