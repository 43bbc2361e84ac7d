//! Alpha Vantage daily time-series provider.
//!
//! Fetches `TIME_SERIES_DAILY` or `TIME_SERIES_DAILY_ADJUSTED` as JSON. Failed
//! requests are retried a fixed number of times with a fixed delay; after the
//! last attempt the provider reports [`DataError::ConnectivityExhausted`].
//!
//! Alpha Vantage answers API problems with HTTP 200 and a JSON body carrying
//! `Error Message`, `Note` or `Information`, so the body is inspected before
//! the series is parsed.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{DataError, DataProvider, DataSource, FetchRequest, FetchResult, Metadata};
use crate::domain::{Bar, PriceTable, SortOrder};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const SERIES_KEY: &str = "Time Series (Daily)";

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Meta Data")]
    meta: Option<HashMap<String, String>>,
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, HashMap<String, String>>>,
    #[serde(rename = "Error Message")]
    error: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Read the API key from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, DataError> {
        let key = std::env::var(var).map_err(|_| {
            DataError::AuthenticationRequired(format!("set {var} to an Alpha Vantage API key"))
        })?;
        Self::new(key)
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query_url(&self, request: &FetchRequest) -> String {
        let function = if request.adjusted {
            "TIME_SERIES_DAILY_ADJUSTED"
        } else {
            "TIME_SERIES_DAILY"
        };
        format!(
            "{}?function={function}&symbol={}&outputsize={}&datatype=json&apikey={}",
            self.base_url,
            request.symbol,
            request.output_size.as_str(),
            self.api_key
        )
    }

    /// One HTTP round trip. `Ok(Err(_))` is a failure worth retrying.
    fn attempt(&self, url: &str) -> Result<Result<String, DataError>, DataError> {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                return Ok(Err(DataError::NetworkUnreachable(e.to_string())))
            }
            Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DataError::AuthenticationRequired(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Ok(Err(DataError::NetworkUnreachable(format!("HTTP {status}"))));
        }
        match resp.text() {
            Ok(body) => Ok(Ok(body)),
            Err(e) => Ok(Err(DataError::NetworkUnreachable(format!("read body: {e}")))),
        }
    }

    fn fetch_with_retry(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        let url = self.query_url(request);
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                std::thread::sleep(self.retry_delay);
            }
            debug!(symbol = %request.symbol, attempt, "alpha vantage request");

            let outcome = match self.attempt(&url)? {
                Ok(body) => parse_response(&request.symbol, &body, request.adjusted, request.order),
                Err(e) => Err(e),
            };
            match outcome {
                Ok((table, metadata)) => {
                    return Ok(FetchResult {
                        table,
                        metadata,
                        source: DataSource::AlphaVantage,
                    })
                }
                Err(e @ (DataError::NetworkUnreachable(_) | DataError::RateLimited(_))) => {
                    warn!(
                        symbol = %request.symbol,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "alpha vantage request failed"
                    );
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(DataError::ConnectivityExhausted {
            symbol: request.symbol.clone(),
            attempts: self.max_attempts,
            last_error,
        })
    }
}

impl DataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, DataError> {
        self.fetch_with_retry(request)
    }
}

/// Value of the first key ending in `suffix` (keys look like `"4. close"`).
fn field<'a>(map: &'a HashMap<String, String>, suffix: &str) -> Option<&'a str> {
    map.iter()
        .find(|(k, _)| k.split_once(". ").map_or(k.as_str(), |(_, name)| name) == suffix)
        .map(|(_, v)| v.as_str())
}

fn number(day: &str, map: &HashMap<String, String>, name: &str) -> Result<f64, DataError> {
    field(map, name)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("{day}: no '{name}' field")))?
        .trim()
        .parse::<f64>()
        .map_err(|e| DataError::ResponseFormatChanged(format!("{day}: bad '{name}': {e}")))
}

/// Parse a daily series body into a sorted table and its metadata.
///
/// With `adjusted`, open/high/low/close are rescaled by
/// `adjusted close / close` so the whole bar is split and dividend adjusted.
pub fn parse_response(
    symbol: &str,
    body: &str,
    adjusted: bool,
    order: SortOrder,
) -> Result<(PriceTable, Metadata), DataError> {
    let resp: DailyResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("invalid JSON for {symbol}: {e}")))?;

    if resp.error.is_some() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    if let Some(note) = resp.note.or(resp.information) {
        return Err(DataError::RateLimited(note));
    }

    let meta = resp
        .meta
        .ok_or_else(|| DataError::ResponseFormatChanged("no 'Meta Data' object".into()))?;
    let series = resp
        .series
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("no '{SERIES_KEY}' object")))?;

    let mut bars = Vec::with_capacity(series.len());
    for (day, values) in &series {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| DataError::ResponseFormatChanged(format!("bad date '{day}': {e}")))?;
        let close = number(day, values, "close")?;
        let factor = if adjusted {
            let adjusted_close = number(day, values, "adjusted close")?;
            if close == 0.0 {
                1.0
            } else {
                adjusted_close / close
            }
        } else {
            1.0
        };
        let volume = number(day, values, "volume")?;
        bars.push(Bar {
            date,
            open: number(day, values, "open")? * factor,
            high: number(day, values, "high")? * factor,
            low: number(day, values, "low")? * factor,
            close: close * factor,
            volume: volume.max(0.0) as u64,
        });
    }
    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    let table = PriceTable::sorted(bars, order);
    table
        .validate(order)
        .map_err(|e| DataError::ValidationError(e.to_string()))?;

    let metadata = Metadata {
        symbol: field(&meta, "Symbol").unwrap_or(symbol).to_string(),
        timezone: field(&meta, "Time Zone").unwrap_or("US/Eastern").to_string(),
        last_refreshed: field(&meta, "Last Refreshed").unwrap_or_default().to_string(),
    };
    Ok((table, metadata))
}
