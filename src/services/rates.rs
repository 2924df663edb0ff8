// src/services/rates.rs
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use csv::Reader;
use log::{error, info, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::models::{RateEnvironment, RateSource};

/// 10-year yield used when neither FRED nor the Treasury endpoint answers.
pub const FALLBACK_RISK_FREE_RATE: f64 = 0.0435;

const FRED_OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

#[derive(Debug, Clone, PartialEq)]
pub struct TreasuryYields {
    pub date: Option<NaiveDate>,
    pub ten_year: f64,
    pub two_year: Option<f64>,
}

pub fn treasury_yield_curve_url(year: i32) -> String {
    format!(
        "https://home.treasury.gov/resource-center/data-chart-center/interest-rates/\
daily-treasury-rates.csv/{year}/all?_format=csv\
&field_tdr_date_value={year}\
&type=daily_treasury_yield_curve",
        year = year
    )
}

fn percent_cell(row: &csv::StringRecord, idx: usize, column: &str) -> Result<f64> {
    let cell = row
        .get(idx)
        .ok_or_else(|| anyhow!("Missing '{}' field", column))?
        .trim();
    let pct = cell
        .parse::<f64>()
        .with_context(|| format!("'{}' value {:?} is not a number", column, cell))?;
    Ok(pct / 100.0)
}

/// Reads the most recent row (the first data row) of a daily yield-curve CSV.
/// Yields are returned as decimals.
pub fn parse_latest_yields(csv_text: &str) -> Result<Option<TreasuryYields>> {
    let mut rdr = Reader::from_reader(csv_text.as_bytes());

    let headers = rdr.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let idx_10yr = position("10 Yr").ok_or_else(|| anyhow!("No '10 Yr' column in yield curve CSV"))?;
    let idx_2yr = position("2 Yr");
    let idx_date = position("Date");

    let row = match rdr.records().next() {
        Some(record) => record?,
        None => return Ok(None),
    };

    let ten_year = percent_cell(&row, idx_10yr, "10 Yr")?;
    let two_year = match idx_2yr {
        Some(idx) => percent_cell(&row, idx, "2 Yr").ok(),
        None => None,
    };
    let date = idx_date
        .and_then(|idx| row.get(idx))
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%m/%d/%Y").ok());

    Ok(Some(TreasuryYields {
        date,
        ten_year,
        two_year,
    }))
}

/// Fetch the latest 10y and 2y nominal yields via the Treasury CSV endpoint.
pub async fn fetch_treasury_yields(client: &Client) -> Result<TreasuryYields> {
    let year = Utc::now().year();
    // Early January the current-year file has no rows yet.
    for y in [year, year - 1] {
        let url = treasury_yield_curve_url(y);
        info!("Fetching treasury yield curve CSV from URL: {}", url);

        let csv_text = client.get(&url).send().await?.error_for_status()?.text().await?;
        if let Some(yields) = parse_latest_yields(&csv_text)? {
            info!("Found 10-year yield: {:.4} ({:?})", yields.ten_year, yields.date);
            return Ok(yields);
        }
        warn!("No data rows in {} yield curve CSV", y);
    }

    error!("No treasury yield data found");
    Err(anyhow!("No valid treasury yield data found"))
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredObservations {
    observations: Vec<FredObservation>,
}

/// First non-missing observation of a FRED response sorted newest first.
/// FRED marks missing values with ".".
pub fn parse_fred_observations(body: &str) -> Result<(Option<NaiveDate>, f64)> {
    let parsed: FredObservations = serde_json::from_str(body).context("Unexpected FRED response")?;
    let obs = parsed
        .observations
        .iter()
        .find(|o| o.value.trim() != ".")
        .ok_or_else(|| anyhow!("FRED returned no usable observations"))?;
    let pct: f64 = obs
        .value
        .trim()
        .parse()
        .with_context(|| format!("FRED value {:?} is not a number", obs.value))?;
    let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok();
    Ok((date, pct / 100.0))
}

pub async fn fetch_fred_series(client: &Client, api_key: &str, series_id: &str) -> Result<(Option<NaiveDate>, f64)> {
    info!("Fetching FRED series {}", series_id);
    let body = client
        .get(FRED_OBSERVATIONS_URL)
        .query(&[
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", "5"),
        ])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_fred_observations(&body)
}

pub fn fallback_rates(equity_risk_premium: f64) -> RateEnvironment {
    RateEnvironment {
        risk_free_rate: FALLBACK_RISK_FREE_RATE,
        equity_risk_premium,
        treasury_2y: Some(0.042),
        source: RateSource::Fallback,
        as_of: NaiveDate::from_ymd_opt(2025, 1, 15),
    }
}

/// Risk-free rate from FRED (with a key), else the Treasury CSV, else the
/// fallback constant. Never fails.
pub async fn fetch_rate_environment(
    client: &Client,
    fred_api_key: Option<&str>,
    equity_risk_premium: f64,
) -> RateEnvironment {
    if let Some(key) = fred_api_key {
        match fetch_fred_series(client, key, "DGS10").await {
            Ok((as_of, risk_free_rate)) => {
                let treasury_2y = match fetch_fred_series(client, key, "DGS2").await {
                    Ok((_, rate)) => Some(rate),
                    Err(e) => {
                        warn!("Failed to fetch FRED DGS2: {}", e);
                        None
                    }
                };
                return RateEnvironment {
                    risk_free_rate,
                    equity_risk_premium,
                    treasury_2y,
                    source: RateSource::Fred,
                    as_of,
                };
            }
            Err(e) => warn!("Failed to fetch FRED DGS10, trying Treasury CSV: {}", e),
        }
    }

    match fetch_treasury_yields(client).await {
        Ok(yields) => RateEnvironment {
            risk_free_rate: yields.ten_year,
            equity_risk_premium,
            treasury_2y: yields.two_year,
            source: RateSource::TreasuryCsv,
            as_of: yields.date,
        },
        Err(e) => {
            error!("Failed to fetch treasury yields, using fallback rate: {}", e);
            fallback_rates(equity_risk_premium)
        }
    }
}
