// src/services/fetcher.rs
use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use reqwest::Client;
use std::time::Duration;

use super::alpha_vantage::AlphaVantageClient;
use super::rates::fetch_rate_environment;
use super::sample::sample_bundle;
use crate::models::{DataSource, FinancialBundle};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Used when pre-tax income is zero or negative.
pub const DEFAULT_TAX_RATE: f64 = 0.21;

/// Effective tax rate from the income statement, clamped to [0, 1].
pub fn effective_tax_rate(tax_expense: f64, pretax_income: f64) -> f64 {
    if pretax_income > 0.0 {
        (tax_expense / pretax_income).clamp(0.0, 1.0)
    } else {
        DEFAULT_TAX_RATE
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub alpha_vantage_key: Option<String>,
    pub fred_key: Option<String>,
    pub equity_risk_premium: f64,
    /// Skip company-data requests and use the bundled sample.
    pub force_sample: bool,
}

async fn fetch_live(client: &Client, ticker: &str, api_key: &str, options: &FetchOptions) -> Result<FinancialBundle> {
    let fundamentals = AlphaVantageClient::new(client.clone(), api_key)
        .fetch_fundamentals(ticker)
        .await?;
    let company = fundamentals.normalize()?;
    let rates = fetch_rate_environment(client, options.fred_key.as_deref(), options.equity_risk_premium).await;

    Ok(FinancialBundle {
        profile: company.profile,
        history: company.history,
        balance_sheet: company.balance_sheet,
        balance_history: company.balance_history,
        market: company.market,
        rates,
        source: DataSource::Live,
        fetched_at: Utc::now(),
    })
}

/// Company data, market data and rates for `ticker`. Falls back to the
/// bundled sample when live data is disabled, unkeyed or unavailable; live
/// rates are still used when they can be fetched.
pub async fn fetch_all(ticker: &str, options: &FetchOptions) -> Result<FinancialBundle> {
    let ticker = ticker.trim().to_uppercase();
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    if !options.force_sample {
        match options.alpha_vantage_key.as_deref() {
            Some(key) => match fetch_live(&client, &ticker, key, options).await {
                Ok(bundle) => {
                    info!(
                        "Fetched {} fiscal years for {} ({})",
                        bundle.history.len(),
                        bundle.profile.name,
                        bundle.profile.ticker
                    );
                    return Ok(bundle);
                }
                Err(e) => warn!("Live data for {} unavailable, using sample data: {:#}", ticker, e),
            },
            None => warn!("No Alpha Vantage API key set, using sample data for {}", ticker),
        }
    }

    let mut bundle = sample_bundle(&ticker, options.equity_risk_premium)?;
    if !options.force_sample {
        bundle.rates = fetch_rate_environment(&client, options.fred_key.as_deref(), options.equity_risk_premium).await;
    }
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateSource;

    #[test]
    fn tax_rate_falls_back_when_pretax_is_not_positive() {
        assert_eq!(effective_tax_rate(10.0, 0.0), DEFAULT_TAX_RATE);
        assert_eq!(effective_tax_rate(10.0, -50.0), DEFAULT_TAX_RATE);
        assert!((effective_tax_rate(21.0, 100.0) - 0.21).abs() < 1e-12);
        assert_eq!(effective_tax_rate(-5.0, 100.0), 0.0);
    }

    #[tokio::test]
    async fn forced_sample_does_not_touch_the_network() {
        let options = FetchOptions {
            equity_risk_premium: 0.055,
            force_sample: true,
            ..FetchOptions::default()
        };
        let bundle = fetch_all("aapl", &options).await.unwrap();
        assert_eq!(bundle.source, DataSource::Sample);
        assert_eq!(bundle.rates.source, RateSource::Fallback);
        assert_eq!(bundle.profile.ticker, "AAPL");
    }
}
