// src/bin/test_rates.rs
use dcf_scenarios::config::DEFAULT_EQUITY_RISK_PREMIUM;
use dcf_scenarios::services::rates::{fetch_fred_series, fetch_rate_environment, fetch_treasury_yields};
use dotenv::dotenv;
use reqwest::Client;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    let client = Client::new();

    let yields = fetch_treasury_yields(&client).await?;
    println!("Treasury CSV ({:?})", yields.date);
    println!("  10y Nominal Yield: {:.4}", yields.ten_year);
    println!("  2y Nominal Yield:  {:?}", yields.two_year);

    let fred_key = env::var("FRED_API_KEY").ok();
    if let Some(key) = fred_key.as_deref() {
        println!("FRED DGS10: {:?}", fetch_fred_series(&client, key, "DGS10").await?);
        println!("FRED DGS2:  {:?}", fetch_fred_series(&client, key, "DGS2").await?);
    }

    let rates = fetch_rate_environment(&client, fred_key.as_deref(), DEFAULT_EQUITY_RISK_PREMIUM).await;
    println!("Selected: {:.4} from {}", rates.risk_free_rate, rates.source);
    Ok(())
}
