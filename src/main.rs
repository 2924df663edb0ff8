// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;

use dcf_scenarios::config::{
    SensitivityConfig, ValuationConfig, DEFAULT_EQUITY_RISK_PREMIUM, DEFAULT_PROJECTION_YEARS,
    DEFAULT_TERMINAL_GROWTH,
};
use dcf_scenarios::models::{DataSource, FinancialBundle};
use dcf_scenarios::report::{build_workbook, csv_writer, xlsx_writer};
use dcf_scenarios::services::sheets::{SheetsConfig, SheetsPublisher};
use dcf_scenarios::services::{fetch_all, FetchOptions};
use dcf_scenarios::valuation::{value_bundle, ValuationOutput};

/// Multi-scenario discounted cash flow valuation of a listed company.
#[derive(Parser, Debug)]
#[command(name = "dcf_scenarios", version, about)]
struct Args {
    /// Stock ticker, e.g. AAPL
    ticker: String,

    /// Output directory [default: <TICKER>_DCF_Model]
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, env = "ALPHA_VANTAGE_API_KEY", hide_env_values = true)]
    alpha_vantage_key: Option<String>,

    #[arg(long, env = "FRED_API_KEY", hide_env_values = true)]
    fred_key: Option<String>,

    #[arg(long, default_value_t = DEFAULT_PROJECTION_YEARS)]
    projection_years: u32,

    /// Base terminal growth rate as a decimal
    #[arg(long, default_value_t = DEFAULT_TERMINAL_GROWTH)]
    terminal_growth: f64,

    /// Equity risk premium as a decimal
    #[arg(long, default_value_t = DEFAULT_EQUITY_RISK_PREMIUM)]
    erp: f64,

    /// WACC step of the sensitivity grid
    #[arg(long, default_value_t = 0.01)]
    wacc_step: f64,

    /// Terminal growth step of the sensitivity grid
    #[arg(long, default_value_t = 0.005)]
    tgr_step: f64,

    /// Use bundled sample data instead of live APIs
    #[arg(long)]
    sample: bool,

    /// Google spreadsheet to publish the workbook to
    #[arg(long, env = "GOOGLE_SHEETS_ID")]
    sheets_id: Option<String>,

    /// Path to a Google service account JSON key
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_JSON")]
    service_account: Option<String>,
}

impl Args {
    fn valuation_config(&self) -> ValuationConfig {
        ValuationConfig {
            projection_years: self.projection_years,
            terminal_growth: self.terminal_growth,
            equity_risk_premium: self.erp,
            sensitivity: SensitivityConfig {
                wacc_step: self.wacc_step,
                tgr_step: self.tgr_step,
                ..SensitivityConfig::default()
            },
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_DCF_Model", self.ticker.trim().to_uppercase())))
    }
}

fn print_summary(bundle: &FinancialBundle, output: &ValuationOutput) {
    let market = &bundle.market;
    println!();
    println!("{} ({})", bundle.profile.name, bundle.profile.ticker);
    println!("Current price: {:.2} {}", market.current_price, bundle.profile.currency);
    println!(
        "WACC: {:.2}%   Risk-free: {:.2}% ({})",
        output.wacc.wacc * 100.0,
        bundle.rates.risk_free_rate * 100.0,
        bundle.rates.source
    );
    println!();
    println!("{:<16} {:>14} {:>12}", "Scenario", "Implied Price", "Upside");
    println!("{}", "-".repeat(44));
    for result in output.scenarios.iter() {
        let upside = result.upside_downside_percent();
        let marker = if upside >= 0.0 { "▲" } else { "▼" };
        println!(
            "{:<16} {:>14.2} {:>10.1}% {}",
            result.scenario.name(),
            result.implied_share_price(),
            upside * 100.0,
            marker
        );
    }
    if bundle.source == DataSource::Sample {
        println!();
        println!("Note: valued on bundled sample data, not live figures.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let config = args.valuation_config();
    config.validate()?;

    println!("[1/4] Fetching data for {}...", args.ticker.to_uppercase());
    let options = FetchOptions {
        alpha_vantage_key: args.alpha_vantage_key.clone(),
        fred_key: args.fred_key.clone(),
        equity_risk_premium: args.erp,
        force_sample: args.sample,
    };
    let bundle = fetch_all(&args.ticker, &options).await?;
    info!(
        "{} data for {}: {} years, rates from {}",
        bundle.source,
        bundle.profile.ticker,
        bundle.history.len(),
        bundle.rates.source
    );

    println!("[2/4] Running valuation scenarios...");
    let output = value_bundle(&bundle, &config).context("Valuation failed")?;

    println!("[3/4] Building workbook...");
    let workbook = build_workbook(&bundle, &output);

    let dir = args.output_dir();
    println!("[4/4] Writing {}...", dir.display());
    let xlsx_path = xlsx_writer::write_xlsx(&workbook, &dir)?;
    csv_writer::write_workbook(&workbook, &dir)?;
    csv_writer::write_valuation_json(&dir, &bundle, &output)?;
    println!("      Workbook: {}", xlsx_path.display());

    if let (Some(spreadsheet_id), Some(key_path)) = (args.sheets_id.clone(), args.service_account.clone()) {
        let publisher = SheetsPublisher::new(SheetsConfig {
            spreadsheet_id,
            service_account_json_path: key_path,
        });
        match publisher.publish(&workbook).await {
            Ok(url) => println!("Published to {}", url),
            Err(e) => error!("Failed to publish to Google Sheets: {:#}", e),
        }
    }

    print_summary(&bundle, &output);
    println!();
    println!("Model written to {}", dir.display());
    Ok(())
}
