// src/services/sample.rs
//! Bundled figures used offline or when live fetching fails.
use chrono::Utc;
use log::info;

use super::fetcher::effective_tax_rate;
use super::rates::fallback_rates;
use crate::models::{
    BalanceSheetSnapshot, BalanceSheetYear, CompanyProfile, DataSource, FinancialBundle, FinancialHistory,
    FinancialYear, MarketData,
};
use crate::valuation::ValuationError;

const MILLION: f64 = 1_000_000.0;

/// Annual figures in millions, most recent fiscal year first. Tax and
/// interest only matter for the latest year.
struct SampleCompany {
    name: &'static str,
    sector: &'static str,
    industry: &'static str,
    current_price: f64,
    market_cap: f64,
    shares_outstanding: f64,
    beta: f64,
    years: [i32; 4],
    revenue: [f64; 4],
    operating_income: [f64; 4],
    net_income: [f64; 4],
    tax_provision: f64,
    interest_expense: f64,
    total_equity: [f64; 4],
    total_debt: [f64; 4],
    cash: [f64; 4],
    operating_cash_flow: [f64; 4],
    capex: [f64; 4],
    depreciation_amortization: [f64; 4],
}

const APPLE: SampleCompany = SampleCompany {
    name: "Apple Inc.",
    sector: "Technology",
    industry: "Consumer Electronics",
    current_price: 232.47,
    market_cap: 3_490_000.0 * MILLION,
    shares_outstanding: 15_115.8 * MILLION,
    beta: 1.24,
    years: [2024, 2023, 2022, 2021],
    revenue: [391_035.0, 383_285.0, 394_328.0, 365_817.0],
    operating_income: [123_216.0, 114_301.0, 119_437.0, 108_949.0],
    net_income: [93_736.0, 96_995.0, 99_803.0, 94_680.0],
    tax_provision: 29_749.0,
    interest_expense: 3_600.0,
    total_equity: [56_950.0, 62_146.0, 50_672.0, 63_090.0],
    total_debt: [96_796.0, 111_088.0, 120_069.0, 124_719.0],
    cash: [29_943.0, 29_965.0, 23_646.0, 34_940.0],
    operating_cash_flow: [118_254.0, 110_543.0, 122_151.0, 104_038.0],
    capex: [9_959.0, 11_059.0, 10_708.0, 11_085.0],
    depreciation_amortization: [11_445.0, 11_519.0, 11_104.0, 11_284.0],
};

const TEMPLATE: SampleCompany = SampleCompany {
    name: "Sample Corp",
    sector: "Technology",
    industry: "Software",
    current_price: 100.0,
    market_cap: 50_000.0 * MILLION,
    shares_outstanding: 500.0 * MILLION,
    beta: 1.1,
    years: [2024, 2023, 2022, 2021],
    revenue: [10_000.0, 9_200.0, 8_500.0, 7_800.0],
    operating_income: [2_500.0, 2_200.0, 2_000.0, 1_800.0],
    net_income: [2_000.0, 1_800.0, 1_600.0, 1_400.0],
    tax_provision: 500.0,
    interest_expense: 200.0,
    total_equity: [10_000.0, 8_500.0, 7_500.0, 6_500.0],
    total_debt: [5_000.0, 5_500.0, 6_000.0, 6_200.0],
    cash: [2_000.0, 1_800.0, 1_500.0, 1_200.0],
    operating_cash_flow: [2_800.0, 2_500.0, 2_200.0, 2_000.0],
    capex: [500.0, 450.0, 400.0, 380.0],
    depreciation_amortization: [500.0, 500.0, 500.0, 400.0],
};

impl SampleCompany {
    fn history(&self) -> Result<FinancialHistory, ValuationError> {
        let years = (0..self.years.len())
            .map(|i| FinancialYear {
                year: self.years[i],
                revenue: self.revenue[i] * MILLION,
                operating_income: self.operating_income[i] * MILLION,
                net_income: self.net_income[i] * MILLION,
                operating_cash_flow: self.operating_cash_flow[i] * MILLION,
                capex: self.capex[i].abs() * MILLION,
                depreciation_amortization: self.depreciation_amortization[i] * MILLION,
            })
            .collect();
        FinancialHistory::new(years)
    }

    fn balance_sheet(&self) -> BalanceSheetSnapshot {
        let pretax_income = self.net_income[0] + self.tax_provision;
        BalanceSheetSnapshot {
            total_debt: self.total_debt[0] * MILLION,
            cash: self.cash[0] * MILLION,
            total_equity: self.total_equity[0] * MILLION,
            interest_expense: self.interest_expense * MILLION,
            tax_rate: effective_tax_rate(self.tax_provision, pretax_income),
        }
    }

    fn balance_history(&self) -> Vec<BalanceSheetYear> {
        (0..self.years.len())
            .rev()
            .map(|i| BalanceSheetYear {
                year: self.years[i],
                total_debt: self.total_debt[i] * MILLION,
                cash: self.cash[i] * MILLION,
                total_equity: self.total_equity[i] * MILLION,
            })
            .collect()
    }

    fn market(&self) -> MarketData {
        MarketData {
            current_price: self.current_price,
            shares_outstanding: self.shares_outstanding,
            beta: self.beta,
            market_cap: self.market_cap,
        }
    }
}

/// Sample bundle for `ticker`. AAPL gets Apple's reported figures; any other
/// ticker gets the generic template under its own symbol.
pub fn sample_bundle(ticker: &str, equity_risk_premium: f64) -> Result<FinancialBundle, ValuationError> {
    let ticker = ticker.trim().to_uppercase();
    let (company, name) = if ticker == "AAPL" {
        (&APPLE, APPLE.name.to_string())
    } else {
        (&TEMPLATE, format!("{} ({})", ticker, TEMPLATE.name))
    };
    info!("Using sample data for {}", ticker);

    Ok(FinancialBundle {
        profile: CompanyProfile {
            ticker,
            name,
            sector: company.sector.to_string(),
            industry: company.industry.to_string(),
            currency: "USD".to_string(),
        },
        history: company.history()?,
        balance_sheet: company.balance_sheet(),
        balance_history: company.balance_history(),
        market: company.market(),
        rates: fallback_rates(equity_risk_premium),
        source: DataSource::Sample,
        fetched_at: Utc::now(),
    })
}
