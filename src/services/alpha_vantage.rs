// src/services/alpha_vantage.rs
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::fetcher::effective_tax_rate;
use crate::models::{
    BalanceSheetSnapshot, BalanceSheetYear, CompanyProfile, FinancialHistory, FinancialYear, MarketData,
};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Annual reports kept for the history, most recent first.
pub const MAX_HISTORY_YEARS: usize = 4;

/// Alpha Vantage sends every number as a string and "None" when absent.
fn optional_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("None") | Some("-") => Ok(None),
        Some(s) => s.parse::<f64>().map(Some).map_err(de::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Overview {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default, deserialize_with = "optional_f64")]
    pub beta: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub shares_outstanding: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub market_capitalization: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalQuote {
    #[serde(rename = "05. price", default, deserialize_with = "optional_f64")]
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: GlobalQuote,
}

#[derive(Debug, Deserialize)]
struct AnnualReports<T> {
    #[serde(rename = "annualReports")]
    annual_reports: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeReport {
    pub fiscal_date_ending: String,
    #[serde(default, deserialize_with = "optional_f64")]
    pub total_revenue: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub operating_income: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub net_income: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub income_before_tax: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub income_tax_expense: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub interest_expense: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub depreciation_and_amortization: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReport {
    pub fiscal_date_ending: String,
    #[serde(default, deserialize_with = "optional_f64")]
    pub short_long_term_debt_total: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub long_term_debt: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub short_term_debt: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub cash_and_cash_equivalents_at_carrying_value: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub total_shareholder_equity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowReport {
    pub fiscal_date_ending: String,
    #[serde(default, deserialize_with = "optional_f64")]
    pub operating_cashflow: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub capital_expenditures: Option<f64>,
    #[serde(default, deserialize_with = "optional_f64")]
    pub depreciation_depletion_and_amortization: Option<f64>,
}

/// Raw responses for one ticker, before normalization.
#[derive(Debug, Clone)]
pub struct CompanyFundamentals {
    pub overview: Overview,
    pub quote: GlobalQuote,
    pub income: Vec<IncomeReport>,
    pub balance: Vec<BalanceReport>,
    pub cash_flow: Vec<CashFlowReport>,
}

#[derive(Debug, Clone)]
pub struct NormalizedCompany {
    pub profile: CompanyProfile,
    pub history: FinancialHistory,
    pub balance_sheet: BalanceSheetSnapshot,
    pub balance_history: Vec<BalanceSheetYear>,
    pub market: MarketData,
}

/// Alpha Vantage answers throttling and bad symbols with HTTP 200 and a
/// message body instead of data.
pub fn check_api_message(body: &Value) -> Result<()> {
    for key in ["Error Message", "Note", "Information"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return Err(anyhow!("Alpha Vantage {}: {}", key, msg));
        }
    }
    if body.as_object().map_or(false, |o| o.is_empty()) {
        return Err(anyhow!("Alpha Vantage returned an empty response"));
    }
    Ok(())
}

pub fn parse_response<T: DeserializeOwned>(body: Value, function: &str) -> Result<T> {
    check_api_message(&body)?;
    serde_json::from_value(body).with_context(|| format!("Unexpected {} payload", function))
}

fn fiscal_year(fiscal_date_ending: &str) -> Option<i32> {
    fiscal_date_ending.get(0..4).and_then(|y| y.parse().ok())
}

/// Joins income and cash-flow reports by fiscal date. Years missing revenue,
/// operating income or cash flow figures are skipped.
pub fn normalize_history(income: &[IncomeReport], cash_flow: &[CashFlowReport]) -> Result<FinancialHistory> {
    let mut years = Vec::new();
    for report in income {
        if years.len() == MAX_HISTORY_YEARS {
            break;
        }
        let Some(year) = fiscal_year(&report.fiscal_date_ending) else {
            warn!("Skipping report with fiscal date {:?}", report.fiscal_date_ending);
            continue;
        };
        let Some(cf) = cash_flow
            .iter()
            .find(|c| c.fiscal_date_ending == report.fiscal_date_ending)
        else {
            warn!("No cash flow statement for fiscal {}, skipping", year);
            continue;
        };

        let (Some(revenue), Some(operating_income), Some(operating_cash_flow), Some(capex)) = (
            report.total_revenue,
            report.operating_income,
            cf.operating_cashflow,
            cf.capital_expenditures,
        ) else {
            warn!("Incomplete figures for fiscal {}, skipping", year);
            continue;
        };

        let depreciation_amortization = cf
            .depreciation_depletion_and_amortization
            .or(report.depreciation_and_amortization)
            .unwrap_or(0.0);

        years.push(FinancialYear {
            year,
            revenue,
            operating_income,
            net_income: report.net_income.unwrap_or(0.0),
            operating_cash_flow,
            capex: capex.abs(),
            depreciation_amortization,
        });
    }
    debug!("Normalized {} fiscal years", years.len());
    Ok(FinancialHistory::new(years)?)
}

/// Falls back to long + short term debt when the total is not reported.
fn reported_total_debt(report: &BalanceReport) -> f64 {
    report
        .short_long_term_debt_total
        .or_else(|| match (report.long_term_debt, report.short_term_debt) {
            (None, None) => None,
            (long, short) => Some(long.unwrap_or(0.0) + short.unwrap_or(0.0)),
        })
        .unwrap_or(0.0)
}

pub fn normalize_balance_sheet(income: &[IncomeReport], balance: &[BalanceReport]) -> Result<BalanceSheetSnapshot> {
    let latest_income = income.first().ok_or_else(|| anyhow!("No income statements returned"))?;
    let latest = balance.first().ok_or_else(|| anyhow!("No balance sheets returned"))?;

    let total_debt = reported_total_debt(latest);

    let tax_rate = match (latest_income.income_tax_expense, latest_income.income_before_tax) {
        (Some(tax), Some(pretax)) => effective_tax_rate(tax, pretax),
        _ => effective_tax_rate(0.0, 0.0),
    };

    Ok(BalanceSheetSnapshot {
        total_debt,
        cash: latest.cash_and_cash_equivalents_at_carrying_value.unwrap_or(0.0),
        total_equity: latest.total_shareholder_equity.unwrap_or(0.0),
        interest_expense: latest_income.interest_expense.unwrap_or(0.0).abs(),
        tax_rate,
    })
}

/// Up to four fiscal year ends, oldest first.
pub fn normalize_balance_history(balance: &[BalanceReport]) -> Vec<BalanceSheetYear> {
    let mut years: Vec<BalanceSheetYear> = balance
        .iter()
        .filter_map(|report| {
            let year = fiscal_year(&report.fiscal_date_ending)?;
            Some(BalanceSheetYear {
                year,
                total_debt: reported_total_debt(report),
                cash: report.cash_and_cash_equivalents_at_carrying_value.unwrap_or(0.0),
                total_equity: report.total_shareholder_equity.unwrap_or(0.0),
            })
        })
        .take(MAX_HISTORY_YEARS)
        .collect();
    years.sort_by_key(|y| y.year);
    years
}

pub fn normalize_market(overview: &Overview, quote: &GlobalQuote) -> Result<MarketData> {
    let current_price = quote.price.ok_or_else(|| anyhow!("Quote has no price for {}", overview.symbol))?;
    let shares_outstanding = overview
        .shares_outstanding
        .ok_or_else(|| anyhow!("Overview has no share count for {}", overview.symbol))?;
    Ok(MarketData {
        current_price,
        shares_outstanding,
        beta: overview.beta.unwrap_or(1.0),
        market_cap: overview.market_capitalization.unwrap_or(0.0),
    })
}

impl CompanyFundamentals {
    pub fn profile(&self) -> CompanyProfile {
        let currency = if self.overview.currency.is_empty() {
            "USD".to_string()
        } else {
            self.overview.currency.clone()
        };
        CompanyProfile {
            ticker: self.overview.symbol.to_uppercase(),
            name: self.overview.name.clone(),
            sector: self.overview.sector.clone(),
            industry: self.overview.industry.clone(),
            currency,
        }
    }

    pub fn normalize(&self) -> Result<NormalizedCompany> {
        Ok(NormalizedCompany {
            profile: self.profile(),
            history: normalize_history(&self.income, &self.cash_flow)?,
            balance_sheet: normalize_balance_sheet(&self.income, &self.balance)?,
            balance_history: normalize_balance_history(&self.balance),
            market: normalize_market(&self.overview, &self.quote)?,
        })
    }
}

pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        AlphaVantageClient {
            client,
            api_key: api_key.into(),
        }
    }

    async fn query(&self, function: &str, ticker: &str) -> Result<Value> {
        info!("Fetching Alpha Vantage {} for {}", function, ticker);
        let body = self
            .client
            .get(BASE_URL)
            .query(&[("function", function), ("symbol", ticker), ("apikey", &self.api_key)])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    pub async fn fetch_fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals> {
        let overview: Overview = parse_response(self.query("OVERVIEW", ticker).await?, "OVERVIEW")?;
        let quote: GlobalQuoteResponse = parse_response(self.query("GLOBAL_QUOTE", ticker).await?, "GLOBAL_QUOTE")?;
        let income: AnnualReports<IncomeReport> =
            parse_response(self.query("INCOME_STATEMENT", ticker).await?, "INCOME_STATEMENT")?;
        let balance: AnnualReports<BalanceReport> =
            parse_response(self.query("BALANCE_SHEET", ticker).await?, "BALANCE_SHEET")?;
        let cash_flow: AnnualReports<CashFlowReport> =
            parse_response(self.query("CASH_FLOW", ticker).await?, "CASH_FLOW")?;

        Ok(CompanyFundamentals {
            overview,
            quote: quote.quote,
            income: income.annual_reports,
            balance: balance.annual_reports,
            cash_flow: cash_flow.annual_reports,
        })
    }
}
