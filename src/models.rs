// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::valuation::ValuationError;

/// One fiscal year of reported figures, in the company's reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialYear {
    pub year: i32,
    pub revenue: f64,
    pub operating_income: f64,
    pub net_income: f64,
    pub operating_cash_flow: f64,
    /// Capital expenditure as a positive outflow magnitude.
    pub capex: f64,
    pub depreciation_amortization: f64,
}

impl FinancialYear {
    /// Operating cash flow less capital expenditure.
    pub fn free_cash_flow(&self) -> f64 {
        self.operating_cash_flow - self.capex.abs()
    }

    pub fn operating_margin(&self) -> f64 {
        self.operating_income / self.revenue
    }
}

/// Validated yearly history, ordered oldest to newest.
///
/// Construction rejects fewer than two years and any non-positive revenue, so
/// every `FinancialHistory` in the program can yield at least one growth rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FinancialYear>", into = "Vec<FinancialYear>")]
pub struct FinancialHistory {
    years: Vec<FinancialYear>,
}

impl FinancialHistory {
    pub fn new(mut years: Vec<FinancialYear>) -> Result<Self, ValuationError> {
        if years.len() < 2 {
            return Err(ValuationError::InsufficientHistory { years: years.len() });
        }
        if let Some(bad) = years.iter().find(|y| y.revenue <= 0.0 || y.revenue.is_nan()) {
            return Err(ValuationError::InvalidAssumption(format!(
                "revenue for {} must be positive, got {}",
                bad.year, bad.revenue
            )));
        }
        years.sort_by_key(|y| y.year);
        Ok(Self { years })
    }

    pub fn years(&self) -> &[FinancialYear] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn latest(&self) -> &FinancialYear {
        // Non-empty by construction.
        &self.years[self.years.len() - 1]
    }
}

impl TryFrom<Vec<FinancialYear>> for FinancialHistory {
    type Error = ValuationError;

    fn try_from(years: Vec<FinancialYear>) -> Result<Self, Self::Error> {
        Self::new(years)
    }
}

impl From<FinancialHistory> for Vec<FinancialYear> {
    fn from(history: FinancialHistory) -> Self {
        history.years
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetSnapshot {
    pub total_debt: f64,
    pub cash: f64,
    pub total_equity: f64,
    pub interest_expense: f64,
    /// Effective tax rate as a decimal (0.21 = 21%).
    pub tax_rate: f64,
}

impl BalanceSheetSnapshot {
    pub fn net_debt(&self) -> f64 {
        self.total_debt - self.cash
    }
}

/// Reported capital structure at one fiscal year end. Display only; the
/// valuation reads the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetYear {
    pub year: i32,
    pub total_debt: f64,
    pub cash: f64,
    pub total_equity: f64,
}

impl BalanceSheetYear {
    pub fn net_debt(&self) -> f64 {
        self.total_debt - self.cash
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub current_price: f64,
    pub shares_outstanding: f64,
    pub beta: f64,
    pub market_cap: f64,
}

impl MarketData {
    /// Market value of equity: reported market cap, or price times shares when
    /// the provider left it blank.
    pub fn equity_value(&self) -> f64 {
        if self.market_cap > 0.0 {
            self.market_cap
        } else {
            self.current_price * self.shares_outstanding
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    Fred,
    TreasuryCsv,
    Fallback,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RateSource::Fred => write!(f, "FRED"),
            RateSource::TreasuryCsv => write!(f, "US Treasury"),
            RateSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEnvironment {
    /// 10-year treasury yield as a decimal.
    pub risk_free_rate: f64,
    pub equity_risk_premium: f64,
    pub treasury_2y: Option<f64>,
    pub source: RateSource,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Live,
    Sample,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataSource::Live => write!(f, "live"),
            DataSource::Sample => write!(f, "sample"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub currency: String,
}

/// Everything the valuation needs about one company, whatever its origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialBundle {
    pub profile: CompanyProfile,
    pub history: FinancialHistory,
    pub balance_sheet: BalanceSheetSnapshot,
    /// Oldest first; may be empty when the provider returned no history.
    #[serde(default)]
    pub balance_history: Vec<BalanceSheetYear>,
    pub market: MarketData,
    pub rates: RateEnvironment,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year(year: i32, revenue: f64) -> FinancialYear {
        FinancialYear {
            year,
            revenue,
            operating_income: revenue * 0.2,
            net_income: revenue * 0.15,
            operating_cash_flow: revenue * 0.25,
            capex: revenue * 0.05,
            depreciation_amortization: revenue * 0.04,
        }
    }

    #[test]
    fn history_is_sorted_oldest_first() {
        let history =
            FinancialHistory::new(vec![year(2024, 120.0), year(2022, 100.0), year(2023, 110.0)])
                .unwrap();
        let years: Vec<i32> = history.years().iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2022, 2023, 2024]);
        assert_eq!(history.latest().year, 2024);
    }

    #[test]
    fn single_year_is_rejected() {
        let err = FinancialHistory::new(vec![year(2024, 100.0)]).unwrap_err();
        assert_eq!(err, ValuationError::InsufficientHistory { years: 1 });
    }

    #[test]
    fn zero_revenue_is_rejected() {
        let err = FinancialHistory::new(vec![year(2023, 100.0), year(2024, 0.0)]).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidAssumption(_)));
    }

    #[test]
    fn deserialization_goes_through_validation() {
        let json = serde_json::to_string(&vec![year(2024, 100.0)]).unwrap();
        assert!(serde_json::from_str::<FinancialHistory>(&json).is_err());
    }

    #[test]
    fn equity_value_falls_back_to_price_times_shares() {
        let market = MarketData {
            current_price: 50.0,
            shares_outstanding: 10.0,
            beta: 1.0,
            market_cap: 0.0,
        };
        assert_eq!(market.equity_value(), 500.0);
    }
}
