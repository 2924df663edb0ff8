// src/valuation/wacc.rs
use log::warn;
use serde::Serialize;

use super::error::{Result, ValuationError};
use crate::models::{BalanceSheetSnapshot, MarketData, RateEnvironment};

/// Spread over the risk-free rate used as the cost of debt when a company
/// reports no debt, so the interest/debt ratio is never evaluated at zero.
pub const DEFAULT_DEBT_SPREAD: f64 = 0.015;

/// Conventional WACC range; values outside it are logged, not rejected.
pub const WACC_SANITY_BOUNDS: (f64, f64) = (0.02, 0.30);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaccResult {
    pub cost_of_equity: f64,
    pub cost_of_debt: f64,
    pub after_tax_cost_of_debt: f64,
    pub equity_weight: f64,
    pub debt_weight: f64,
    pub wacc: f64,
    // Inputs, carried for display.
    pub risk_free_rate: f64,
    pub beta: f64,
    pub equity_risk_premium: f64,
    pub tax_rate: f64,
    pub equity_value: f64,
    pub debt_value: f64,
    pub cost_of_debt_is_fallback: bool,
}

impl WaccResult {
    pub fn within_sanity_bounds(&self) -> bool {
        let (low, high) = WACC_SANITY_BOUNDS;
        self.wacc >= low && self.wacc <= high
    }
}

/// CAPM cost of equity: `Rf + beta * ERP`.
pub fn cost_of_equity(risk_free_rate: f64, beta: f64, equity_risk_premium: f64) -> f64 {
    risk_free_rate + beta * equity_risk_premium
}

/// Implied cost of debt, or `Rf + DEFAULT_DEBT_SPREAD` for a debt-free balance sheet.
/// The flag is true when the fallback was used.
pub fn cost_of_debt(balance_sheet: &BalanceSheetSnapshot, risk_free_rate: f64) -> (f64, bool) {
    if balance_sheet.total_debt > 0.0 {
        (balance_sheet.interest_expense.abs() / balance_sheet.total_debt, false)
    } else {
        (risk_free_rate + DEFAULT_DEBT_SPREAD, true)
    }
}

pub fn compute_wacc(
    market: &MarketData,
    balance_sheet: &BalanceSheetSnapshot,
    rates: &RateEnvironment,
) -> Result<WaccResult> {
    let re = cost_of_equity(rates.risk_free_rate, market.beta, rates.equity_risk_premium);
    let (rd, cost_of_debt_is_fallback) = cost_of_debt(balance_sheet, rates.risk_free_rate);

    let equity_value = market.equity_value();
    let debt_value = balance_sheet.total_debt.max(0.0);
    let total_capital = equity_value + debt_value;
    if !(total_capital > 0.0) {
        return Err(ValuationError::InsufficientData(format!(
            "equity ({}) plus debt ({}) must be positive to weight the capital structure",
            equity_value, debt_value
        )));
    }

    let equity_weight = equity_value / total_capital;
    let debt_weight = debt_value / total_capital;
    let after_tax_cost_of_debt = rd * (1.0 - balance_sheet.tax_rate);
    let wacc = equity_weight * re + debt_weight * after_tax_cost_of_debt;

    let result = WaccResult {
        cost_of_equity: re,
        cost_of_debt: rd,
        after_tax_cost_of_debt,
        equity_weight,
        debt_weight,
        wacc,
        risk_free_rate: rates.risk_free_rate,
        beta: market.beta,
        equity_risk_premium: rates.equity_risk_premium,
        tax_rate: balance_sheet.tax_rate,
        equity_value,
        debt_value,
        cost_of_debt_is_fallback,
    };

    if !result.within_sanity_bounds() {
        warn!(
            "WACC {:.2}% is outside the conventional {:.0}%-{:.0}% range (Re {:.2}%, Rd {:.2}%, wE {:.2})",
            wacc * 100.0,
            WACC_SANITY_BOUNDS.0 * 100.0,
            WACC_SANITY_BOUNDS.1 * 100.0,
            re * 100.0,
            rd * 100.0,
            equity_weight
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateSource;

    fn rates() -> RateEnvironment {
        RateEnvironment {
            risk_free_rate: 0.0435,
            equity_risk_premium: 0.055,
            treasury_2y: None,
            source: RateSource::Fallback,
            as_of: None,
        }
    }

    fn apple_market() -> MarketData {
        MarketData {
            current_price: 232.47,
            shares_outstanding: 15_115_800_000.0,
            beta: 1.24,
            market_cap: 3_490_000_000_000.0,
        }
    }

    fn apple_balance_sheet() -> BalanceSheetSnapshot {
        BalanceSheetSnapshot {
            total_debt: 96_796_000_000.0,
            cash: 29_943_000_000.0,
            total_equity: 56_950_000_000.0,
            interest_expense: 3_600_000_000.0,
            tax_rate: 29_749.0 / (93_736.0 + 29_749.0),
        }
    }

    #[test]
    fn apple_sample_lands_near_eleven_percent() {
        let result = compute_wacc(&apple_market(), &apple_balance_sheet(), &rates()).unwrap();
        assert!((result.cost_of_equity - 0.1117).abs() < 1e-9);
        assert!((result.wacc - 0.1094).abs() < 5e-4, "wacc was {}", result.wacc);
        assert!((result.equity_weight + result.debt_weight - 1.0).abs() < 1e-12);
        assert!(result.within_sanity_bounds());
        assert!(!result.cost_of_debt_is_fallback);
    }

    #[test]
    fn zero_debt_uses_spread_over_risk_free() {
        let mut balance_sheet = apple_balance_sheet();
        balance_sheet.total_debt = 0.0;
        let result = compute_wacc(&apple_market(), &balance_sheet, &rates()).unwrap();
        assert!(result.cost_of_debt_is_fallback);
        assert!((result.cost_of_debt - (0.0435 + DEFAULT_DEBT_SPREAD)).abs() < 1e-12);
        assert_eq!(result.debt_weight, 0.0);
        assert!((result.wacc - result.cost_of_equity).abs() < 1e-12);
        assert!(result.wacc.is_finite());
    }

    #[test]
    fn empty_capital_structure_is_insufficient_data() {
        let market = MarketData {
            current_price: 0.0,
            shares_outstanding: 0.0,
            beta: 1.0,
            market_cap: 0.0,
        };
        let mut balance_sheet = apple_balance_sheet();
        balance_sheet.total_debt = 0.0;
        let err = compute_wacc(&market, &balance_sheet, &rates()).unwrap_err();
        assert!(matches!(err, ValuationError::InsufficientData(_)));
    }

    #[test]
    fn market_cap_falls_back_to_price_times_shares() {
        let mut market = apple_market();
        market.market_cap = 0.0;
        let result = compute_wacc(&market, &apple_balance_sheet(), &rates()).unwrap();
        assert!((result.equity_value - 232.47 * 15_115_800_000.0).abs() < 1.0);
    }
}
