// src/valuation/bridge.rs
use serde::Serialize;

use super::error::{Result, ValuationError};
use super::projection::ProjectionRow;
use crate::models::{BalanceSheetSnapshot, MarketData};

/// Per-company figures that turn enterprise value into a share price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BridgeInputs {
    pub net_debt: f64,
    pub shares_outstanding: f64,
    pub current_price: f64,
}

impl BridgeInputs {
    pub fn new(balance_sheet: &BalanceSheetSnapshot, market: &MarketData) -> Self {
        BridgeInputs {
            net_debt: balance_sheet.net_debt(),
            shares_outstanding: market.shares_outstanding,
            current_price: market.current_price,
        }
    }
}

/// Terminal value and the walk from enterprise value to a share price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityBridge {
    pub wacc: f64,
    pub terminal_growth_rate: f64,
    pub sum_pv_fcf: f64,
    pub terminal_value: f64,
    pub present_value_of_terminal_value: f64,
    pub enterprise_value: f64,
    pub net_debt: f64,
    pub equity_value: f64,
    pub implied_share_price: f64,
    /// `(implied - current) / current`, as a decimal.
    pub upside_downside_percent: f64,
}

impl EquityBridge {
    /// Share of enterprise value that comes from beyond the explicit horizon.
    pub fn terminal_value_share(&self) -> f64 {
        if self.enterprise_value == 0.0 {
            0.0
        } else {
            self.present_value_of_terminal_value / self.enterprise_value
        }
    }
}

/// Gordon growth value of the cash flows after `last_fcf`.
pub fn terminal_value(last_fcf: f64, wacc: f64, terminal_growth_rate: f64) -> Result<f64> {
    if !(wacc > terminal_growth_rate) {
        return Err(ValuationError::InvalidAssumption(format!(
            "WACC {:.2}% must exceed terminal growth {:.2}%",
            wacc * 100.0,
            terminal_growth_rate * 100.0
        )));
    }
    Ok(last_fcf * (1.0 + terminal_growth_rate) / (wacc - terminal_growth_rate))
}

pub fn build_valuation(
    rows: &[ProjectionRow],
    wacc: f64,
    terminal_growth_rate: f64,
    inputs: &BridgeInputs,
) -> Result<EquityBridge> {
    let last = rows.last().ok_or_else(|| {
        ValuationError::InvalidAssumption("no projected cash flows to value".to_string())
    })?;
    if !(inputs.shares_outstanding > 0.0) {
        return Err(ValuationError::InsufficientData(format!(
            "shares outstanding must be positive, got {}",
            inputs.shares_outstanding
        )));
    }
    if !(inputs.current_price > 0.0) {
        return Err(ValuationError::InsufficientData(format!(
            "current price must be positive, got {}",
            inputs.current_price
        )));
    }

    let terminal_value = terminal_value(last.fcf, wacc, terminal_growth_rate)?;
    let present_value_of_terminal_value = terminal_value / (1.0 + wacc).powi(rows.len() as i32);
    let sum_pv_fcf: f64 = rows.iter().map(|row| row.present_value_of_fcf).sum();

    let enterprise_value = sum_pv_fcf + present_value_of_terminal_value;
    let equity_value = enterprise_value - inputs.net_debt;
    let implied_share_price = equity_value / inputs.shares_outstanding;
    let upside_downside_percent = (implied_share_price - inputs.current_price) / inputs.current_price;

    Ok(EquityBridge {
        wacc,
        terminal_growth_rate,
        sum_pv_fcf,
        terminal_value,
        present_value_of_terminal_value,
        enterprise_value,
        net_debt: inputs.net_debt,
        equity_value,
        implied_share_price,
        upside_downside_percent,
    })
}
