// src/valuation/projection.rs
use serde::Serialize;

use super::error::{Result, ValuationError};
use super::scenario::ScenarioAssumptions;
use crate::models::FinancialHistory;

fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Baseline drivers derived once from the reported history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalMetrics {
    /// Year-over-year growth, one entry per consecutive pair of years.
    pub revenue_growths: Vec<f64>,
    pub operating_margins: Vec<f64>,
    pub avg_revenue_growth: f64,
    pub avg_operating_margin: f64,
    /// Most recent D&A / revenue.
    pub da_ratio: f64,
    /// Most recent CapEx / revenue.
    pub capex_ratio: f64,
    pub last_revenue: f64,
    pub last_year: i32,
}

impl HistoricalMetrics {
    pub fn from_history(history: &FinancialHistory) -> Result<Self> {
        let years = history.years();
        if years.len() < 2 {
            return Err(ValuationError::InsufficientHistory { years: years.len() });
        }

        let revenue_growths: Vec<f64> = years
            .windows(2)
            .map(|pair| pair[1].revenue / pair[0].revenue - 1.0)
            .collect();
        let operating_margins: Vec<f64> = years.iter().map(|y| y.operating_margin()).collect();

        let latest = history.latest();
        Ok(HistoricalMetrics {
            avg_revenue_growth: calculate_average(&revenue_growths),
            avg_operating_margin: calculate_average(&operating_margins),
            revenue_growths,
            operating_margins,
            da_ratio: latest.depreciation_amortization.abs() / latest.revenue,
            capex_ratio: latest.capex.abs() / latest.revenue,
            last_revenue: latest.revenue,
            last_year: latest.year,
        })
    }
}

/// The three rates that drive a projection, already adjusted for a scenario
/// or substituted by a sensitivity cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionDrivers {
    pub revenue_growth: f64,
    pub operating_margin: f64,
    pub wacc: f64,
}

impl ProjectionDrivers {
    pub fn for_scenario(metrics: &HistoricalMetrics, assumptions: &ScenarioAssumptions, base_wacc: f64) -> Self {
        ProjectionDrivers {
            revenue_growth: metrics.avg_revenue_growth + assumptions.revenue_growth_adjustment,
            operating_margin: metrics.avg_operating_margin + assumptions.margin_adjustment,
            wacc: base_wacc + assumptions.wacc_adjustment(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub year: i32,
    pub revenue: f64,
    pub ebit: f64,
    pub nopat: f64,
    pub depreciation_amortization: f64,
    pub capex: f64,
    pub fcf: f64,
    pub discount_factor: f64,
    pub present_value_of_fcf: f64,
}

/// Projects FCF for `years` periods from explicit drivers.
///
/// Revenue compounds at a constant rate from the last reported year; D&A and
/// CapEx keep their last reported ratio to revenue. The first projected year
/// is discounted one full period.
pub fn project_with(
    metrics: &HistoricalMetrics,
    drivers: ProjectionDrivers,
    tax_rate: f64,
    years: u32,
) -> Result<Vec<ProjectionRow>> {
    if years == 0 {
        return Err(ValuationError::InvalidAssumption(
            "projection horizon must be at least one year".to_string(),
        ));
    }
    if !(drivers.wacc > -1.0) {
        return Err(ValuationError::InvalidAssumption(format!(
            "discount rate {:.2}% leaves no positive discount factor",
            drivers.wacc * 100.0
        )));
    }

    let mut rows = Vec::with_capacity(years as usize);
    let mut revenue = metrics.last_revenue;
    for t in 0..years {
        revenue *= 1.0 + drivers.revenue_growth;
        let year = metrics.last_year + t as i32 + 1;
        if !(revenue > 0.0) {
            return Err(ValuationError::InvalidAssumption(format!(
                "projected revenue for {} is not positive ({:.0}) at {:.2}% growth",
                year,
                revenue,
                drivers.revenue_growth * 100.0
            )));
        }

        let ebit = revenue * drivers.operating_margin;
        let nopat = ebit * (1.0 - tax_rate);
        let depreciation_amortization = revenue * metrics.da_ratio;
        let capex = revenue * metrics.capex_ratio;
        let fcf = nopat + depreciation_amortization - capex;
        let discount_factor = 1.0 / (1.0 + drivers.wacc).powi(t as i32 + 1);

        rows.push(ProjectionRow {
            year,
            revenue,
            ebit,
            nopat,
            depreciation_amortization,
            capex,
            fcf,
            discount_factor,
            present_value_of_fcf: fcf * discount_factor,
        });
    }

    Ok(rows)
}

/// A scenario's projection together with the drivers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub drivers: ProjectionDrivers,
    pub rows: Vec<ProjectionRow>,
}

pub fn project(
    history: &FinancialHistory,
    assumptions: &ScenarioAssumptions,
    base_wacc: f64,
    tax_rate: f64,
    years: u32,
) -> Result<Projection> {
    let metrics = HistoricalMetrics::from_history(history)?;
    project_from_metrics(&metrics, assumptions, base_wacc, tax_rate, years)
}

pub fn project_from_metrics(
    metrics: &HistoricalMetrics,
    assumptions: &ScenarioAssumptions,
    base_wacc: f64,
    tax_rate: f64,
    years: u32,
) -> Result<Projection> {
    let drivers = ProjectionDrivers::for_scenario(metrics, assumptions, base_wacc);
    let rows = project_with(metrics, drivers, tax_rate, years)?;
    Ok(Projection { drivers, rows })
}
