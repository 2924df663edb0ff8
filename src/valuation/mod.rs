// src/valuation/mod.rs
//! DCF engine: WACC, per-scenario projection, terminal value, equity bridge and
//! sensitivity grids. Everything here is a pure function of its arguments.

pub mod bridge;
pub mod error;
pub mod projection;
pub mod scenario;
pub mod sensitivity;
pub mod wacc;

use log::{debug, info};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

pub use bridge::{build_valuation, BridgeInputs, EquityBridge};
pub use error::{Result, ValuationError};
pub use projection::{HistoricalMetrics, ProjectionDrivers, ProjectionRow};
pub use scenario::{Scenario, ScenarioAssumptions};
pub use sensitivity::{BaseCase, SensitivityGrid};
pub use wacc::{compute_wacc, WaccResult};

use crate::config::ValuationConfig;
use crate::models::{BalanceSheetSnapshot, FinancialBundle, FinancialHistory, MarketData, RateEnvironment};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationResult {
    pub scenario: Scenario,
    pub assumptions: ScenarioAssumptions,
    /// Effective growth, margin and WACC after scenario offsets.
    pub drivers: ProjectionDrivers,
    #[serde(flatten)]
    pub bridge: EquityBridge,
    pub projection_rows: Vec<ProjectionRow>,
}

impl ValuationResult {
    pub fn implied_share_price(&self) -> f64 {
        self.bridge.implied_share_price
    }

    pub fn upside_downside_percent(&self) -> f64 {
        self.bridge.upside_downside_percent
    }
}

/// Exactly one result per `Scenario`, stored in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    results: Vec<ValuationResult>,
}

impl ScenarioSet {
    fn build<F>(mut value: F) -> Result<Self>
    where
        F: FnMut(Scenario) -> Result<ValuationResult>,
    {
        let results = Scenario::ALL
            .iter()
            .map(|&scenario| value(scenario).map_err(|e| e.in_scenario(scenario)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ScenarioSet { results })
    }

    pub fn get(&self, scenario: Scenario) -> &ValuationResult {
        // Indexed by declaration order, filled from Scenario::ALL.
        &self.results[scenario as usize]
    }

    pub fn base(&self) -> &ValuationResult {
        self.get(Scenario::Base)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValuationResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Serialize for ScenarioSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(&result.scenario, result)?;
        }
        map.end()
    }
}

/// Everything the report layer needs; no further computation required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationOutput {
    pub wacc: WaccResult,
    pub metrics: HistoricalMetrics,
    pub base_case: BaseCase,
    pub scenarios: ScenarioSet,
    pub wacc_tgr_grid: SensitivityGrid,
    pub growth_margin_grid: SensitivityGrid,
    pub projection_years: u32,
    pub terminal_growth: f64,
}

fn value_scenario(
    scenario: Scenario,
    metrics: &HistoricalMetrics,
    base_wacc: f64,
    tax_rate: f64,
    inputs: &BridgeInputs,
    config: &ValuationConfig,
) -> Result<ValuationResult> {
    let assumptions = scenario.assumptions();
    let projection =
        projection::project_from_metrics(metrics, &assumptions, base_wacc, tax_rate, config.projection_years)?;
    let terminal_growth = assumptions.terminal_growth(config.terminal_growth);
    let bridge = build_valuation(&projection.rows, projection.drivers.wacc, terminal_growth, inputs)?;

    debug!(
        "{}: growth {:.2}%, margin {:.2}%, WACC {:.2}%, g {:.2}% -> {:.2}/share",
        scenario,
        projection.drivers.revenue_growth * 100.0,
        projection.drivers.operating_margin * 100.0,
        projection.drivers.wacc * 100.0,
        terminal_growth * 100.0,
        bridge.implied_share_price
    );

    Ok(ValuationResult {
        scenario,
        assumptions,
        drivers: projection.drivers,
        bridge,
        projection_rows: projection.rows,
    })
}

/// Runs all five scenarios and both sensitivity grids. The configured
/// equity risk premium replaces the one carried by `rates`.
pub fn run_valuation(
    history: &FinancialHistory,
    balance_sheet: &BalanceSheetSnapshot,
    market: &MarketData,
    rates: &RateEnvironment,
    config: &ValuationConfig,
) -> Result<ValuationOutput> {
    config.validate()?;

    let rates = RateEnvironment {
        equity_risk_premium: config.equity_risk_premium,
        ..rates.clone()
    };
    let wacc = compute_wacc(market, balance_sheet, &rates)?;
    config.validate_against_wacc(wacc.wacc)?;
    info!(
        "Base WACC {:.2}% (Re {:.2}%, Rd {:.2}%, E/V {:.1}%)",
        wacc.wacc * 100.0,
        wacc.cost_of_equity * 100.0,
        wacc.cost_of_debt * 100.0,
        wacc.equity_weight * 100.0
    );

    let metrics = HistoricalMetrics::from_history(history)?;
    let inputs = BridgeInputs::new(balance_sheet, market);
    let tax_rate = balance_sheet.tax_rate;

    let scenarios = ScenarioSet::build(|scenario| {
        value_scenario(scenario, &metrics, wacc.wacc, tax_rate, &inputs, config)
    })?;

    let base = scenarios.base();
    let base_case = BaseCase {
        metrics: metrics.clone(),
        drivers: base.drivers,
        terminal_growth: base.bridge.terminal_growth_rate,
        tax_rate,
        projection_years: config.projection_years,
        bridge_inputs: inputs,
    };

    let s = &config.sensitivity;
    let wacc_axis = sensitivity::centered_axis(base_case.drivers.wacc, s.wacc_step, s.wacc_points)?;
    let tgr_axis = sensitivity::centered_axis(base_case.terminal_growth, s.tgr_step, s.tgr_points)?;
    let growth_axis =
        sensitivity::centered_axis(base_case.drivers.revenue_growth, s.growth_step, s.growth_points)?;
    let margin_axis =
        sensitivity::centered_axis(base_case.drivers.operating_margin, s.margin_step, s.margin_points)?;

    let wacc_tgr_grid = sensitivity::build_wacc_tgr_grid(&base_case, &wacc_axis, &tgr_axis)?;
    let growth_margin_grid = sensitivity::build_growth_margin_grid(&base_case, &growth_axis, &margin_axis)?;
    info!(
        "Sensitivity grids built ({} and {} invalid cells)",
        wacc_tgr_grid.invalid_cells(),
        growth_margin_grid.invalid_cells()
    );

    Ok(ValuationOutput {
        wacc,
        metrics,
        base_case,
        scenarios,
        wacc_tgr_grid,
        growth_margin_grid,
        projection_years: config.projection_years,
        terminal_growth: config.terminal_growth,
    })
}

/// `run_valuation` over a fetched bundle.
pub fn value_bundle(bundle: &FinancialBundle, config: &ValuationConfig) -> Result<ValuationOutput> {
    run_valuation(
        &bundle.history,
        &bundle.balance_sheet,
        &bundle.market,
        &bundle.rates,
        config,
    )
}
