// src/valuation/sensitivity.rs
use serde::Serialize;

use super::bridge::{build_valuation, BridgeInputs};
use super::error::{Result, ValuationError};
use super::projection::{project_with, HistoricalMetrics, ProjectionDrivers};

/// Anchors for the sensitivity grids: the base-case drivers plus everything a
/// cell needs to re-run projection and bridge on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseCase {
    pub metrics: HistoricalMetrics,
    pub drivers: ProjectionDrivers,
    pub terminal_growth: f64,
    pub tax_rate: f64,
    pub projection_years: u32,
    pub bridge_inputs: BridgeInputs,
}

impl BaseCase {
    /// Implied share price for one set of drivers.
    pub fn price_at(&self, drivers: ProjectionDrivers, terminal_growth: f64) -> Result<f64> {
        let rows = project_with(&self.metrics, drivers, self.tax_rate, self.projection_years)?;
        let bridge = build_valuation(&rows, drivers.wacc, terminal_growth, &self.bridge_inputs)?;
        Ok(bridge.implied_share_price)
    }

    /// Like `price_at`, but an invalid combination (e.g. WACC at or below
    /// terminal growth) yields `None` instead of failing.
    pub fn cell(&self, drivers: ProjectionDrivers, terminal_growth: f64) -> Result<Option<f64>> {
        match self.price_at(drivers, terminal_growth) {
            Ok(price) => Ok(Some(price)),
            Err(e) if e.is_invalid_assumption() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn wacc_tgr_cell(&self, wacc: f64, terminal_growth: f64) -> Result<Option<f64>> {
        let drivers = ProjectionDrivers { wacc, ..self.drivers };
        self.cell(drivers, terminal_growth)
    }

    pub fn growth_margin_cell(&self, revenue_growth: f64, operating_margin: f64) -> Result<Option<f64>> {
        let drivers = ProjectionDrivers {
            revenue_growth,
            operating_margin,
            ..self.drivers
        };
        self.cell(drivers, self.terminal_growth)
    }
}

/// `points` evenly spaced values, `step` apart, with `center` exactly in the
/// middle position.
pub fn centered_axis(center: f64, step: f64, points: usize) -> Result<Vec<f64>> {
    if points == 0 || points % 2 == 0 {
        return Err(ValuationError::InvalidAssumption(format!(
            "a centered axis needs an odd number of points, got {}",
            points
        )));
    }
    if !(step > 0.0) {
        return Err(ValuationError::InvalidAssumption(format!(
            "axis step must be positive, got {}",
            step
        )));
    }
    let half = (points / 2) as f64;
    Ok((0..points).map(|i| center + (i as f64 - half) * step).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GridKind {
    WaccTerminalGrowth,
    GrowthMargin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: &'static str,
    pub values: Vec<f64>,
}

/// Implied share price over the cross product of two axes.
/// `cells[i][j]` belongs to `rows.values[i]` and `columns.values[j]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityGrid {
    pub kind: GridKind,
    pub rows: Axis,
    pub columns: Axis,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl SensitivityGrid {
    pub fn value_at(&self, row: usize, column: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    pub fn invalid_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_none()).count()
    }

    fn build<F>(kind: GridKind, rows: Axis, columns: Axis, cell: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> Result<Option<f64>>,
    {
        let cells = rows
            .values
            .iter()
            .map(|&r| columns.values.iter().map(|&c| cell(r, c)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(SensitivityGrid {
            kind,
            rows,
            columns,
            cells,
        })
    }
}

pub fn build_wacc_tgr_grid(base: &BaseCase, wacc_axis: &[f64], tgr_axis: &[f64]) -> Result<SensitivityGrid> {
    SensitivityGrid::build(
        GridKind::WaccTerminalGrowth,
        Axis {
            label: "WACC",
            values: wacc_axis.to_vec(),
        },
        Axis {
            label: "Terminal Growth",
            values: tgr_axis.to_vec(),
        },
        |wacc, tgr| base.wacc_tgr_cell(wacc, tgr),
    )
}

pub fn build_growth_margin_grid(
    base: &BaseCase,
    growth_axis: &[f64],
    margin_axis: &[f64],
) -> Result<SensitivityGrid> {
    SensitivityGrid::build(
        GridKind::GrowthMargin,
        Axis {
            label: "Revenue Growth",
            values: growth_axis.to_vec(),
        },
        Axis {
            label: "Operating Margin",
            values: margin_axis.to_vec(),
        },
        |growth, margin| base.growth_margin_cell(growth, margin),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialHistory, FinancialYear};

    fn base_case() -> BaseCase {
        let year = |year: i32, revenue: f64| FinancialYear {
            year,
            revenue,
            operating_income: revenue * 0.25,
            net_income: revenue * 0.2,
            operating_cash_flow: revenue * 0.3,
            capex: revenue * 0.04,
            depreciation_amortization: revenue * 0.03,
        };
        let history =
            FinancialHistory::new(vec![year(2022, 1_000.0), year(2023, 1_050.0), year(2024, 1_100.0)]).unwrap();
        let metrics = HistoricalMetrics::from_history(&history).unwrap();
        BaseCase {
            drivers: ProjectionDrivers {
                revenue_growth: metrics.avg_revenue_growth,
                operating_margin: metrics.avg_operating_margin,
                wacc: 0.09,
            },
            metrics,
            terminal_growth: 0.025,
            tax_rate: 0.21,
            projection_years: 5,
            bridge_inputs: BridgeInputs {
                net_debt: 100.0,
                shares_outstanding: 50.0,
                current_price: 60.0,
            },
        }
    }

    #[test]
    fn axis_is_centered_and_increasing() {
        let axis = centered_axis(0.1094, 0.01, 7).unwrap();
        assert_eq!(axis.len(), 7);
        assert_eq!(axis[3], 0.1094);
        assert!(axis.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn even_or_empty_axes_are_rejected() {
        assert!(centered_axis(0.1, 0.01, 0).is_err());
        assert!(centered_axis(0.1, 0.01, 4).is_err());
        assert!(centered_axis(0.1, 0.0, 3).is_err());
    }

    #[test]
    fn grid_center_reproduces_base_price() {
        let base = base_case();
        let wacc_axis = centered_axis(0.09, 0.01, 7).unwrap();
        let tgr_axis = centered_axis(0.025, 0.005, 7).unwrap();
        let grid = build_wacc_tgr_grid(&base, &wacc_axis, &tgr_axis).unwrap();
        let direct = base.price_at(base.drivers, base.terminal_growth).unwrap();
        assert_eq!(grid.value_at(3, 3), Some(direct));
    }

    #[test]
    fn price_falls_with_wacc_and_rises_with_terminal_growth() {
        let base = base_case();
        let wacc_axis = centered_axis(0.09, 0.01, 7).unwrap();
        let tgr_axis = centered_axis(0.025, 0.005, 7).unwrap();
        let grid = build_wacc_tgr_grid(&base, &wacc_axis, &tgr_axis).unwrap();
        assert_eq!(grid.invalid_cells(), 0);
        for i in 0..7 {
            for j in 0..7 {
                let here = grid.value_at(i, j).unwrap();
                if i + 1 < 7 {
                    assert!(grid.value_at(i + 1, j).unwrap() < here);
                }
                if j + 1 < 7 {
                    assert!(grid.value_at(i, j + 1).unwrap() > here);
                }
            }
        }
    }

    #[test]
    fn cells_with_wacc_at_or_below_terminal_growth_are_blank() {
        let base = base_case();
        let grid = build_wacc_tgr_grid(&base, &[0.03, 0.05, 0.08], &[0.02, 0.03, 0.05]).unwrap();
        assert!(grid.value_at(0, 0).is_some());
        assert_eq!(grid.value_at(0, 1), None);
        assert_eq!(grid.value_at(0, 2), None);
        assert_eq!(grid.value_at(1, 2), None);
        assert!(grid.value_at(2, 2).is_some());
        assert_eq!(grid.invalid_cells(), 3);
    }

    #[test]
    fn growth_margin_grid_increases_along_both_axes() {
        let base = base_case();
        let growth_axis = centered_axis(base.drivers.revenue_growth, 0.02, 3).unwrap();
        let margin_axis = centered_axis(base.drivers.operating_margin, 0.02, 5).unwrap();
        let grid = build_growth_margin_grid(&base, &growth_axis, &margin_axis).unwrap();
        assert_eq!(grid.cells.len(), 3);
        assert!(grid.cells.iter().all(|row| row.len() == 5));
        for i in 0..3 {
            for j in 0..4 {
                assert!(grid.value_at(i, j + 1).unwrap() > grid.value_at(i, j).unwrap());
            }
        }
        for j in 0..5 {
            assert!(grid.value_at(1, j).unwrap() > grid.value_at(0, j).unwrap());
        }
    }
}
