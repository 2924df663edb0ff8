// src/report/builder.rs
use log::debug;

use super::{Cell, ChartKind, ChartSpec, ColumnRange, Sheet, Workbook};
use crate::models::FinancialBundle;
use crate::valuation::sensitivity::SensitivityGrid;
use crate::valuation::{Scenario, ValuationOutput, ValuationResult};

pub const DASHBOARD: &str = "Dashboard";
pub const FINANCIALS: &str = "Financials";
pub const WACC: &str = "WACC";
pub const SCENARIO_COMPARISON: &str = "Scenario Comparison";
pub const SENSITIVITY: &str = "Sensitivity";

/// Shown wherever a sensitivity combination has no valid price.
pub const NOT_AVAILABLE: &str = "N/A";

pub fn dcf_sheet_title(scenario: Scenario) -> String {
    match scenario {
        Scenario::Base => "DCF Base".to_string(),
        Scenario::Bull => "DCF Bull".to_string(),
        Scenario::Bear => "DCF Bear".to_string(),
        other => format!("DCF {}", other.name()),
    }
}

fn upside_marker(upside: f64) -> &'static str {
    if upside >= 0.0 {
        "▲"
    } else {
        "▼"
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels.iter().map(|l| Cell::text(*l)).collect()
}

fn dashboard(bundle: &FinancialBundle, output: &ValuationOutput) -> Sheet {
    let mut sheet = Sheet::new(DASHBOARD);
    let base = output.scenarios.base();

    sheet.push_row(vec![Cell::text(format!(
        "{} ({}) Discounted Cash Flow Valuation",
        bundle.profile.name, bundle.profile.ticker
    ))]);
    sheet.push_label("Sector", Cell::text(&bundle.profile.sector));
    sheet.push_label("Industry", Cell::text(&bundle.profile.industry));
    sheet.push_label("Currency", Cell::text(&bundle.profile.currency));
    sheet.push_label("Data Source", Cell::text(bundle.source.to_string()));
    sheet.push_label(
        "Valuation Date",
        Cell::text(bundle.fetched_at.format("%Y-%m-%d").to_string()),
    );
    sheet.blank_row();

    sheet.push_row(vec![Cell::text("Key Outputs")]);
    sheet.push_label("Current Share Price", Cell::Money(bundle.market.current_price));
    sheet.push_label("Implied Share Price (Base)", Cell::Money(base.implied_share_price()));
    sheet.push_label("Upside / Downside", Cell::Percent(base.upside_downside_percent()));
    sheet.push_label("WACC", Cell::Percent(output.wacc.wacc));
    sheet.push_label("Terminal Growth", Cell::Percent(base.bridge.terminal_growth_rate));
    sheet.push_label("Enterprise Value", Cell::Money(base.bridge.enterprise_value));
    sheet.push_label("Equity Value", Cell::Money(base.bridge.equity_value));
    sheet.push_label("Terminal Value % of EV", Cell::Percent(base.bridge.terminal_value_share()));
    sheet.blank_row();

    sheet.push_row(header(&["Scenario", "Implied Price", "Upside / Downside", ""]));
    for result in output.scenarios.iter() {
        let upside = result.upside_downside_percent();
        sheet.push_row(vec![
            Cell::text(result.scenario.name()),
            Cell::Money(result.implied_share_price()),
            Cell::Percent(upside),
            Cell::text(upside_marker(upside)),
        ]);
    }
    sheet.blank_row();

    let header_row = sheet.push_row(header(&["Fiscal Year", "Revenue", "Free Cash Flow"]));
    for year in bundle.history.years() {
        sheet.push_row(vec![
            Cell::Number(year.year as f64),
            Cell::Money(year.revenue),
            Cell::Money(year.free_cash_flow()),
        ]);
    }
    let end_row = sheet.row_count();
    sheet.charts.push(ChartSpec {
        title: "Revenue vs Free Cash Flow".to_string(),
        kind: ChartKind::Column,
        domain: ColumnRange {
            column: 0,
            start_row: header_row,
            end_row,
        },
        series: vec![
            ColumnRange {
                column: 1,
                start_row: header_row,
                end_row,
            },
            ColumnRange {
                column: 2,
                start_row: header_row,
                end_row,
            },
        ],
    });
    sheet
}

fn financials(bundle: &FinancialBundle, output: &ValuationOutput) -> Sheet {
    let mut sheet = Sheet::new(FINANCIALS);
    sheet.frozen_rows = 1;
    sheet.push_row(header(&[
        "Fiscal Year",
        "Revenue",
        "Revenue Growth",
        "Operating Income",
        "Operating Margin",
        "Net Income",
        "Operating Cash Flow",
        "CapEx",
        "D&A",
        "Free Cash Flow",
    ]));

    for (i, year) in bundle.history.years().iter().enumerate() {
        let growth = match i {
            0 => Cell::Empty,
            _ => output
                .metrics
                .revenue_growths
                .get(i - 1)
                .map_or(Cell::Empty, |g| Cell::Percent(*g)),
        };
        sheet.push_row(vec![
            Cell::Number(year.year as f64),
            Cell::Money(year.revenue),
            growth,
            Cell::Money(year.operating_income),
            Cell::Percent(year.operating_margin()),
            Cell::Money(year.net_income),
            Cell::Money(year.operating_cash_flow),
            Cell::Money(year.capex),
            Cell::Money(year.depreciation_amortization),
            Cell::Money(year.free_cash_flow()),
        ]);
    }
    sheet.blank_row();

    let m = &output.metrics;
    sheet.push_row(vec![Cell::text("Historical Averages")]);
    sheet.push_label("Average Revenue Growth", Cell::Percent(m.avg_revenue_growth));
    sheet.push_label("Average Operating Margin", Cell::Percent(m.avg_operating_margin));
    sheet.push_label("D&A % of Revenue", Cell::Percent(m.da_ratio));
    sheet.push_label("CapEx % of Revenue", Cell::Percent(m.capex_ratio));
    sheet.blank_row();

    let bs = &bundle.balance_sheet;
    sheet.push_row(vec![Cell::text("Balance Sheet (latest)")]);
    sheet.push_label("Total Debt", Cell::Money(bs.total_debt));
    sheet.push_label("Cash & Equivalents", Cell::Money(bs.cash));
    sheet.push_label("Net Debt", Cell::Money(bs.net_debt()));
    sheet.push_label("Total Equity", Cell::Money(bs.total_equity));
    sheet.push_label("Interest Expense", Cell::Money(bs.interest_expense));
    sheet.push_label("Effective Tax Rate", Cell::Percent(bs.tax_rate));

    if !bundle.balance_history.is_empty() {
        sheet.blank_row();
        sheet.push_row(vec![Cell::text("Balance Sheet History")]);
        sheet.push_row(header(&[
            "Fiscal Year",
            "Total Debt",
            "Cash & Equivalents",
            "Net Debt",
            "Total Equity",
        ]));
        for year in &bundle.balance_history {
            sheet.push_row(vec![
                Cell::Number(year.year as f64),
                Cell::Money(year.total_debt),
                Cell::Money(year.cash),
                Cell::Money(year.net_debt()),
                Cell::Money(year.total_equity),
            ]);
        }
    }
    sheet
}

fn wacc(bundle: &FinancialBundle, output: &ValuationOutput) -> Sheet {
    let w = &output.wacc;
    let rates = &bundle.rates;
    let mut sheet = Sheet::new(WACC);

    sheet.push_row(vec![Cell::text("Cost of Equity (CAPM)")]);
    sheet.push_label("Risk-Free Rate (10Y Treasury)", Cell::Percent(w.risk_free_rate));
    if let Some(two_year) = rates.treasury_2y {
        sheet.push_label("2Y Treasury", Cell::Percent(two_year));
    }
    let as_of = rates.as_of.map(|d| d.to_string()).unwrap_or_default();
    sheet.push_row(vec![
        Cell::text("Rate Source"),
        Cell::text(rates.source.to_string()),
        Cell::text(as_of),
    ]);
    sheet.push_label("Beta", Cell::Number(w.beta));
    sheet.push_label("Equity Risk Premium", Cell::Percent(w.equity_risk_premium));
    sheet.push_label("Cost of Equity", Cell::Percent(w.cost_of_equity));
    sheet.blank_row();

    sheet.push_row(vec![Cell::text("Cost of Debt")]);
    sheet.push_label("Interest Expense", Cell::Money(bundle.balance_sheet.interest_expense));
    sheet.push_label("Total Debt", Cell::Money(w.debt_value));
    let rd_label = if w.cost_of_debt_is_fallback {
        "Pre-Tax Cost of Debt (Rf + spread)"
    } else {
        "Pre-Tax Cost of Debt"
    };
    sheet.push_label(rd_label, Cell::Percent(w.cost_of_debt));
    sheet.push_label("Tax Rate", Cell::Percent(w.tax_rate));
    sheet.push_label("After-Tax Cost of Debt", Cell::Percent(w.after_tax_cost_of_debt));
    sheet.blank_row();

    sheet.push_row(vec![Cell::text("Capital Structure")]);
    sheet.push_label("Market Value of Equity", Cell::Money(w.equity_value));
    sheet.push_label("Market Value of Debt", Cell::Money(w.debt_value));
    sheet.push_label("Equity Weight", Cell::Percent(w.equity_weight));
    sheet.push_label("Debt Weight", Cell::Percent(w.debt_weight));
    sheet.blank_row();
    sheet.push_label("WACC", Cell::Percent(w.wacc));
    sheet
}

fn dcf(result: &ValuationResult, bundle: &FinancialBundle) -> Sheet {
    let mut sheet = Sheet::new(dcf_sheet_title(result.scenario));
    let a = &result.assumptions;
    let d = &result.drivers;
    let b = &result.bridge;

    sheet.push_row(vec![Cell::text(result.scenario.name())]);
    sheet.push_row(vec![Cell::text(result.scenario.description())]);
    sheet.blank_row();

    sheet.push_row(header(&["Assumption", "Adjustment", "Effective"]));
    sheet.push_row(vec![
        Cell::text("Revenue Growth"),
        Cell::Percent(a.revenue_growth_adjustment),
        Cell::Percent(d.revenue_growth),
    ]);
    sheet.push_row(vec![
        Cell::text("Operating Margin"),
        Cell::Percent(a.margin_adjustment),
        Cell::Percent(d.operating_margin),
    ]);
    sheet.push_row(vec![
        Cell::text("WACC"),
        Cell::Percent(a.wacc_adjustment()),
        Cell::Percent(d.wacc),
    ]);
    let tgr_adjustment = match a.terminal_growth_override {
        Some(_) => Cell::text("override"),
        None => Cell::Empty,
    };
    sheet.push_row(vec![
        Cell::text("Terminal Growth"),
        tgr_adjustment,
        Cell::Percent(b.terminal_growth_rate),
    ]);
    sheet.push_label("Tax Rate", Cell::Percent(bundle.balance_sheet.tax_rate));
    sheet.blank_row();

    sheet.push_row(header(&[
        "Year",
        "Revenue",
        "EBIT",
        "NOPAT",
        "D&A",
        "CapEx",
        "Free Cash Flow",
        "Discount Factor",
        "PV of FCF",
    ]));
    for row in &result.projection_rows {
        sheet.push_row(vec![
            Cell::Number(row.year as f64),
            Cell::Money(row.revenue),
            Cell::Money(row.ebit),
            Cell::Money(row.nopat),
            Cell::Money(row.depreciation_amortization),
            Cell::Money(row.capex),
            Cell::Money(row.fcf),
            Cell::Number(row.discount_factor),
            Cell::Money(row.present_value_of_fcf),
        ]);
    }
    sheet.blank_row();

    sheet.push_row(vec![Cell::text("Valuation")]);
    sheet.push_label("Sum of PV of FCF", Cell::Money(b.sum_pv_fcf));
    sheet.push_label("Terminal Value", Cell::Money(b.terminal_value));
    sheet.push_label("PV of Terminal Value", Cell::Money(b.present_value_of_terminal_value));
    sheet.push_label("Enterprise Value", Cell::Money(b.enterprise_value));
    sheet.push_label("Less: Net Debt", Cell::Money(b.net_debt));
    sheet.push_label("Equity Value", Cell::Money(b.equity_value));
    sheet.push_label("Shares Outstanding", Cell::Number(bundle.market.shares_outstanding));
    sheet.push_label("Implied Share Price", Cell::Money(b.implied_share_price));
    sheet.push_label("Current Share Price", Cell::Money(bundle.market.current_price));
    sheet.push_label("Upside / Downside", Cell::Percent(b.upside_downside_percent));
    sheet
}

fn scenario_comparison(output: &ValuationOutput) -> Sheet {
    let mut sheet = Sheet::new(SCENARIO_COMPARISON);
    sheet.frozen_rows = 1;
    let header_row = sheet.push_row(header(&[
        "Scenario",
        "Revenue Growth",
        "Operating Margin",
        "WACC",
        "Terminal Growth",
        "Enterprise Value",
        "Equity Value",
        "Implied Price",
        "Upside / Downside",
        "Description",
    ]));
    for result in output.scenarios.iter() {
        sheet.push_row(vec![
            Cell::text(result.scenario.name()),
            Cell::Percent(result.drivers.revenue_growth),
            Cell::Percent(result.drivers.operating_margin),
            Cell::Percent(result.drivers.wacc),
            Cell::Percent(result.bridge.terminal_growth_rate),
            Cell::Money(result.bridge.enterprise_value),
            Cell::Money(result.bridge.equity_value),
            Cell::Money(result.implied_share_price()),
            Cell::Percent(result.upside_downside_percent()),
            Cell::text(result.scenario.description()),
        ]);
    }
    let end_row = sheet.row_count();
    sheet.charts.push(ChartSpec {
        title: "Implied Price by Scenario".to_string(),
        kind: ChartKind::Column,
        domain: ColumnRange {
            column: 0,
            start_row: header_row,
            end_row,
        },
        series: vec![ColumnRange {
            column: 7,
            start_row: header_row,
            end_row,
        }],
    });
    sheet
}

fn push_grid(sheet: &mut Sheet, title: &str, grid: &SensitivityGrid) {
    sheet.push_row(vec![Cell::text(title)]);
    let mut top = vec![Cell::text(format!("{} \\ {}", grid.rows.label, grid.columns.label))];
    top.extend(grid.columns.values.iter().map(|v| Cell::Percent(*v)));
    sheet.push_row(top);

    for (row_value, cells) in grid.rows.values.iter().zip(&grid.cells) {
        let mut row = vec![Cell::Percent(*row_value)];
        row.extend(cells.iter().map(|c| match c {
            Some(price) => Cell::Money(*price),
            None => Cell::text(NOT_AVAILABLE),
        }));
        sheet.push_row(row);
    }
}

fn sensitivity(output: &ValuationOutput) -> Sheet {
    let mut sheet = Sheet::new(SENSITIVITY);
    push_grid(
        &mut sheet,
        "Implied Share Price: WACC vs Terminal Growth",
        &output.wacc_tgr_grid,
    );
    sheet.blank_row();
    sheet.blank_row();
    push_grid(
        &mut sheet,
        "Implied Share Price: Revenue Growth vs Operating Margin",
        &output.growth_margin_grid,
    );
    sheet
}

/// Lays the valuation out as a workbook. No values are recomputed here.
pub fn build_workbook(bundle: &FinancialBundle, output: &ValuationOutput) -> Workbook {
    let mut sheets = vec![
        dashboard(bundle, output),
        financials(bundle, output),
        wacc(bundle, output),
    ];
    sheets.extend(output.scenarios.iter().map(|result| dcf(result, bundle)));
    sheets.push(scenario_comparison(output));
    sheets.push(sensitivity(output));

    debug!("Built workbook with {} sheets", sheets.len());
    Workbook {
        title: format!("{} DCF Model", bundle.profile.ticker),
        sheets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValuationConfig;
    use crate::services::sample::sample_bundle;
    use crate::valuation::value_bundle;

    fn workbook() -> (FinancialBundle, ValuationOutput, Workbook) {
        let bundle = sample_bundle("AAPL", 0.055).unwrap();
        let output = value_bundle(&bundle, &ValuationConfig::default()).unwrap();
        let workbook = build_workbook(&bundle, &output);
        (bundle, output, workbook)
    }

    #[test]
    fn sheets_are_in_presentation_order() {
        let (_, _, workbook) = workbook();
        assert_eq!(
            workbook.sheet_titles(),
            vec![
                "Dashboard",
                "Financials",
                "WACC",
                "DCF Base",
                "DCF Bull",
                "DCF Bear",
                "DCF Rising Rates",
                "DCF Falling Rates",
                "Scenario Comparison",
                "Sensitivity",
            ]
        );
    }

    #[test]
    fn dcf_sheet_shows_the_computed_price() {
        let (_, output, workbook) = workbook();
        let sheet = workbook.sheet("DCF Bull").unwrap();
        let row = sheet.find_row("Implied Share Price").unwrap();
        assert_eq!(
            sheet.cell(row, 1),
            Some(&Cell::Money(output.scenarios.get(Scenario::Bull).implied_share_price()))
        );
    }

    #[test]
    fn charts_point_at_their_tables() {
        let (bundle, _, workbook) = workbook();
        let dashboard = workbook.sheet(DASHBOARD).unwrap();
        let chart = &dashboard.charts[0];
        assert_eq!(chart.title, "Revenue vs Free Cash Flow");
        assert_eq!(chart.domain.end_row - chart.domain.start_row, bundle.history.len() + 1);

        let comparison = workbook.sheet(SCENARIO_COMPARISON).unwrap();
        let chart = &comparison.charts[0];
        assert_eq!(chart.domain.end_row - chart.domain.start_row, Scenario::ALL.len() + 1);
        assert_eq!(comparison.cell(0, 7), Some(&Cell::text("Implied Price")));
    }

    #[test]
    fn financials_sheet_lists_balance_sheet_history() {
        let (bundle, _, workbook) = workbook();
        let sheet = workbook.sheet(FINANCIALS).unwrap();
        let title = sheet.find_row("Balance Sheet History").unwrap();
        assert_eq!(sheet.cell(title + 1, 3), Some(&Cell::text("Net Debt")));

        let rows = &sheet.rows[title + 2..];
        assert_eq!(rows.len(), bundle.balance_history.len());
        let oldest = &bundle.balance_history[0];
        assert_eq!(rows[0][0], Cell::Number(2021.0));
        assert_eq!(rows[0][4], Cell::Money(oldest.total_equity));
        assert_eq!(rows[3][1], Cell::Money(bundle.balance_sheet.total_debt));
    }

    #[test]
    fn sensitivity_sheet_holds_both_grids() {
        let (_, output, workbook) = workbook();
        let sheet = workbook.sheet(SENSITIVITY).unwrap();
        // title + header + 7 rows, two blanks, title + header + 3 rows
        assert_eq!(sheet.row_count(), 9 + 2 + 5);
        let center = output.wacc_tgr_grid.value_at(3, 3).unwrap();
        assert_eq!(sheet.cell(5, 4), Some(&Cell::Money(center)));
    }
}
