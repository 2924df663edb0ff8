use std::fs;

use dcf_scenarios::config::{ValuationConfig, DEFAULT_EQUITY_RISK_PREMIUM};
use dcf_scenarios::models::{
    BalanceSheetSnapshot, FinancialHistory, FinancialYear, MarketData, RateEnvironment, RateSource,
};
use dcf_scenarios::report::{build_workbook, csv_writer, xlsx_writer, Cell};
use dcf_scenarios::services::sample::sample_bundle;
use dcf_scenarios::valuation::{compute_wacc, run_valuation, value_bundle, Scenario, ValuationError};

fn year(year: i32, revenue: f64) -> FinancialYear {
    FinancialYear {
        year,
        revenue,
        operating_income: revenue * 0.2,
        net_income: revenue * 0.15,
        operating_cash_flow: revenue * 0.22,
        capex: revenue * 0.04,
        depreciation_amortization: revenue * 0.03,
    }
}

fn rates(risk_free_rate: f64) -> RateEnvironment {
    RateEnvironment {
        risk_free_rate,
        equity_risk_premium: DEFAULT_EQUITY_RISK_PREMIUM,
        treasury_2y: None,
        source: RateSource::Fallback,
        as_of: None,
    }
}

fn debt_free_balance_sheet() -> BalanceSheetSnapshot {
    BalanceSheetSnapshot {
        total_debt: 0.0,
        cash: 50.0,
        total_equity: 500.0,
        interest_expense: 0.0,
        tax_rate: 0.21,
    }
}

fn market(beta: f64) -> MarketData {
    MarketData {
        current_price: 20.0,
        shares_outstanding: 100.0,
        beta,
        market_cap: 2_000.0,
    }
}

#[test]
fn apple_sample_produces_five_ordered_scenarios() {
    let bundle = sample_bundle("AAPL", 0.055).unwrap();
    let output = value_bundle(&bundle, &ValuationConfig::default()).unwrap();

    assert!((output.wacc.wacc - 0.1094).abs() < 5e-4);
    assert!((output.wacc.equity_weight + output.wacc.debt_weight - 1.0).abs() < 1e-12);
    assert_eq!(output.scenarios.len(), 5);

    let price = |s: Scenario| output.scenarios.get(s).implied_share_price();
    assert!(price(Scenario::Bull) > price(Scenario::Base));
    assert!(price(Scenario::Base) > price(Scenario::Bear));
    assert!(price(Scenario::RisingRates) < price(Scenario::Base));
    assert!(price(Scenario::FallingRates) > price(Scenario::Base));

    for result in output.scenarios.iter() {
        assert_eq!(result.projection_rows.len(), 5);
        assert_eq!(result.projection_rows[0].year, 2025);
        assert!(result.bridge.wacc > result.bridge.terminal_growth_rate);
    }
    assert_eq!(output.scenarios.get(Scenario::Bull).bridge.terminal_growth_rate, 0.03);
    assert_eq!(output.scenarios.get(Scenario::Bear).bridge.terminal_growth_rate, 0.02);
}

#[test]
fn valuation_is_deterministic() {
    let bundle = sample_bundle("AAPL", 0.055).unwrap();
    let config = ValuationConfig::default();
    let first = value_bundle(&bundle, &config).unwrap();
    let second = value_bundle(&bundle, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn sensitivity_center_matches_base_case() {
    let bundle = sample_bundle("AAPL", 0.055).unwrap();
    let output = value_bundle(&bundle, &ValuationConfig::default()).unwrap();
    let base_price = output.scenarios.base().implied_share_price();

    let grid = &output.wacc_tgr_grid;
    assert_eq!(grid.rows.values.len(), 7);
    assert_eq!(grid.columns.values.len(), 7);
    assert_eq!(grid.rows.values[3], output.wacc.wacc);
    assert!((grid.value_at(3, 3).unwrap() - base_price).abs() < 1e-9);

    let growth_margin = &output.growth_margin_grid;
    assert_eq!(growth_margin.cells.len(), 3);
    assert!((growth_margin.value_at(1, 2).unwrap() - base_price).abs() < 1e-9);
}

#[test]
fn one_year_of_history_is_rejected() {
    let err = FinancialHistory::new(vec![year(2024, 1_000.0)]).unwrap_err();
    assert_eq!(err, ValuationError::InsufficientHistory { years: 1 });
}

#[test]
fn terminal_growth_equal_to_wacc_is_rejected() {
    let history = FinancialHistory::new(vec![year(2023, 1_000.0), year(2024, 1_050.0)]).unwrap();
    let (balance_sheet, market, rates) = (debt_free_balance_sheet(), market(1.0), rates(0.03));
    let wacc = compute_wacc(&market, &balance_sheet, &rates).unwrap();
    let config = ValuationConfig {
        terminal_growth: wacc.wacc,
        ..ValuationConfig::default()
    };
    let err = run_valuation(&history, &balance_sheet, &market, &rates, &config).unwrap_err();
    assert!(matches!(err, ValuationError::InvalidAssumption(_)));
}

#[test]
fn scenario_failures_name_the_scenario() {
    let history = FinancialHistory::new(vec![year(2023, 1_000.0), year(2024, 1_050.0)]).unwrap();
    // Base WACC 3.75%; Bull drops it to 2.75%, under its fixed 3% terminal growth.
    let config = ValuationConfig {
        terminal_growth: 0.02,
        ..ValuationConfig::default()
    };
    let err = run_valuation(&history, &debt_free_balance_sheet(), &market(0.5), &rates(0.01), &config)
        .unwrap_err();
    match &err {
        ValuationError::Scenario { scenario, .. } => assert_eq!(*scenario, Scenario::Bull),
        other => panic!("expected scenario context, got {:?}", other),
    }
    assert!(err.is_invalid_assumption());
    assert!(err.to_string().starts_with("Bull Case scenario: invalid assumption"));
}

#[test]
fn equity_risk_premium_setting_moves_wacc() {
    let bundle = sample_bundle("AAPL", DEFAULT_EQUITY_RISK_PREMIUM).unwrap();
    let default = value_bundle(&bundle, &ValuationConfig::default()).unwrap();
    let config = ValuationConfig {
        equity_risk_premium: 0.09,
        ..ValuationConfig::default()
    };
    let raised = value_bundle(&bundle, &config).unwrap();

    assert_eq!(raised.wacc.equity_risk_premium, 0.09);
    let expected_re = bundle.rates.risk_free_rate + bundle.market.beta * 0.09;
    assert!((raised.wacc.cost_of_equity - expected_re).abs() < 1e-12);
    assert!(raised.wacc.wacc > default.wacc.wacc + 0.02);
    assert!(raised.scenarios.base().implied_share_price() < default.scenarios.base().implied_share_price());
}

#[test]
fn debt_free_company_uses_cost_of_equity() {
    let history = FinancialHistory::new(vec![year(2023, 1_000.0), year(2024, 1_050.0)]).unwrap();
    let output = run_valuation(
        &history,
        &debt_free_balance_sheet(),
        &market(1.2),
        &rates(0.04),
        &ValuationConfig::default(),
    )
    .unwrap();
    assert_eq!(output.wacc.debt_weight, 0.0);
    assert!((output.wacc.wacc - (0.04 + 1.2 * DEFAULT_EQUITY_RISK_PREMIUM)).abs() < 1e-12);
    assert!(output.wacc.cost_of_debt_is_fallback);
    // Net cash raises equity value above enterprise value.
    let base = output.scenarios.base();
    assert!(base.bridge.equity_value > base.bridge.enterprise_value);
}

#[test]
fn workbook_is_written_with_json_dump() {
    let bundle = sample_bundle("AAPL", 0.055).unwrap();
    let output = value_bundle(&bundle, &ValuationConfig::default()).unwrap();
    let workbook = build_workbook(&bundle, &output);

    let dir = tempfile::tempdir().unwrap();
    let sheets = csv_writer::write_workbook(&workbook, dir.path()).unwrap();
    assert_eq!(sheets.len(), 10);
    assert!(dir.path().join("01_dashboard.csv").exists());
    assert!(dir.path().join("10_sensitivity.csv").exists());

    let json_path = csv_writer::write_valuation_json(dir.path(), &bundle, &output).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    let base_price = json["valuation"]["scenarios"]["Base"]["implied_share_price"].as_f64().unwrap();
    assert!((base_price - output.scenarios.base().implied_share_price()).abs() < 1e-6);
    assert_eq!(json["bundle"]["profile"]["ticker"], "AAPL");
}

#[test]
fn xlsx_workbook_has_every_sheet_and_both_charts() {
    let bundle = sample_bundle("AAPL", DEFAULT_EQUITY_RISK_PREMIUM).unwrap();
    let output = value_bundle(&bundle, &ValuationConfig::default()).unwrap();
    let workbook = build_workbook(&bundle, &output);

    let dir = tempfile::tempdir().unwrap();
    let path = xlsx_writer::write_xlsx(&workbook, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "aapl_dcf_model.xlsx");

    let bytes = fs::read(&path).unwrap();
    let has = |name: &str| bytes.windows(name.len()).any(|w| w == name.as_bytes());
    assert!(bytes.starts_with(b"PK"));
    assert!(has("xl/worksheets/sheet10.xml"));
    assert!(!has("xl/worksheets/sheet11.xml"));
    assert!(has("xl/charts/chart2.xml"));
    assert!(!has("xl/charts/chart3.xml"));
}

#[test]
fn invalid_sensitivity_cells_render_as_not_available() {
    let history = FinancialHistory::new(vec![year(2023, 1_000.0), year(2024, 1_050.0)]).unwrap();
    // Base WACC 5.3%: the low WACC rows cross the high terminal growth columns.
    let config = ValuationConfig {
        terminal_growth: 0.02,
        ..ValuationConfig::default()
    };
    let balance_sheet = debt_free_balance_sheet();
    let market = market(0.6);
    let output = run_valuation(&history, &balance_sheet, &market, &rates(0.02), &config).unwrap();
    assert!(output.wacc_tgr_grid.invalid_cells() > 0);

    let bundle = dcf_scenarios::models::FinancialBundle {
        profile: dcf_scenarios::models::CompanyProfile {
            ticker: "TEST".to_string(),
            name: "Test Co".to_string(),
            sector: String::new(),
            industry: String::new(),
            currency: "USD".to_string(),
        },
        history,
        balance_sheet,
        balance_history: Vec::new(),
        market,
        rates: rates(0.02),
        source: dcf_scenarios::models::DataSource::Sample,
        fetched_at: chrono::Utc::now(),
    };
    let workbook = build_workbook(&bundle, &output);
    let sheet = workbook.sheet("Sensitivity").unwrap();
    assert!(sheet
        .rows
        .iter()
        .flatten()
        .any(|c| *c == Cell::text("N/A")));
}
