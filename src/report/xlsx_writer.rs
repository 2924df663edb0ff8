// src/report/xlsx_writer.rs
//! Native .xlsx output: one worksheet per sheet, typed number formats and
//! the sheet's charts.
use anyhow::{Context, Result};
use log::{debug, info};
use rust_xlsxwriter::{Chart, ChartType, Format, Workbook as XlsxWorkbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};

use super::builder::NOT_AVAILABLE;
use super::csv_writer::slug;
use super::{Cell, ChartKind, ChartSpec, Sheet, Workbook};

const MONEY_FORMAT: &str = "#,##0.00";
const PERCENT_FORMAT: &str = "0.00%";
const LABEL_COLUMN_WIDTH: f64 = 34.0;
const VALUE_COLUMN_WIDTH: f64 = 16.0;

struct Formats {
    money: Format,
    percent: Format,
    bold: Format,
}

impl Formats {
    fn new() -> Self {
        Formats {
            money: Format::new().set_num_format(MONEY_FORMAT),
            percent: Format::new().set_num_format(PERCENT_FORMAT),
            bold: Format::new().set_bold(),
        }
    }
}

/// "AAPL DCF Model" -> "aapl_dcf_model.xlsx".
pub fn xlsx_file_name(workbook: &Workbook) -> String {
    format!("{}.xlsx", slug(&workbook.title))
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &Cell, formats: &Formats) -> Result<()> {
    match cell {
        Cell::Empty => {}
        Cell::Text(s) => {
            ws.write_string(row, col, s.as_str())?;
        }
        Cell::Number(n) | Cell::Money(n) | Cell::Percent(n) if !n.is_finite() => {
            ws.write_string(row, col, NOT_AVAILABLE)?;
        }
        Cell::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        Cell::Money(n) => {
            ws.write_number_with_format(row, col, *n, &formats.money)?;
        }
        Cell::Percent(p) => {
            ws.write_number_with_format(row, col, *p, &formats.percent)?;
        }
    }
    Ok(())
}

/// Categories and values skip the header row the ranges start on; the
/// header cell names each series.
fn chart_for(sheet: &Sheet, spec: &ChartSpec) -> Option<Chart> {
    let domain = spec.domain;
    if domain.end_row <= domain.start_row + 1 {
        return None;
    }
    let chart_type = match spec.kind {
        ChartKind::Column => ChartType::Column,
        ChartKind::Line => ChartType::Line,
    };
    let name = sheet.title.as_str();
    let first = (domain.start_row + 1) as u32;
    let last = (domain.end_row - 1) as u32;

    let mut chart = Chart::new(chart_type);
    chart.title().set_name(spec.title.as_str());
    for series in &spec.series {
        let column = series.column as u16;
        chart
            .add_series()
            .set_categories((name, first, domain.column as u16, last, domain.column as u16))
            .set_values((name, first, column, last, column))
            .set_name((name, series.start_row as u32, column));
    }
    Some(chart)
}

fn write_sheet(ws: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<()> {
    ws.set_name(sheet.title.as_str())
        .with_context(|| format!("Invalid worksheet name {:?}", sheet.title))?;

    for (r, row) in sheet.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(ws, r as u32, c as u16, cell, formats)?;
        }
    }
    if sheet.frozen_rows > 0 {
        ws.set_freeze_panes(sheet.frozen_rows, 0)?;
        for c in 0..sheet.column_count() {
            if let Some(Cell::Text(label)) = sheet.cell(0, c) {
                ws.write_string_with_format(0, c as u16, label.as_str(), &formats.bold)?;
            }
        }
    }

    ws.set_column_width(0, LABEL_COLUMN_WIDTH)?;
    for c in 1..sheet.column_count() {
        ws.set_column_width(c as u16, VALUE_COLUMN_WIDTH)?;
    }

    let anchor_column = (sheet.column_count() + 1) as u16;
    for spec in &sheet.charts {
        match chart_for(sheet, spec) {
            Some(chart) => {
                ws.insert_chart(spec.domain.start_row as u32, anchor_column, &chart)?;
            }
            None => debug!("Chart {:?} on {} has no data rows, skipped", spec.title, sheet.title),
        }
    }
    Ok(())
}

/// Writes the whole workbook as a single .xlsx file in `dir`.
pub fn write_xlsx(workbook: &Workbook, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create output directory {}", dir.display()))?;
    let path = dir.join(xlsx_file_name(workbook));

    let formats = Formats::new();
    let mut book = XlsxWorkbook::new();
    for sheet in &workbook.sheets {
        let ws = book.add_worksheet();
        write_sheet(ws, sheet, &formats)?;
    }
    book.save(&path).with_context(|| format!("Cannot write {}", path.display()))?;

    let charts: usize = workbook.sheets.iter().map(|s| s.charts.len()).sum();
    info!(
        "Wrote {} ({} sheets, {} charts)",
        path.display(),
        workbook.sheets.len(),
        charts
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ColumnRange;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
    }

    fn small_workbook() -> Workbook {
        let mut sheet = Sheet::new("Prices");
        sheet.frozen_rows = 1;
        let header_row = sheet.push_row(vec![Cell::text("Scenario"), Cell::text("Price")]);
        sheet.push_row(vec![Cell::text("Base"), Cell::Money(101.5)]);
        sheet.push_row(vec![Cell::text("Bear"), Cell::Money(f64::NAN)]);
        sheet.push_row(vec![Cell::text("Upside"), Cell::Percent(0.12), Cell::Empty]);
        sheet.charts.push(ChartSpec {
            title: "Price".to_string(),
            kind: ChartKind::Column,
            domain: ColumnRange {
                column: 0,
                start_row: header_row,
                end_row: 3,
            },
            series: vec![ColumnRange {
                column: 1,
                start_row: header_row,
                end_row: 3,
            }],
        });
        let mut empty_chart = Sheet::new("Notes");
        empty_chart.push_row(vec![Cell::text("Header")]);
        empty_chart.charts.push(ChartSpec {
            title: "Nothing".to_string(),
            kind: ChartKind::Line,
            domain: ColumnRange {
                column: 0,
                start_row: 0,
                end_row: 1,
            },
            series: Vec::new(),
        });
        Workbook {
            title: "TEST DCF Model".to_string(),
            sheets: vec![sheet, empty_chart],
        }
    }

    #[test]
    fn file_name_follows_workbook_title() {
        assert_eq!(xlsx_file_name(&small_workbook()), "test_dcf_model.xlsx");
    }

    #[test]
    fn writes_one_worksheet_per_sheet_and_skips_empty_charts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xlsx(&small_workbook(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("test_dcf_model.xlsx"));

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(contains(&bytes, "xl/worksheets/sheet2.xml"));
        assert!(!contains(&bytes, "xl/worksheets/sheet3.xml"));
        assert!(contains(&bytes, "xl/charts/chart1.xml"));
        assert!(!contains(&bytes, "xl/charts/chart2.xml"));
    }
}
