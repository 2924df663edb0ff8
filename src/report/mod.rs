// src/report/mod.rs
//! Spreadsheet-shaped view of a valuation. Sheets hold typed cells; writers
//! decide how each type is rendered.

pub mod builder;
pub mod csv_writer;
pub mod xlsx_writer;

use serde::Serialize;
use serde_json::{json, Value};

pub use builder::build_workbook;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Currency amount in the company's reporting currency.
    Money(f64),
    /// Decimal fraction, 0.05 = 5%.
    Percent(f64),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Human-readable rendering, used for CSV output.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Money(n) => format!("{:.2}", n),
            Cell::Percent(p) => format!("{:.2}%", p * 100.0),
            Cell::Empty => String::new(),
        }
    }

    /// Value as sent to the Sheets API with `valueInputOption=RAW`.
    pub fn raw_value(&self) -> Value {
        match self {
            Cell::Text(s) => json!(s),
            Cell::Number(n) | Cell::Money(n) | Cell::Percent(n) if n.is_finite() => json!(n),
            Cell::Number(_) | Cell::Money(_) | Cell::Percent(_) => json!("N/A"),
            Cell::Empty => json!(""),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{:.4}", n)
    }
}

/// A zero-based column slice `[start_row, end_row)` of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnRange {
    pub column: usize,
    pub start_row: usize,
    pub end_row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Column,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub domain: ColumnRange,
    pub series: Vec<ColumnRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub title: String,
    pub rows: Vec<Vec<Cell>>,
    pub frozen_rows: u32,
    pub charts: Vec<ChartSpec>,
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Sheet {
            title: title.into(),
            rows: Vec::new(),
            frozen_rows: 0,
            charts: Vec::new(),
        }
    }

    /// Appends a row and returns its index.
    pub fn push_row(&mut self, row: Vec<Cell>) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn blank_row(&mut self) {
        self.rows.push(Vec::new());
    }

    pub fn push_label(&mut self, label: &str, value: Cell) -> usize {
        self.push_row(vec![Cell::text(label), value])
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Row index of the first row whose first cell is the text `label`.
    pub fn find_row(&self, label: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| matches!(r.first(), Some(Cell::Text(t)) if t == label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workbook {
    pub title: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, title: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.title == title)
    }

    pub fn sheet_titles(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.title.as_str()).collect()
    }
}
