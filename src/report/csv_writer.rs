// src/report/csv_writer.rs
use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Sheet, Workbook};
use crate::models::FinancialBundle;
use crate::valuation::ValuationOutput;

pub const VALUATION_JSON: &str = "valuation.json";

/// "Scenario Comparison" -> "scenario_comparison".
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

pub fn sheet_file_name(index: usize, sheet: &Sheet) -> String {
    format!("{:02}_{}.csv", index + 1, slug(&sheet.title))
}

fn write_sheet(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    for row in &sheet.rows {
        if row.is_empty() {
            wtr.write_record([""])?;
        } else {
            wtr.write_record(row.iter().map(|c| c.display()))?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one CSV per sheet into `dir`, creating it if needed.
pub fn write_workbook(workbook: &Workbook, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(workbook.sheets.len());
    for (i, sheet) in workbook.sheets.iter().enumerate() {
        let path = dir.join(sheet_file_name(i, sheet));
        write_sheet(&path, sheet)?;
        written.push(path);
    }
    info!("Wrote {} sheets to {}", written.len(), dir.display());
    Ok(written)
}

#[derive(Serialize)]
struct ValuationDump<'a> {
    bundle: &'a FinancialBundle,
    valuation: &'a ValuationOutput,
}

/// Full machine-readable result next to the sheets.
pub fn write_valuation_json(dir: &Path, bundle: &FinancialBundle, output: &ValuationOutput) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(VALUATION_JSON);
    let json = serde_json::to_string_pretty(&ValuationDump {
        bundle,
        valuation: output,
    })?;
    fs::write(&path, json).with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(path)
}
