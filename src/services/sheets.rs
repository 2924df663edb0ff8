// src/services/sheets.rs
use anyhow::{anyhow, Result};
use log::{info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::google_oauth::{fetch_access_token, ServiceAccountKey};
use crate::report::{ChartKind, ChartSpec, ColumnRange, Sheet, Workbook};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub service_account_json_path: String,
}

/// `'DCF Base'!A1`
pub fn sheet_range(title: &str) -> String {
    format!("'{}'!A1", title.replace('\'', "''"))
}

pub fn sheet_values(sheet: &Sheet) -> Vec<Vec<Value>> {
    sheet
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.raw_value()).collect())
        .collect()
}

pub fn add_sheet_request(sheet: &Sheet) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": sheet.title,
                "gridProperties": {
                    "rowCount": (sheet.row_count() + 20).max(100),
                    "columnCount": (sheet.column_count() + 12).max(26),
                    "frozenRowCount": sheet.frozen_rows
                }
            }
        }
    })
}

fn grid_range(sheet_id: i64, range: &ColumnRange) -> Value {
    json!({
        "sheetId": sheet_id,
        "startRowIndex": range.start_row,
        "endRowIndex": range.end_row,
        "startColumnIndex": range.column,
        "endColumnIndex": range.column + 1
    })
}

/// `addChart` request placing the chart to the right of the sheet's data.
pub fn add_chart_request(sheet_id: i64, chart: &ChartSpec, anchor_column: usize) -> Value {
    let chart_type = match chart.kind {
        ChartKind::Column => "COLUMN",
        ChartKind::Line => "LINE",
    };
    let series: Vec<Value> = chart
        .series
        .iter()
        .map(|s| {
            json!({
                "series": { "sourceRange": { "sources": [grid_range(sheet_id, s)] } },
                "targetAxis": "LEFT_AXIS"
            })
        })
        .collect();

    json!({
        "addChart": {
            "chart": {
                "spec": {
                    "title": chart.title,
                    "basicChart": {
                        "chartType": chart_type,
                        "legendPosition": "BOTTOM_LEGEND",
                        "headerCount": 1,
                        "domains": [{
                            "domain": { "sourceRange": { "sources": [grid_range(sheet_id, &chart.domain)] } }
                        }],
                        "series": series
                    }
                },
                "position": {
                    "overlayPosition": {
                        "anchorCell": {
                            "sheetId": sheet_id,
                            "rowIndex": chart.domain.start_row,
                            "columnIndex": anchor_column
                        }
                    }
                }
            }
        }
    })
}

/// Title -> sheetId from a spreadsheet metadata response.
pub fn sheet_ids(metadata: &Value) -> HashMap<String, i64> {
    metadata["sheets"]
        .as_array()
        .map(|sheets| {
            sheets
                .iter()
                .filter_map(|s| {
                    let props = &s["properties"];
                    Some((props["title"].as_str()?.to_string(), props["sheetId"].as_i64()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct SheetsPublisher {
    pub config: SheetsConfig,
    client: Client,
}

impl SheetsPublisher {
    pub fn new(config: SheetsConfig) -> Self {
        SheetsPublisher {
            config,
            client: Client::new(),
        }
    }

    pub async fn get_auth_token(&self) -> Result<String> {
        let key = ServiceAccountKey::from_file(&self.config.service_account_json_path)?;
        fetch_access_token(&self.client, &key).await
    }

    async fn metadata(&self, token: &str) -> Result<Value> {
        let url = format!("{}/{}?includeGridData=false", SHEETS_API, self.config.spreadsheet_id);
        let response = self.client.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Failed to get spreadsheet info: {} - {}", status, error_text));
        }
        Ok(response.json().await?)
    }

    async fn batch_update(&self, token: &str, requests: Vec<Value>) -> Result<Value> {
        let url = format!("{}/{}:batchUpdate", SHEETS_API, self.config.spreadsheet_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("batchUpdate failed: {} - {}", status, error_text));
        }
        Ok(response.json().await?)
    }

    async fn write_values(&self, token: &str, sheet: &Sheet) -> Result<()> {
        let range = sheet_range(&sheet.title);
        let clear_url = format!(
            "{}/{}/values/{}:clear",
            SHEETS_API, self.config.spreadsheet_id, range
        );
        self.client
            .post(&clear_url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?;

        let url = format!("{}/{}/values/{}", SHEETS_API, self.config.spreadsheet_id, range);
        self.client
            .put(&url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({
                "values": sheet_values(sheet),
                "majorDimension": "ROWS"
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Creates missing tabs, overwrites every tab's values and adds charts to
    /// tabs created by this call. Returns the spreadsheet URL.
    pub async fn publish(&self, workbook: &Workbook) -> Result<String> {
        let token = self.get_auth_token().await?;
        let mut ids = sheet_ids(&self.metadata(&token).await?);

        let missing: Vec<&Sheet> = workbook
            .sheets
            .iter()
            .filter(|s| !ids.contains_key(&s.title))
            .collect();
        if !missing.is_empty() {
            info!("Creating {} sheets", missing.len());
            let reply = self
                .batch_update(&token, missing.iter().map(|s| add_sheet_request(s)).collect())
                .await?;
            for r in reply["replies"].as_array().into_iter().flatten() {
                let props = &r["addSheet"]["properties"];
                if let (Some(title), Some(id)) = (props["title"].as_str(), props["sheetId"].as_i64()) {
                    ids.insert(title.to_string(), id);
                }
            }
        }

        for sheet in &workbook.sheets {
            info!("Writing '{}' ({} rows)", sheet.title, sheet.row_count());
            self.write_values(&token, sheet).await?;
        }

        let mut chart_requests = Vec::new();
        for sheet in missing.iter().filter(|s| !s.charts.is_empty()) {
            match ids.get(&sheet.title) {
                Some(&id) => chart_requests.extend(
                    sheet
                        .charts
                        .iter()
                        .map(|c| add_chart_request(id, c, sheet.column_count() + 1)),
                ),
                None => warn!("No sheetId for '{}', skipping charts", sheet.title),
            }
        }
        if !chart_requests.is_empty() {
            info!("Adding {} charts", chart_requests.len());
            self.batch_update(&token, chart_requests).await?;
        }

        Ok(format!(
            "https://docs.google.com/spreadsheets/d/{}",
            self.config.spreadsheet_id
        ))
    }
}
