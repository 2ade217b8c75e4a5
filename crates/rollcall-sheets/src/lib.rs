//! rollcall-sheets — Append-only attendance rows over HTTP.
//!
//! The remote store is a spreadsheet reached through a values-append
//! endpoint: each call posts a 2-D array of string cells into a named
//! range. Calls are synchronous and blocking; failures are classified
//! so the caller can log and continue.

use chrono::{DateTime, Local};
use thiserror::Error;

/// Header row written once at startup. Appended unconditionally, so
/// repeated runs stack duplicate headers in the sheet.
pub const HEADER_ROW: [&str; 4] = ["Name", "Roll Number", "Time", "Section"];

/// Timestamp format for the `Time` cell.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sink failures, classified for the log-and-continue policy.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),
    #[error("quota exhausted (HTTP 429)")]
    Quota,
    #[error("api error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
}

/// One attendance event, ready to be appended as a spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRow {
    pub name: String,
    pub roll_number: String,
    pub time: String,
    pub section: String,
}

impl AttendanceRow {
    pub fn new(name: &str, roll_number: &str, section: &str, at: DateTime<Local>) -> Self {
        Self {
            name: name.to_string(),
            roll_number: roll_number.to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            section: section.to_string(),
        }
    }

    /// Cells in sheet column order: Name, Roll Number, Time, Section.
    pub fn cells(&self) -> [String; 4] {
        [
            self.name.clone(),
            self.roll_number.clone(),
            self.time.clone(),
            self.section.clone(),
        ]
    }
}

/// Destination for attendance events.
pub trait AttendanceSink {
    /// Append the header row.
    fn write_header(&mut self) -> Result<(), SinkError>;
    /// Append one attendance event.
    fn append_row(&mut self, row: &AttendanceRow) -> Result<(), SinkError>;
}

/// Connection settings for the spreadsheet API.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// API origin, e.g. "https://sheets.googleapis.com".
    pub base_url: String,
    pub spreadsheet_id: String,
    /// A1-notation target range, e.g. "Sheet1!A1:D1".
    pub range: String,
    /// Bearer token presented on every call.
    pub token: String,
}

/// HTTP client for the spreadsheet values-append endpoint.
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    config: SheetsConfig,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            config,
        }
    }

    fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.config.base_url, self.config.spreadsheet_id, self.config.range
        )
    }

    fn append_cells(&self, values: Vec<Vec<String>>) -> Result<(), SinkError> {
        let response = self
            .http
            .post(self.append_url())
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "values": values }))
            .send()
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(classify_status(status.as_u16(), body))
    }
}

impl AttendanceSink for SheetsClient {
    fn write_header(&mut self) -> Result<(), SinkError> {
        let header = HEADER_ROW.iter().map(|c| c.to_string()).collect();
        self.append_cells(vec![header])?;
        tracing::info!(range = %self.config.range, "header row appended");
        Ok(())
    }

    fn append_row(&mut self, row: &AttendanceRow) -> Result<(), SinkError> {
        self.append_cells(vec![row.cells().to_vec()])?;
        tracing::info!(name = %row.name, time = %row.time, "attendance row appended");
        Ok(())
    }
}

/// Map a non-success HTTP status onto the sink error taxonomy.
fn classify_status(status: u16, body: String) -> SinkError {
    match status {
        401 | 403 => SinkError::Auth(status),
        429 => SinkError::Quota,
        _ => SinkError::Api { status, body },
    }
}
