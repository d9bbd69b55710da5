//! Monthly electricity consumption profiles.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use pv_model::MONTHS;
use tracing::debug;

/// Represents monthly energy consumption in kWh, January first.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyProfile {
    monthly_kwh: Vec<f64>,
}

impl MonthlyProfile {
    /// Profile from twelve non-negative monthly values.
    pub fn new(monthly_kwh: Vec<f64>) -> Result<Self> {
        if monthly_kwh.len() != MONTHS {
            bail!("Expected {MONTHS} monthly values, got {}", monthly_kwh.len());
        }
        if let Some((month, value)) = monthly_kwh
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            bail!("Invalid consumption for month {}: {value}", month + 1);
        }
        Ok(Self { monthly_kwh })
    }

    /// Spreads an annual total evenly over the months.
    pub fn flat(annual_kwh: f64) -> Result<Self> {
        Self::new(vec![annual_kwh / MONTHS as f64; MONTHS])
    }

    /// Consumption of `month` (1 = January).
    pub fn get(&self, month: u32) -> Option<f64> {
        let index = usize::try_from(month).ok()?.checked_sub(1)?;
        self.monthly_kwh.get(index).copied()
    }

    pub fn annual_total(&self) -> f64 {
        self.monthly_kwh.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.monthly_kwh
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.monthly_kwh
    }

    /// Loads a profile, choosing the parser from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xls" | "ods") => Self::load_workbook(path),
            _ => Self::load_csv(path),
        }
    }

    /// Loads twelve monthly values in kWh from a CSV file.
    ///
    /// The value is taken from the last column of each row, so both a bare
    /// column and `month,kwh` layouts work. Rows that do not hold a number
    /// (headers, notes) are skipped. Semicolon-separated files may use a
    /// decimal comma.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let delimiter = if content.contains(';') { b';' } else { b',' };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let mut values = Vec::with_capacity(MONTHS);
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read line {}", line + 1))?;
            let Some(cell) = record.iter().rev().find(|c| !c.is_empty()) else {
                continue;
            };
            match parse_number(cell) {
                Some(value) => values.push(value),
                None => debug!(line = line + 1, cell, "skipping non-numeric row"),
            }
        }
        Self::new(values).with_context(|| format!("Invalid profile in {}", path.display()))
    }

    /// Loads twelve monthly values from the first worksheet of a workbook.
    pub fn load_workbook(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
        let Some(sheet) = workbook.sheet_names().first().cloned() else {
            bail!("No sheets found in {}", path.display());
        };
        let range = workbook
            .worksheet_range(&sheet)
            .with_context(|| format!("Failed to read worksheet `{sheet}`"))?;

        let values: Vec<f64> = range
            .rows()
            .filter_map(|row| {
                row.iter().rev().find_map(|cell| match cell {
                    Data::Float(v) => Some(*v),
                    Data::Int(v) => Some(*v as f64),
                    Data::String(s) => parse_number(s),
                    _ => None,
                })
            })
            .collect();
        Self::new(values).with_context(|| format!("Invalid profile in {}", path.display()))
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace(',', ".");
    cleaned.parse::<f64>().ok()
}
