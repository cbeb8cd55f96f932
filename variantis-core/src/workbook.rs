//! Named tables and the spreadsheet writer that persists them

use std::path::Path;

use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};

use crate::artifacts::write_atomic;
use crate::error::{Result, VariantisError};

/// Longest worksheet name the xlsx format accepts
const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// One sheet: a header row followed by data rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(name: S, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Cell at `row` (0 = first data row) under the column named `header`
    pub fn cell(&self, row: usize, header: &str) -> Option<&Cell> {
        let col = self.headers.iter().position(|h| h == header)?;
        self.rows.get(row)?.get(col)
    }
}

/// Persists a set of tables as one workbook artifact
pub trait WorkbookWriter: Send + Sync {
    fn write(&self, path: &Path, sheets: &[Table]) -> Result<()>;
}

/// Writes `.xlsx` files with rust_xlsxwriter, one worksheet per table
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxWorkbookWriter;

impl WorkbookWriter for XlsxWorkbookWriter {
    fn write(&self, path: &Path, sheets: &[Table]) -> Result<()> {
        if sheets.is_empty() {
            return Err(VariantisError::workbook(format!(
                "no tables to write to {}",
                path.display()
            )));
        }

        let mut workbook = Workbook::new();
        for table in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet_name(&table.name))?;

            for (col, header) in table.headers.iter().enumerate() {
                worksheet.write_string(0, col as u16, header)?;
            }
            for (r, row) in table.rows.iter().enumerate() {
                let r = (r + 1) as u32;
                for (col, cell) in row.iter().enumerate() {
                    let col = col as u16;
                    match cell {
                        Cell::Text(text) => worksheet.write_string(r, col, text)?,
                        Cell::Int(value) => worksheet.write_number(r, col, *value as f64)?,
                        Cell::Float(value) => worksheet.write_number(r, col, *value)?,
                    };
                }
            }
        }

        let buffer = workbook.save_to_buffer()?;
        write_atomic(path, &buffer)?;
        log::debug!("Wrote {} sheet(s) to {}", sheets.len(), path.display());
        Ok(())
    }
}

fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}
