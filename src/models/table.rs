use crate::error::{BadspotError, Result};
use crate::models::MeasurementRecord;
use crate::utils::constants::{MISSING_MARKERS, REQUIRED_COLUMNS};

/// A spreadsheet as uploaded: one header row and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl InputTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact, case-sensitive name. First occurrence wins.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Names from `required` that are not columns of this table
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BadspotError::Schema { missing })
        }
    }

    /// Cell contents, or `None` when the cell holds a missing-value marker
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(column)?.trim();
        if MISSING_MARKERS.contains(&value) {
            None
        } else {
            Some(value)
        }
    }

    /// Project every row onto the ten measurement fields.
    ///
    /// Fails with `Schema` before touching any row when a required column is absent.
    pub fn records(&self) -> Result<Vec<MeasurementRecord>> {
        self.require_columns(&REQUIRED_COLUMNS)?;

        let mut index = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in index.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
            *slot = self
                .column_index(name)
                .ok_or_else(|| BadspotError::Schema {
                    missing: vec![name.to_string()],
                })?;
        }

        (0..self.len())
            .map(|row| MeasurementRecord::from_row(self, row, &index))
            .collect()
    }
}
