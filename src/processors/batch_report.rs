use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{InputTable, MeasurementRecord};
use crate::processors::predictor::PredictionOutcome;
use crate::utils::constants::{COL_CAT, REQUIRED_COLUMNS};
use crate::utils::coordinates::validate_coordinates;

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total_rows: usize,
    pub missing_columns: Vec<String>,
    /// Empty cells per required column, only columns with at least one gap
    pub missing_cells: BTreeMap<String, usize>,
    pub rows_without_coordinates: usize,
    pub coordinate_violations: Vec<CoordinateViolation>,
    pub prediction: Option<PredictionStatistics>,
}

#[derive(Debug, Clone)]
pub struct CoordinateViolation {
    /// 1-based input row
    pub row: usize,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionStatistics {
    pub predicted_rows: usize,
    pub dropped_rows: usize,
    pub imputed_cells: usize,
    pub badspots: usize,
    pub non_badspots: usize,
    pub overridden: usize,
}

impl BatchReport {
    pub fn has_schema_errors(&self) -> bool {
        !self.missing_columns.is_empty()
    }

    pub fn total_missing_cells(&self) -> usize {
        self.missing_cells.values().sum()
    }
}

pub struct BatchChecker;

impl BatchChecker {
    pub fn new() -> Self {
        Self
    }

    /// Inspect an uploaded table before prediction. Missing columns are reported rather
    /// than raised; unparseable numeric cells are still an error.
    pub fn check_table(&self, table: &InputTable) -> Result<BatchReport> {
        let mut report = BatchReport {
            total_rows: table.len(),
            missing_columns: table.missing_columns(&REQUIRED_COLUMNS),
            ..Default::default()
        };

        if report.has_schema_errors() {
            return Ok(report);
        }

        for (i, record) in table.records()?.iter().enumerate() {
            self.check_record(i + 1, record, &mut report);
        }

        Ok(report)
    }

    fn check_record(&self, row: usize, record: &MeasurementRecord, report: &mut BatchReport) {
        for field in record.missing_numeric_fields() {
            *report.missing_cells.entry(field.to_string()).or_default() += 1;
        }
        if record.cat.is_none() {
            *report.missing_cells.entry(COL_CAT.to_string()).or_default() += 1;
        }

        match record.coordinates() {
            Some((lat, lon)) => {
                if let Err(e) = validate_coordinates(lat, lon) {
                    report.coordinate_violations.push(CoordinateViolation {
                        row,
                        details: e.to_string(),
                    });
                }
            }
            None => report.rows_without_coordinates += 1,
        }
    }

    /// Fold prediction counts into an existing report
    pub fn record_outcome(&self, report: &mut BatchReport, outcome: &PredictionOutcome) {
        let badspots = outcome.badspot_count();
        report.prediction = Some(PredictionStatistics {
            predicted_rows: outcome.labeled.len(),
            dropped_rows: outcome.dropped_rows.len(),
            imputed_cells: outcome.imputed_cells,
            badspots,
            non_badspots: outcome.labeled.len() - badspots,
            overridden: outcome.overridden_count(),
        });
    }

    pub fn generate_summary(&self, report: &BatchReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Batch Report ===\n");
        summary.push_str(&format!("Total Rows: {}\n", report.total_rows));

        if report.has_schema_errors() {
            summary.push_str(&format!(
                "Missing Columns: {}\n",
                report.missing_columns.join(", ")
            ));
            return summary;
        }

        summary.push_str(&format!(
            "Missing Cells: {} (imputed from batch means at prediction time)\n",
            report.total_missing_cells()
        ));
        for (column, count) in &report.missing_cells {
            summary.push_str(&format!("  {}: {}\n", column, count));
        }
        summary.push_str(&format!(
            "Rows Without Coordinates: {}\n",
            report.rows_without_coordinates
        ));
        summary.push_str(&format!(
            "Coordinate Violations: {}\n",
            report.coordinate_violations.len()
        ));
        for violation in report.coordinate_violations.iter().take(10) {
            summary.push_str(&format!("  Row {}: {}\n", violation.row, violation.details));
        }

        if let Some(stats) = &report.prediction {
            let share = |n: usize| {
                if stats.predicted_rows == 0 {
                    0.0
                } else {
                    100.0 * n as f64 / stats.predicted_rows as f64
                }
            };

            summary.push_str(&format!("\nPredicted Rows: {}\n", stats.predicted_rows));
            summary.push_str(&format!(
                "Badspot: {} ({:.1}%)\n",
                stats.badspots,
                share(stats.badspots)
            ));
            summary.push_str(&format!(
                "Non-Badspot: {} ({:.1}%)\n",
                stats.non_badspots,
                share(stats.non_badspots)
            ));
            summary.push_str(&format!(
                "Overridden by signal rule: {}\n",
                stats.overridden
            ));
            if stats.dropped_rows > 0 {
                summary.push_str(&format!("Dropped Rows: {}\n", stats.dropped_rows));
            }
        }

        summary
    }
}

impl Default for BatchChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabeledRecord, PredictionLabel};

    fn table(rows: &[[&str; 10]]) -> InputTable {
        InputTable::new(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_reports_missing_columns_without_failing() -> Result<()> {
        let table = InputTable::new(vec!["RSRP".to_string()], vec![vec!["-80".to_string()]]);
        let checker = BatchChecker::new();
        let report = checker.check_table(&table)?;

        assert!(report.has_schema_errors());
        assert_eq!(report.missing_columns.len(), 9);
        assert!(checker.generate_summary(&report).contains("Missing Columns: Longitude"));
        Ok(())
    }

    #[test]
    fn test_counts_gaps_and_bad_coordinates() -> Result<()> {
        let table = table(&[
            ["106.8", "-6.2", "101", "2010", "510", "10", "", "-11", "1850", "Urban"],
            ["106.8", "95.0", "101", "2010", "510", "10", "-80", "-11", "1850", "Urban"],
            ["", "-6.2", "101", "2010", "510", "10", "-80", "", "1850", ""],
        ]);
        let report = BatchChecker::new().check_table(&table)?;

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.missing_cells.get("RSRP"), Some(&1));
        assert_eq!(report.missing_cells.get("RSRQ"), Some(&1));
        assert_eq!(report.missing_cells.get("Cat"), Some(&1));
        assert_eq!(report.total_missing_cells(), 4);
        assert_eq!(report.rows_without_coordinates, 1);
        assert_eq!(report.coordinate_violations.len(), 1);
        assert_eq!(report.coordinate_violations[0].row, 2);
        Ok(())
    }

    #[test]
    fn test_record_outcome() -> Result<()> {
        let table = table(&[["106.8", "-6.2", "101", "2010", "510", "10", "-75", "-5", "1850", "Urban"]]);
        let checker = BatchChecker::new();
        let mut report = checker.check_table(&table)?;

        let record = table.records()?.remove(0);
        let outcome = PredictionOutcome {
            labeled: vec![LabeledRecord::new(record, 1, PredictionLabel::NonBadspot)],
            dropped_rows: Vec::new(),
            imputed_cells: 0,
        };
        checker.record_outcome(&mut report, &outcome);

        let stats = report.prediction.clone().unwrap();
        assert_eq!(stats.non_badspots, 1);
        assert_eq!(stats.overridden, 1);
        assert!(checker
            .generate_summary(&report)
            .contains("Overridden by signal rule: 1"));
        Ok(())
    }
}
