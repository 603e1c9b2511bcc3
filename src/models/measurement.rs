use serde::{Deserialize, Serialize};

use crate::error::{BadspotError, Result};
use crate::models::InputTable;
use crate::utils::constants::REQUIRED_COLUMNS;

/// One row of drive-test data. Numeric fields are `None` where the cell was empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,

    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,

    #[serde(rename = "PCI LTE")]
    pub pci: Option<i64>,

    #[serde(rename = "TAC")]
    pub tac: Option<i64>,

    #[serde(rename = "MCC")]
    pub mcc: Option<i64>,

    #[serde(rename = "MNC")]
    pub mnc: Option<i64>,

    #[serde(rename = "RSRP")]
    pub rsrp: Option<f64>,

    #[serde(rename = "RSRQ")]
    pub rsrq: Option<f64>,

    #[serde(rename = "DL EARFCN")]
    pub earfcn: Option<i64>,

    #[serde(rename = "Cat")]
    pub cat: Option<String>,
}

impl MeasurementRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        longitude: f64,
        latitude: f64,
        pci: i64,
        tac: i64,
        mcc: i64,
        mnc: i64,
        rsrp: f64,
        rsrq: f64,
        earfcn: i64,
        cat: &str,
    ) -> Self {
        Self {
            longitude: Some(longitude),
            latitude: Some(latitude),
            pci: Some(pci),
            tac: Some(tac),
            mcc: Some(mcc),
            mnc: Some(mnc),
            rsrp: Some(rsrp),
            rsrq: Some(rsrq),
            earfcn: Some(earfcn),
            cat: Some(cat.to_string()),
        }
    }

    /// Build a record from a table row. `index` holds the column position of each
    /// required field, in `REQUIRED_COLUMNS` order.
    pub(crate) fn from_row(
        table: &InputTable,
        row: usize,
        index: &[usize; REQUIRED_COLUMNS.len()],
    ) -> Result<Self> {
        let float = |field: usize| parse_float(table, row, index[field], REQUIRED_COLUMNS[field]);
        let int = |field: usize| parse_int(table, row, index[field], REQUIRED_COLUMNS[field]);

        Ok(Self {
            longitude: float(0)?,
            latitude: float(1)?,
            pci: int(2)?,
            tac: int(3)?,
            mcc: int(4)?,
            mnc: int(5)?,
            rsrp: float(6)?,
            rsrq: float(7)?,
            earfcn: int(8)?,
            cat: table.cell(row, index[9]).map(str::to_string),
        })
    }

    /// The nine numeric features followed by the encoded category, in model order
    pub fn feature_values(&self, encoded_cat: f64) -> [Option<f64>; REQUIRED_COLUMNS.len()] {
        [
            self.longitude,
            self.latitude,
            self.pci.map(|v| v as f64),
            self.tac.map(|v| v as f64),
            self.mcc.map(|v| v as f64),
            self.mnc.map(|v| v as f64),
            self.rsrp,
            self.rsrq,
            self.earfcn.map(|v| v as f64),
            Some(encoded_cat),
        ]
    }

    /// (latitude, longitude) when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn missing_numeric_fields(&self) -> Vec<&'static str> {
        let present = [
            self.longitude.is_some(),
            self.latitude.is_some(),
            self.pci.is_some(),
            self.tac.is_some(),
            self.mcc.is_some(),
            self.mnc.is_some(),
            self.rsrp.is_some(),
            self.rsrq.is_some(),
            self.earfcn.is_some(),
        ];

        present
            .iter()
            .zip(REQUIRED_COLUMNS.iter())
            .filter(|(present, _)| !**present)
            .map(|(_, name)| *name)
            .collect()
    }
}

fn parse_float(table: &InputTable, row: usize, column: usize, name: &str) -> Result<Option<f64>> {
    let Some(raw) = table.cell(row, column) else {
        return Ok(None);
    };

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| BadspotError::InvalidValue {
            row: row + 1,
            column: name.to_string(),
            value: raw.to_string(),
        })
}

/// Integer columns arrive as "510" from CSV and as "510" or "510.0" from spreadsheets.
fn parse_int(table: &InputTable, row: usize, column: usize, name: &str) -> Result<Option<i64>> {
    let Some(raw) = table.cell(row, column) else {
        return Ok(None);
    };

    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Some(value));
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(Some(value as i64)),
        _ => Err(BadspotError::InvalidValue {
            row: row + 1,
            column: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_row(values: &[&str]) -> InputTable {
        InputTable::new(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![values.iter().map(|v| v.to_string()).collect()],
        )
    }

    #[test]
    fn test_parse_complete_row() {
        let table = table_with_row(&[
            "106.8456", "-6.2088", "101", "2010", "510", "10", "-85.5", "-11", "1850.0", "Urban",
        ]);
        let records = table.records().unwrap();

        assert_eq!(
            records[0],
            MeasurementRecord::new(106.8456, -6.2088, 101, 2010, 510, 10, -85.5, -11.0, 1850, "Urban")
        );
        assert!(records[0].missing_numeric_fields().is_empty());
        assert_eq!(records[0].coordinates(), Some((-6.2088, 106.8456)));
    }

    #[test]
    fn test_parse_row_with_gaps() {
        let table = table_with_row(&["106.8", "", "101", "2010", "510", "10", "NaN", "-11", "1850", ""]);
        let record = &table.records().unwrap()[0];

        assert_eq!(record.latitude, None);
        assert_eq!(record.rsrp, None);
        assert_eq!(record.cat, None);
        assert_eq!(record.coordinates(), None);
        assert_eq!(record.missing_numeric_fields(), vec!["Latitude", "RSRP"]);
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let table = table_with_row(&["106.8", "-6.2", "abc", "2010", "510", "10", "-85", "-11", "1850", "Urban"]);

        match table.records() {
            Err(BadspotError::InvalidValue { row, column, value }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "PCI LTE");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_fractional_integer_is_rejected() {
        let table = table_with_row(&["106.8", "-6.2", "101.5", "2010", "510", "10", "-85", "-11", "1850", "Urban"]);
        assert!(table.records().is_err());
    }

    #[test]
    fn test_feature_values_order() {
        let record = MeasurementRecord::new(1.0, 2.0, 3, 4, 5, 6, 7.0, 8.0, 9, "x");
        let values = record.feature_values(10.0);
        let expected: Vec<Option<f64>> = (1..=10).map(|v| Some(v as f64)).collect();
        assert_eq!(values.to_vec(), expected);
    }
}
