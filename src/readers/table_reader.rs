use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::WINDOWS_1252;
use std::path::Path;

use crate::error::{BadspotError, Result};
use crate::models::InputTable;

/// Uploaded file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Spreadsheet,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TableFormat::Spreadsheet),
            "csv" => Ok(TableFormat::Csv),
            _ => Err(BadspotError::InvalidFormat(format!(
                "Unsupported input file '{}': expected .xlsx, .xls, .ods or .csv",
                path.display()
            ))),
        }
    }
}

/// Reads the first worksheet of an uploaded file into an [`InputTable`].
/// The first row is the header and is kept verbatim.
pub struct TableReader;

impl TableReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<InputTable> {
        let table = match TableFormat::from_path(path)? {
            TableFormat::Spreadsheet => Self::read_spreadsheet(path)?,
            TableFormat::Csv => Self::read_csv_bytes(&std::fs::read(path)?)?,
        };

        tracing::info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns().len(),
            "read input table"
        );

        Ok(table)
    }

    fn read_spreadsheet(path: &Path) -> Result<InputTable> {
        let mut workbook = open_workbook_auto(path)?;

        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            BadspotError::InvalidFormat(format!("'{}' contains no worksheets", path.display()))
        })??;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<String>>());

        let columns = rows.next().ok_or_else(|| {
            BadspotError::InvalidFormat(format!("'{}' has no header row", path.display()))
        })?;
        let rows = rows.filter(|row| row.iter().any(|c| !c.trim().is_empty())).collect();

        Ok(InputTable::new(columns, rows))
    }

    /// Parse CSV bytes. UTF-8 is tried first, falling back to Windows-1252.
    pub fn read_csv_bytes(bytes: &[u8]) -> Result<InputTable> {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => std::borrow::Cow::Borrowed(text),
            Err(_) => {
                let (decoded, _, _) = WINDOWS_1252.decode(bytes);
                decoded
            }
        };
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(text.as_bytes());

        let columns = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(InputTable::new(columns, rows))
    }
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,RSRQ,DL EARFCN,Cat";

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            TableFormat::from_path(Path::new("drive.XLSX")).unwrap(),
            TableFormat::Spreadsheet
        );
        assert_eq!(TableFormat::from_path(Path::new("drive.csv")).unwrap(), TableFormat::Csv);
        assert!(TableFormat::from_path(Path::new("drive.txt")).is_err());
    }

    #[test]
    fn test_read_csv_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
        writeln!(file, "{}", HEADER)?;
        writeln!(file, "106.8,-6.2,101,2010,510,10,-85,-11,1850,Urban")?;
        writeln!(file, ",,,,,,,,,")?;
        writeln!(file, "106.9,-6.3,102,2010,510,10,,-14,1850,Rural")?;
        file.flush()?;

        let table = TableReader::new().read(file.path())?;

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns()[2], "PCI LTE");
        assert_eq!(table.cell(1, 6), None);
        assert_eq!(table.cell(1, 9), Some("Rural"));
        Ok(())
    }

    #[test]
    fn test_csv_bom_and_latin1_fallback() -> Result<()> {
        let mut bytes = b"\xef\xbb\xbfCat,RSRP\nUrban,-80\n".to_vec();
        let table = TableReader::read_csv_bytes(&bytes)?;
        assert_eq!(table.column_index("Cat"), Some(0));

        // "Pérou" in Windows-1252
        bytes = b"Cat,RSRP\nP\xe9rou,-80\n".to_vec();
        let table = TableReader::read_csv_bytes(&bytes)?;
        assert_eq!(table.cell(0, 0), Some("Pérou"));
        Ok(())
    }

    #[test]
    fn test_headers_are_not_trimmed() -> Result<()> {
        let table = TableReader::read_csv_bytes(b"Cat, RSRP\n Urban , -80\n")?;

        assert_eq!(table.columns()[1], " RSRP");
        assert_eq!(table.column_index("RSRP"), None);
        assert_eq!(table.missing_columns(&["Cat", "RSRP"]), vec!["RSRP"]);
        assert_eq!(table.cell(0, 0), Some("Urban"));
        Ok(())
    }

    #[test]
    fn test_short_rows_are_padded() -> Result<()> {
        let table = TableReader::read_csv_bytes(b"A,B,C\n1,2\n")?;
        assert_eq!(table.cell(0, 1), Some("2"));
        assert_eq!(table.cell(0, 2), None);
        Ok(())
    }

    #[test]
    fn test_read_xlsx_fixture() -> Result<()> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/drive_test.xlsx");
        let table = TableReader::new().read(&path)?;

        assert_eq!(table.columns()[2], "PCI LTE");
        assert!(table
            .missing_columns(&crate::utils::constants::REQUIRED_COLUMNS)
            .is_empty());
        // The blank third sheet row is skipped
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, 0), Some("106.8"));
        assert_eq!(table.cell(0, 2), Some("101"));
        assert_eq!(table.cell(1, 9), Some("Rural"));
        assert_eq!(table.cell(2, 7), None);
        assert_eq!(table.cell(2, 9), Some("2"));
        Ok(())
    }

    #[test]
    fn test_unreadable_spreadsheet() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(TableReader::new().read(file.path()).is_err());
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_string(&Data::Float(510.0)), "510");
        assert_eq!(cell_to_string(&Data::Float(-6.25)), "-6.25");
        assert_eq!(cell_to_string(&Data::Int(1850)), "1850");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
