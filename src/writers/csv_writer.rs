use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::models::{LabeledRecord, OutputRow};

/// Writes the augmented table: the ten input columns plus `Prediction` and `Label`
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_records(&self, records: &[LabeledRecord], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        self.write_to(records, BufWriter::new(file))?;

        tracing::info!(path = %path.display(), rows = records.len(), "wrote csv output");
        Ok(())
    }

    /// Serialize into memory, for publishing to the object store
    pub fn to_bytes(&self, records: &[LabeledRecord]) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(records, &mut buffer)?;
        Ok(buffer)
    }

    fn write_to<W: Write>(&self, records: &[LabeledRecord], sink: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(sink);

        for record in records {
            writer.serialize(OutputRow::from(record))?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeasurementRecord, PredictionLabel};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_layout() -> Result<()> {
        let mut record =
            MeasurementRecord::new(106.8, -6.2, 101, 2010, 510, 10, -75.0, -5.0, 1850, "Urban");
        record.tac = None;
        let rows = vec![LabeledRecord::new(record, 1, PredictionLabel::NonBadspot)];

        let text = String::from_utf8(CsvWriter::new().to_bytes(&rows)?).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,RSRQ,DL EARFCN,Cat,Prediction,Label",
                "106.8,-6.2,101,,510,10,-75.0,-5.0,1850,Urban,0,Non-Badspot",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_write_creates_parent_directory() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("output").join("predictions.csv");
        let record =
            MeasurementRecord::new(106.8, -6.2, 101, 2010, 510, 10, -90.0, -12.0, 1850, "Urban");

        CsvWriter::new().write_records(&[LabeledRecord::new(record, 1, PredictionLabel::Badspot)], &path)?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.trim_end().ends_with(",1,Badspot"));
        Ok(())
    }
}
