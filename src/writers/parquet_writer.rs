use crate::error::{BadspotError, Result};
use crate::models::{LabeledRecord, MeasurementRecord, PredictionLabel};
use crate::utils::constants::{
    COL_CAT, COL_EARFCN, COL_LABEL, COL_LATITUDE, COL_LONGITUDE, COL_MCC, COL_MNC, COL_PCI,
    COL_PREDICTION, COL_RSRP, COL_RSRQ, COL_TAC, COMPRESSION_GZIP, COMPRESSION_LZ4,
    COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD, DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(BadspotError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write labeled records to a Parquet file. An empty slice still produces a
    /// schema-only file.
    pub fn write_records(&self, records: &[LabeledRecord], path: &Path) -> Result<()> {
        let schema = Self::create_schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(self.row_group_size.max(1)) {
            let batch = Self::records_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        tracing::info!(path = %path.display(), rows = records.len(), "wrote parquet output");
        Ok(())
    }

    /// Input columns are nullable since gaps survive into the output
    fn create_schema() -> Arc<Schema> {
        let fields = vec![
            Field::new(COL_LONGITUDE, DataType::Float64, true),
            Field::new(COL_LATITUDE, DataType::Float64, true),
            Field::new(COL_PCI, DataType::Int64, true),
            Field::new(COL_TAC, DataType::Int64, true),
            Field::new(COL_MCC, DataType::Int64, true),
            Field::new(COL_MNC, DataType::Int64, true),
            Field::new(COL_RSRP, DataType::Float64, true),
            Field::new(COL_RSRQ, DataType::Float64, true),
            Field::new(COL_EARFCN, DataType::Int64, true),
            Field::new(COL_CAT, DataType::Utf8, true),
            Field::new(COL_PREDICTION, DataType::UInt8, false),
            Field::new(COL_LABEL, DataType::Utf8, false),
        ];

        Arc::new(Schema::new(fields))
    }

    fn records_to_batch(records: &[LabeledRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
        let float = |f: fn(&MeasurementRecord) -> Option<f64>| -> ArrayRef {
            Arc::new(Float64Array::from(
                records.iter().map(|r| f(&r.record)).collect::<Vec<_>>(),
            ))
        };
        let int = |f: fn(&MeasurementRecord) -> Option<i64>| -> ArrayRef {
            Arc::new(Int64Array::from(
                records.iter().map(|r| f(&r.record)).collect::<Vec<_>>(),
            ))
        };

        let cats: Vec<Option<&str>> = records.iter().map(|r| r.record.cat.as_deref()).collect();
        let predictions: Vec<u8> = records.iter().map(|r| r.prediction.as_u8()).collect();
        let labels: Vec<&str> = records.iter().map(|r| r.prediction.label_text()).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                float(|r| r.longitude),
                float(|r| r.latitude),
                int(|r| r.pci),
                int(|r| r.tac),
                int(|r| r.mcc),
                int(|r| r.mnc),
                float(|r| r.rsrp),
                float(|r| r.rsrq),
                int(|r| r.earfcn),
                Arc::new(StringArray::from(cats)),
                Arc::new(UInt8Array::from(predictions)),
                Arc::new(StringArray::from(labels)),
            ],
        )?;

        Ok(batch)
    }

    /// Read back up to `limit` rows. The raw classifier output is not stored, so
    /// it is reported equal to the final label.
    pub fn read_sample_records(&self, path: &Path, limit: usize) -> Result<Vec<LabeledRecord>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path)?;
        let parquet_reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.clamp(1, 8192))
            .build()?;

        let mut records = Vec::new();

        for batch_result in parquet_reader {
            let batch = batch_result?;

            let longitudes = column::<Float64Array>(&batch, COL_LONGITUDE)?;
            let latitudes = column::<Float64Array>(&batch, COL_LATITUDE)?;
            let pcis = column::<Int64Array>(&batch, COL_PCI)?;
            let tacs = column::<Int64Array>(&batch, COL_TAC)?;
            let mccs = column::<Int64Array>(&batch, COL_MCC)?;
            let mncs = column::<Int64Array>(&batch, COL_MNC)?;
            let rsrps = column::<Float64Array>(&batch, COL_RSRP)?;
            let rsrqs = column::<Float64Array>(&batch, COL_RSRQ)?;
            let earfcns = column::<Int64Array>(&batch, COL_EARFCN)?;
            let cats = column::<StringArray>(&batch, COL_CAT)?;
            let predictions = column::<UInt8Array>(&batch, COL_PREDICTION)?;

            for i in 0..batch.num_rows() {
                if records.len() >= limit {
                    return Ok(records);
                }

                let record = MeasurementRecord {
                    longitude: optional(longitudes, i),
                    latitude: optional(latitudes, i),
                    pci: optional(pcis, i),
                    tac: optional(tacs, i),
                    mcc: optional(mccs, i),
                    mnc: optional(mncs, i),
                    rsrp: optional(rsrps, i),
                    rsrq: optional(rsrqs, i),
                    earfcn: optional(earfcns, i),
                    cat: (!cats.is_null(i)).then(|| cats.value(i).to_string()),
                };
                let prediction = PredictionLabel::from_u8(predictions.value(i))?;

                records.push(LabeledRecord::new(record, prediction.as_u8(), prediction));
            }
        }

        Ok(records)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = std::fs::metadata(path)?.len();

        let mut row_group_sizes = Vec::new();
        let mut compression = self.compression;
        for i in 0..row_groups {
            let rg_metadata = metadata.row_group(i);
            row_group_sizes.push(rg_metadata.num_rows());
            if i == 0 && rg_metadata.num_columns() > 0 {
                compression = rg_metadata.column(0).compression();
            }
        }

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| BadspotError::InvalidFormat(format!("Invalid or missing '{}' column", name)))
}

fn optional<T: ArrowPrimitiveType>(array: &PrimitiveArray<T>, i: usize) -> Option<T::Native> {
    if array.is_null(i) {
        None
    } else {
        Some(array.value(i))
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} KB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression,
            self.total_rows as f64 / self.row_groups.max(1) as f64
        )
    }
}
