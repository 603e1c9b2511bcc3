pub mod csv_writer;
pub mod map_renderer;
pub mod parquet_writer;

pub use csv_writer::CsvWriter;
pub use map_renderer::{MapArtifact, MapRenderer};
pub use parquet_writer::{ParquetFileInfo, ParquetWriter};
