pub mod labeled;
pub mod measurement;
pub mod table;

pub use labeled::{LabeledRecord, OutputRow, PredictionLabel};
pub use measurement::MeasurementRecord;
pub use table::InputTable;
