pub mod batch_report;
pub mod predictor;
pub mod preprocessor;

pub use batch_report::{BatchChecker, BatchReport, CoordinateViolation, PredictionStatistics};
pub use predictor::{OverridePolicy, PredictionEngine, PredictionOutcome};
pub use preprocessor::{impute_column_means, EncodingPolicy, FeaturePreprocessor, PreparedBatch};
