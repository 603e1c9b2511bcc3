use thiserror::Error;

pub type Result<T> = std::result::Result<T, BadspotError>;

#[derive(Error, Debug)]
pub enum BadspotError {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Artifact '{object}' unavailable: {reason}")]
    ArtifactUnavailable { object: String, reason: String },

    #[error("The input data does not contain all required columns (missing: {})", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Unseen category value(s) in column '{column}': {}", values.join(", "))]
    Encoding { column: String, values: Vec<String> },

    #[error("Error making predictions: {source}")]
    Prediction {
        #[source]
        source: Box<BadspotError>,
    },

    #[error("Invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Shape mismatch in {context}: expected {expected} features, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Empty batch: {0}")]
    EmptyBatch(String),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Object '{object}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, object: String },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<config::ConfigError> for BadspotError {
    fn from(err: config::ConfigError) -> Self {
        BadspotError::Config(err.to_string())
    }
}

impl BadspotError {
    /// Wrap a failure raised while producing predictions.
    pub fn prediction(source: BadspotError) -> Self {
        match source {
            already @ BadspotError::Prediction { .. } => already,
            other => BadspotError::Prediction {
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `Prediction` wrappers.
    pub fn cause(&self) -> &BadspotError {
        match self {
            BadspotError::Prediction { source } => source.cause(),
            other => other,
        }
    }

    pub fn artifact_unavailable(object: &str, reason: impl ToString) -> Self {
        BadspotError::ArtifactUnavailable {
            object: object.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short message suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self.cause() {
            BadspotError::Schema { .. } => {
                format!("The uploaded file does not contain all required columns. {}", self.cause())
            }
            BadspotError::Credential(_) => format!("Could not connect to storage. {}", self.cause()),
            BadspotError::ArtifactUnavailable { .. } | BadspotError::ObjectNotFound { .. } => {
                format!("Could not load the prediction model. {}", self)
            }
            _ => self.to_string(),
        }
    }
}
