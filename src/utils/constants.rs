/// Input column names, in feature order
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_PCI: &str = "PCI LTE";
pub const COL_TAC: &str = "TAC";
pub const COL_MCC: &str = "MCC";
pub const COL_MNC: &str = "MNC";
pub const COL_RSRP: &str = "RSRP";
pub const COL_RSRQ: &str = "RSRQ";
pub const COL_EARFCN: &str = "DL EARFCN";
pub const COL_CAT: &str = "Cat";

pub const REQUIRED_COLUMNS: [&str; 10] = [
    COL_LONGITUDE,
    COL_LATITUDE,
    COL_PCI,
    COL_TAC,
    COL_MCC,
    COL_MNC,
    COL_RSRP,
    COL_RSRQ,
    COL_EARFCN,
    COL_CAT,
];

pub const FEATURE_COUNT: usize = REQUIRED_COLUMNS.len();

/// Output column names
pub const COL_PREDICTION: &str = "Prediction";
pub const COL_LABEL: &str = "Label";

pub const LABEL_BADSPOT: &str = "Badspot";
pub const LABEL_NON_BADSPOT: &str = "Non-Badspot";

/// Cell contents treated as a missing value, matching what spreadsheet exports and
/// dataframe tools write for NA
pub const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Override thresholds
pub const DEFAULT_RSRP_MIN: f64 = -80.0;
pub const DEFAULT_RSRQ_MIN: f64 = -10.0;
pub const DEFAULT_RSRQ_ABOVE: f64 = -15.0;

/// Geographic bounds
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Object store defaults
pub const DEFAULT_BUCKET: &str = "badspot-predict";
pub const DEFAULT_ARTIFACT_PREFIX: &str = "models";
pub const DEFAULT_MODEL_OBJECT: &str = "svc_model.json";
pub const DEFAULT_SCALER_OBJECT: &str = "scaler.json";
pub const DEFAULT_ENCODER_OBJECT: &str = "label_encoder.json";
pub const DEFAULT_RESULTS_PREFIX: &str = "results";
pub const DEFAULT_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON";
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const GCS_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Configuration
pub const DEFAULT_CONFIG_FILE: &str = "badspot.toml";
pub const ENV_PREFIX: &str = "BADSPOT";

/// Map defaults
pub const DEFAULT_ZOOM_START: u8 = 10;

/// Parquet defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
