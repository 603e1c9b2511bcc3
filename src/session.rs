//! One user session: storage connection, artifacts, the uploaded table and the latest
//! predictions, driven one [`Interaction`] at a time.
//!
//! [`Session::handle`] never fails. Errors become [`Notice`]s on the [`Response`] and the
//! session stays usable for the next interaction.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::artifacts::{ArtifactCache, ArtifactLoader, ArtifactSet};
use crate::config::{AppConfig, StorageBackend};
use crate::error::{BadspotError, Result};
use crate::models::InputTable;
use crate::processors::{BatchChecker, PredictionEngine, PredictionOutcome};
use crate::readers::TableReader;
use crate::storage::{BlobStore, CredentialSource, GcsBlobStore, LocalBlobStore};
use crate::utils::filename::results_object_name;
use crate::writers::{CsvWriter, MapArtifact, MapRenderer, ParquetWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Connect to the configured bucket and load artifacts. `None` reads the credential
    /// from the configured environment variable.
    Connect(Option<CredentialSource>),
    Upload(PathBuf),
    Predict,
    RenderMap,
    /// Data-quality summary of the current table and predictions
    Report,
    /// Write the labeled table; `.parquet` selects Parquet, anything else CSV
    Export(PathBuf),
    /// Upload the labeled table as CSV under the results prefix
    Publish,
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Connect(_) => "connect",
            Interaction::Upload(_) => "upload",
            Interaction::Predict => "predict",
            Interaction::RenderMap => "map",
            Interaction::Report => "report",
            Interaction::Export(_) => "export",
            Interaction::Publish => "publish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Response {
    pub notices: Vec<Notice>,
    pub map: Option<MapArtifact>,
    pub summary: Option<String>,
}

impl Response {
    fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn success(message: impl Into<String>) -> Self {
        let mut response = Self::default();
        response.push(NoticeLevel::Success, message);
        response
    }

    fn warning(message: impl Into<String>) -> Self {
        let mut response = Self::default();
        response.push(NoticeLevel::Warning, message);
        response
    }

    fn error(message: impl Into<String>) -> Self {
        let mut response = Self::default();
        response.push(NoticeLevel::Error, message);
        response
    }

    pub fn is_error(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}

pub struct Session {
    config: AppConfig,
    store: Option<Box<dyn BlobStore>>,
    cache: Option<ArtifactCache>,
    artifacts: Option<ArtifactSet>,
    table: Option<InputTable>,
    table_name: String,
    outcome: Option<PredictionOutcome>,
    engine: PredictionEngine,
    map_renderer: MapRenderer,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        let engine = PredictionEngine::new()
            .with_policy(config.prediction.override_policy)
            .with_encoding_policy(config.prediction.encoding_policy);
        let map_renderer = MapRenderer::new().with_zoom_start(config.map.zoom_start);

        Self {
            config,
            store: None,
            cache: None,
            artifacts: None,
            table: None,
            table_name: String::new(),
            outcome: None,
            engine,
            map_renderer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }

    pub fn table(&self) -> Option<&InputTable> {
        self.table.as_ref()
    }

    pub fn outcome(&self) -> Option<&PredictionOutcome> {
        self.outcome.as_ref()
    }

    pub fn handle(&mut self, interaction: Interaction) -> Response {
        tracing::debug!(interaction = interaction.name(), "handling interaction");

        let result = match interaction {
            Interaction::Connect(source) => self.connect(source),
            Interaction::Upload(path) => self.upload(&path),
            Interaction::Predict => self.predict(),
            Interaction::RenderMap => self.render_map(),
            Interaction::Report => self.report(),
            Interaction::Export(path) => self.export(&path),
            Interaction::Publish => self.publish(),
        };

        result.unwrap_or_else(|e| {
            tracing::error!(error = %e, "interaction failed");
            Response::error(e.user_message())
        })
    }

    fn open_store(&self, source: Option<CredentialSource>) -> Result<Box<dyn BlobStore>> {
        let storage = &self.config.storage;
        match storage.backend {
            StorageBackend::Local => Ok(Box::new(LocalBlobStore::new(
                storage.local_root.clone(),
                &storage.bucket,
            ))),
            StorageBackend::Gcs => {
                let source =
                    source.unwrap_or_else(|| CredentialSource::Env(storage.credentials_env.clone()));
                tracing::info!(source = %source.describe(), "loading credential");
                let key = source.load()?;
                Ok(Box::new(GcsBlobStore::new(
                    key,
                    &storage.bucket,
                    &storage.endpoint,
                )?))
            }
        }
    }

    fn connect(&mut self, source: Option<CredentialSource>) -> Result<Response> {
        let store = self.open_store(source)?;
        store.check_bucket()?;
        self.replace_store(store)
    }

    fn replace_store(&mut self, store: Box<dyn BlobStore>) -> Result<Response> {
        // Artifacts from a previous connection may not match the new bucket
        if let Some(cache) = self.cache.as_mut() {
            cache.invalidate()?;
        }
        self.artifacts = None;
        self.outcome = None;
        self.store = Some(store);

        self.load_artifacts()
    }

    fn load_artifacts(&mut self) -> Result<Response> {
        let store = self.store.as_deref().ok_or_else(not_connected)?;
        if self.cache.is_none() {
            self.cache = Some(ArtifactCache::new()?);
        }

        let loader = ArtifactLoader::new(self.config.artifacts.clone());
        let artifacts = loader.load(store, self.cache.as_mut())?;

        let mut response = Response::success(format!(
            "Connected to bucket '{}' and loaded the prediction model.",
            store.bucket()
        ));
        response.summary = Some(artifacts.summary());
        self.artifacts = Some(artifacts);
        Ok(response)
    }

    fn upload(&mut self, path: &Path) -> Result<Response> {
        let table = TableReader::new().read(path)?;

        self.table_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        self.outcome = None;

        let mut response = Response::success(format!(
            "Loaded {} rows and {} columns from {}.",
            table.len(),
            table.columns().len(),
            path.display()
        ));
        if table.is_empty() {
            response.push(NoticeLevel::Warning, "The uploaded file has no data rows.");
        }
        self.table = Some(table);
        Ok(response)
    }

    fn predict(&mut self) -> Result<Response> {
        let table = self.table.as_ref().ok_or_else(|| {
            BadspotError::InvalidFormat("Upload a file before predicting.".to_string())
        })?;
        let artifacts = self.artifacts.as_ref().ok_or_else(not_connected)?;

        // A failed run must not leave stale predictions from a previous upload behind
        self.outcome = None;
        let outcome = self.engine.predict(artifacts, table)?;

        let mut response = Response::success("Predictions made successfully.");
        response.push(
            NoticeLevel::Info,
            format!(
                "{} of {} rows predicted as Badspot ({} overridden by signal quality).",
                outcome.badspot_count(),
                outcome.labeled.len(),
                outcome.overridden_count()
            ),
        );
        if !outcome.dropped_rows.is_empty() {
            response.push(
                NoticeLevel::Warning,
                format!(
                    "Dropped {} row(s) with unknown Cat values: rows {}.",
                    outcome.dropped_rows.len(),
                    join_rows(&outcome.dropped_rows)
                ),
            );
        }
        if outcome.imputed_cells > 0 {
            response.push(
                NoticeLevel::Info,
                format!(
                    "Filled {} missing value(s) with batch column means.",
                    outcome.imputed_cells
                ),
            );
        }

        self.outcome = Some(outcome);
        Ok(response)
    }

    fn render_map(&mut self) -> Result<Response> {
        let Some(outcome) = self.outcome.as_ref() else {
            return Ok(Response::warning("No predictions to display on the map."));
        };

        match self.map_renderer.render(&outcome.labeled)? {
            Some(map) => {
                let mut response = Response::success(format!(
                    "Map rendered with {} marker(s).",
                    map.marker_count
                ));
                if map.skipped > 0 {
                    response.push(
                        NoticeLevel::Warning,
                        format!("{} row(s) without coordinates were not mapped.", map.skipped),
                    );
                }
                if map.out_of_range > 0 {
                    response.push(
                        NoticeLevel::Warning,
                        format!(
                            "{} row(s) have coordinates outside the valid latitude/longitude range.",
                            map.out_of_range
                        ),
                    );
                }
                response.map = Some(map);
                Ok(response)
            }
            None => Ok(Response::warning(
                "No predictions with coordinates to display on the map.",
            )),
        }
    }

    fn report(&mut self) -> Result<Response> {
        let table = self.table.as_ref().ok_or_else(|| {
            BadspotError::InvalidFormat("Upload a file before requesting a report.".to_string())
        })?;

        let checker = BatchChecker::new();
        let mut report = checker.check_table(table)?;
        if let Some(outcome) = &self.outcome {
            checker.record_outcome(&mut report, outcome);
        }

        let mut response = if report.has_schema_errors() {
            Response::error(
                BadspotError::Schema {
                    missing: report.missing_columns.clone(),
                }
                .user_message(),
            )
        } else {
            Response::success("The uploaded file has all required columns.")
        };
        if !report.coordinate_violations.is_empty() {
            response.push(
                NoticeLevel::Warning,
                format!(
                    "{} row(s) have coordinates outside the valid range.",
                    report.coordinate_violations.len()
                ),
            );
        }
        response.summary = Some(checker.generate_summary(&report));
        Ok(response)
    }

    fn export(&mut self, path: &Path) -> Result<Response> {
        let outcome = self.outcome.as_ref().ok_or_else(no_predictions)?;

        let is_parquet = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));

        if is_parquet {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            ParquetWriter::new()
                .with_compression(&self.config.output.compression)?
                .write_records(&outcome.labeled, path)?;
        } else {
            CsvWriter::new().write_records(&outcome.labeled, path)?;
        }

        Ok(Response::success(format!(
            "Wrote {} predictions to {}.",
            outcome.labeled.len(),
            path.display()
        )))
    }

    fn publish(&mut self) -> Result<Response> {
        let outcome = self.outcome.as_ref().ok_or_else(no_predictions)?;
        let store = self.store.as_deref().ok_or_else(not_connected)?;

        let object = results_object_name(&self.config.output.results_prefix, &self.table_name);
        let bytes = CsvWriter::new().to_bytes(&outcome.labeled)?;
        store.put(&object, &bytes, "text/csv")?;

        Ok(Response::success(format!(
            "Published predictions to {}/{}.",
            store.bucket(),
            object
        )))
    }
}

fn not_connected() -> BadspotError {
    BadspotError::Credential("Connect to storage and load the model first.".to_string())
}

fn no_predictions() -> BadspotError {
    BadspotError::InvalidFormat("Run a prediction first.".to_string())
}

fn join_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactPaths;
    use crate::processors::EncodingPolicy;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,RSRQ,DL EARFCN,Cat";

    /// Local bucket holding a linear model that flags weak RSRP + RSRQ as badspot
    fn local_session(dir: &Path) -> Session {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Local;
        config.storage.local_root = dir.to_path_buf();

        let store = LocalBlobStore::new(dir, &config.storage.bucket);
        let paths = ArtifactPaths::default();
        let model = serde_json::json!({
            "kind": "linear",
            "coef": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, -1.0, 0.0, 0.0],
            "intercept": -90.0
        });
        let scaler = serde_json::json!({"mean": vec![0.0; 10], "scale": vec![1.0; 10]});
        let encoder = serde_json::json!({"classes": ["Rural", "Urban"]});
        store
            .put(&paths.model_object(), model.to_string().as_bytes(), "application/json")
            .unwrap();
        store
            .put(&paths.scaler_object(), scaler.to_string().as_bytes(), "application/json")
            .unwrap();
        store
            .put(&paths.encoder_object(), encoder.to_string().as_bytes(), "application/json")
            .unwrap();

        Session::new(config)
    }

    fn write_csv(dir: &Path, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", header).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        path
    }

    #[test]
    fn test_predict_before_anything_is_a_notice() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());

        let response = session.handle(Interaction::Predict);
        assert!(response.is_error());

        // Still usable afterwards
        let response = session.handle(Interaction::Connect(None));
        assert!(!response.is_error(), "{:?}", response.notices);
        assert!(session.artifacts().is_some());
    }

    #[test]
    fn test_full_flow() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());
        let input = write_csv(
            dir.path(),
            "drive.csv",
            HEADER,
            &[
                "106.8,-6.2,101,2010,510,10,-75,-5,1850,Urban",
                "106.9,-6.3,102,2010,510,10,-95,-14,1850,Rural",
                "106.7,-6.1,103,2010,510,10,-70,-12,1850,Urban",
            ],
        );

        assert!(!session.handle(Interaction::Connect(None)).is_error());
        assert!(!session.handle(Interaction::Upload(input)).is_error());

        let response = session.handle(Interaction::Predict);
        assert!(!response.is_error(), "{:?}", response.notices);
        let labels: Vec<u8> = session
            .outcome()
            .unwrap()
            .labeled
            .iter()
            .map(|r| r.prediction.as_u8())
            .collect();
        // Decision value is -RSRP - RSRQ - 90
        assert_eq!(labels, vec![0, 1, 0]);

        let response = session.handle(Interaction::RenderMap);
        assert_eq!(response.map.as_ref().unwrap().marker_count, 3);

        let out = dir.path().join("out").join("labeled.parquet");
        assert!(!session.handle(Interaction::Export(out.clone())).is_error());
        assert!(out.exists());

        let response = session.handle(Interaction::Publish);
        assert!(!response.is_error(), "{:?}", response.notices);
        let published: Vec<_> = std::fs::read_dir(dir.path().join("badspot-predict").join("results"))
            .unwrap()
            .collect();
        assert_eq!(published.len(), 1);

        let response = session.handle(Interaction::Report);
        assert!(response.summary.unwrap().contains("Badspot: 1"));
    }

    #[test]
    fn test_missing_column_yields_no_predictions() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());
        let input = write_csv(
            dir.path(),
            "partial.csv",
            "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,DL EARFCN,Cat",
            &["106.8,-6.2,101,2010,510,10,-75,1850,Urban"],
        );

        session.handle(Interaction::Connect(None));
        session.handle(Interaction::Upload(input));
        let response = session.handle(Interaction::Predict);

        assert!(response.is_error());
        assert!(response.notices[0].message.contains("RSRQ"));
        assert!(session.outcome().is_none());
    }

    #[test]
    fn test_missing_artifacts_fail_connect() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());
        std::fs::remove_file(
            dir.path()
                .join("badspot-predict")
                .join(ArtifactPaths::default().scaler_object()),
        )
        .unwrap();

        let response = session.handle(Interaction::Connect(None));
        assert!(response.is_error());
        assert!(response.notices[0].message.contains("models/scaler.json"));
        assert!(session.artifacts().is_none());
    }

    #[test]
    fn test_unseen_category_policy() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());
        session.engine = PredictionEngine::new().with_encoding_policy(EncodingPolicy::DropRows);
        let input = write_csv(
            dir.path(),
            "mixed.csv",
            HEADER,
            &[
                "106.8,-6.2,101,2010,510,10,-75,-5,1850,Suburban",
                "106.9,-6.3,102,2010,510,10,-95,-14,1850,Rural",
            ],
        );

        session.handle(Interaction::Connect(None));
        session.handle(Interaction::Upload(input));
        let response = session.handle(Interaction::Predict);

        assert!(response
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Warning && n.message.contains("rows 1")));
        assert_eq!(session.outcome().unwrap().labeled.len(), 1);
    }

    #[test]
    fn test_map_without_predictions_warns() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());

        let response = session.handle(Interaction::RenderMap);
        assert!(response.map.is_none());
        assert_eq!(response.notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_out_of_range_coordinates_are_mapped_with_warning() {
        let dir = TempDir::new().unwrap();
        let mut session = local_session(dir.path());
        let input = write_csv(
            dir.path(),
            "swapped.csv",
            HEADER,
            &[
                "106.8,-6.2,101,2010,510,10,-75,-5,1850,Urban",
                "-6.3,106.9,102,2010,510,10,-95,-14,1850,Rural",
            ],
        );

        session.handle(Interaction::Connect(None));
        session.handle(Interaction::Upload(input));
        assert!(!session.handle(Interaction::Predict).is_error());

        let response = session.handle(Interaction::RenderMap);
        let map = response.map.as_ref().unwrap();
        assert_eq!(map.marker_count, 2);
        assert_eq!(map.out_of_range, 1);
        assert!(response
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Warning && n.message.contains("outside the valid")));
    }
}
