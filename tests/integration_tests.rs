use badspot_predictor::artifacts::ArtifactPaths;
use badspot_predictor::config::AppConfig;
use badspot_predictor::models::PredictionLabel;
use badspot_predictor::processors::OverridePolicy;
use badspot_predictor::readers::TableReader;
use badspot_predictor::session::{Interaction, NoticeLevel, Session};
use badspot_predictor::storage::{BlobStore, LocalBlobStore};
use badspot_predictor::writers::ParquetWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,RSRQ,DL EARFCN,Cat";

const ROWS: [&str; 6] = [
    "106.80,-6.20,101,2010,510,10,-75,-5,1850,Urban",
    "106.81,-6.21,102,2010,510,10,-95,-14,1850,Rural",
    "106.82,-6.22,103,2010,510,10,-70,-12,1850,Urban",
    "106.83,-6.23,104,2010,510,10,-85,-8,1850,Suburban",
    "106.84,-6.24,105,2010,510,10,-79,-9,1850,Urban",
    ",-6.25,106,2010,510,10,-60,-4,1850,Rural",
];

/// Seed a local bucket with an SVC whose decision value is `-RSRP - RSRQ - 85`
fn seed_bucket(root: &Path, bucket: &str) {
    let store = LocalBlobStore::new(root, bucket);
    let paths = ArtifactPaths::default();

    let mut support_vector = vec![0.0; 10];
    support_vector[6] = -1.0;
    support_vector[7] = -1.0;
    let model = serde_json::json!({
        "kind": "svc",
        "kernel": {"type": "linear"},
        "support_vectors": [support_vector],
        "dual_coef": [1.0],
        "intercept": -85.0,
        "classes": [0, 1]
    });
    let scaler = serde_json::json!({
        "mean": vec![0.0; 10],
        "scale": vec![1.0; 10],
        "feature_names": [
            "Longitude", "Latitude", "PCI LTE", "TAC", "MCC",
            "MNC", "RSRP", "RSRQ", "DL EARFCN", "Cat"
        ]
    });
    let encoder = serde_json::json!({"classes": ["Rural", "Suburban", "Urban"]});

    for (object, value) in [
        (paths.model_object(), model),
        (paths.scaler_object(), scaler),
        (paths.encoder_object(), encoder),
    ] {
        store
            .put(&object, value.to_string().as_bytes(), "application/json")
            .expect("Failed to seed artifact");
    }
}

fn local_config(root: &Path, extra: &str) -> AppConfig {
    let toml = format!(
        "[storage]\nbackend = \"local\"\nbucket = \"drive-tests\"\nlocal_root = \"{}\"\n{}",
        root.display(),
        extra
    );
    AppConfig::from_toml_str(&toml).expect("Failed to parse config")
}

fn write_input(dir: &Path, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join("drive.csv");
    let mut content = format!("{}\n", header);
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).expect("Failed to write input");
    path
}

fn labels(session: &Session) -> Vec<PredictionLabel> {
    session
        .outcome()
        .expect("No predictions")
        .labeled
        .iter()
        .map(|r| r.prediction)
        .collect()
}

#[tokio::test]
async fn test_end_to_end_prediction() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    seed_bucket(temp_dir.path(), "drive-tests");
    let input = write_input(temp_dir.path(), HEADER, &ROWS);
    let config = local_config(temp_dir.path(), "");

    let output_path = temp_dir.path().join("labeled.parquet");
    let export_path = output_path.clone();
    let session = tokio::task::spawn_blocking(move || {
        let mut session = Session::new(config);
        for interaction in [
            Interaction::Connect(None),
            Interaction::Upload(input),
            Interaction::Predict,
            Interaction::Export(export_path),
        ] {
            let response = session.handle(interaction);
            assert!(!response.is_error(), "{:?}", response.notices);
        }
        session
    })
    .await
    .expect("Session task panicked");

    use PredictionLabel::{Badspot, NonBadspot};
    // Row 5 is a raw badspot lifted by RSRP >= -80 and RSRQ >= -10
    assert_eq!(
        labels(&session),
        vec![NonBadspot, Badspot, NonBadspot, Badspot, NonBadspot, NonBadspot]
    );
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.overridden_count(), 1);
    assert_eq!(outcome.imputed_cells, 1);
    assert!(outcome.labeled[5].record.longitude.is_none());

    let writer = ParquetWriter::new();
    let file_info = writer.get_file_info(&output_path).unwrap();
    assert_eq!(file_info.total_rows, 6);

    let records = writer.read_sample_records(&output_path, 3).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].prediction, Badspot);
    assert_eq!(records[1].record.cat.as_deref(), Some("Rural"));
    assert_eq!(records[0].record.rsrp, Some(-75.0));
}

#[test]
fn test_rsrq_only_policy_and_map() {
    let temp_dir = TempDir::new().unwrap();
    seed_bucket(temp_dir.path(), "drive-tests");
    let input = write_input(temp_dir.path(), HEADER, &ROWS);
    let config = local_config(
        temp_dir.path(),
        "[prediction.override_policy]\nkind = \"rsrq_only\"\n",
    );
    assert_eq!(config.prediction.override_policy, OverridePolicy::rsrq_only());

    let mut session = Session::new(config);
    session.handle(Interaction::Connect(None));
    session.handle(Interaction::Upload(input));
    let response = session.handle(Interaction::Predict);
    assert!(!response.is_error(), "{:?}", response.notices);

    use PredictionLabel::{Badspot, NonBadspot};
    // Every raw badspot here has RSRQ above -15
    assert_eq!(labels(&session), vec![NonBadspot; 6]);
    assert_eq!(session.outcome().unwrap().overridden_count(), 3);
    assert!(!labels(&session).contains(&Badspot));

    let response = session.handle(Interaction::RenderMap);
    let map = response.map.expect("Expected a map");
    assert_eq!(map.marker_count, 5);
    assert_eq!(map.skipped, 1);
    assert!(map.html.contains("L.circleMarker"));
    assert!(response
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Warning));

    let map_path = temp_dir.path().join("maps").join("badspots.html");
    map.write_to(&map_path).unwrap();
    assert!(map_path.exists());
}

#[test]
fn test_spreadsheet_upload_and_predict() {
    let temp_dir = TempDir::new().unwrap();
    seed_bucket(temp_dir.path(), "drive-tests");
    // Cat codes as exported by the survey tool can be numeric
    LocalBlobStore::new(temp_dir.path(), "drive-tests")
        .put(
            &ArtifactPaths::default().encoder_object(),
            br#"{"classes": [2, "Rural", "Urban"]}"#,
            "application/json",
        )
        .unwrap();
    let input = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/drive_test.xlsx");

    let table = TableReader::new().read(&input).unwrap();
    assert_eq!(table.len(), 3);

    let mut session = Session::new(local_config(temp_dir.path(), ""));
    for interaction in [
        Interaction::Connect(None),
        Interaction::Upload(input),
        Interaction::Predict,
    ] {
        let response = session.handle(interaction);
        assert!(!response.is_error(), "{:?}", response.notices);
    }

    use PredictionLabel::{Badspot, NonBadspot};
    assert_eq!(labels(&session), vec![NonBadspot, Badspot, NonBadspot]);
    let outcome = session.outcome().unwrap();
    // The NULL RSRQ cell takes the batch mean of -5 and -14
    assert_eq!(outcome.imputed_cells, 1);
    assert_eq!(outcome.labeled[2].record.rsrq, None);
    assert_eq!(outcome.labeled[2].record.cat.as_deref(), Some("2"));
}

#[test]
fn test_missing_column_rejects_batch() {
    let temp_dir = TempDir::new().unwrap();
    seed_bucket(temp_dir.path(), "drive-tests");
    let input = write_input(
        temp_dir.path(),
        "Longitude,Latitude,PCI LTE,TAC,MCC,MNC,RSRP,DL EARFCN",
        &["106.8,-6.2,101,2010,510,10,-75,1850"],
    );

    let table = TableReader::new().read(&input).unwrap();
    assert_eq!(table.missing_columns(&["RSRQ", "Cat"]), vec!["RSRQ", "Cat"]);

    let mut session = Session::new(local_config(temp_dir.path(), ""));
    assert!(!session.handle(Interaction::Connect(None)).is_error());
    assert!(!session.handle(Interaction::Upload(input)).is_error());

    let response = session.handle(Interaction::Predict);
    assert!(response.is_error());
    assert!(session.outcome().is_none());

    let response = session.handle(Interaction::RenderMap);
    assert!(response.map.is_none());
}

#[test]
fn test_connect_to_empty_bucket_fails() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("drive-tests")).unwrap();

    let mut session = Session::new(local_config(temp_dir.path(), ""));
    let response = session.handle(Interaction::Connect(None));

    assert!(response.is_error());
    assert!(session.artifacts().is_none());
}
