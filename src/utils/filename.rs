use chrono::{Datelike, Local};
use std::path::PathBuf;

fn date_stamp() -> String {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    format!("{:02}{:02}{:02}", year, now.month(), now.day())
}

/// Generate default prediction output filename: badspot-predictions-{YYMMDD}.csv
pub fn generate_default_output_filename() -> PathBuf {
    let filename = format!("badspot-predictions-{}.csv", date_stamp());
    PathBuf::from("output").join(filename)
}

/// Generate default map filename: badspot-map-{YYMMDD}.html
pub fn generate_default_map_filename() -> PathBuf {
    let filename = format!("badspot-map-{}.html", date_stamp());
    PathBuf::from("output").join(filename)
}

/// Object name for results published to the blob store
pub fn results_object_name(prefix: &str, input_stem: &str) -> String {
    let now = Local::now();
    let name = format!(
        "{}-{}.csv",
        input_stem,
        now.format("%Y%m%d-%H%M%S")
    );
    join_object_path(prefix, &name)
}

/// Join a bucket prefix and an object name with a single '/'
pub fn join_object_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_output_filename() {
        let filename = generate_default_output_filename();
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output/"));
        assert!(filename_str.contains("badspot-predictions-"));
        assert!(filename_str.ends_with(".csv"));
    }

    #[test]
    fn test_generate_default_map_filename() {
        let filename = generate_default_map_filename();
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output/badspot-map-"));
        assert!(filename_str.ends_with(".html"));
    }

    #[test]
    fn test_join_object_path() {
        assert_eq!(join_object_path("models", "svc_model.json"), "models/svc_model.json");
        assert_eq!(join_object_path("models/", "/scaler.json"), "models/scaler.json");
        assert_eq!(join_object_path("", "svc_model.json"), "svc_model.json");
    }

    #[test]
    fn test_results_object_name() {
        let name = results_object_name("results", "drive_test");
        assert!(name.starts_with("results/drive_test-"));
        assert!(name.ends_with(".csv"));
    }
}
