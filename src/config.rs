//! Layered runtime configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file (`badspot.toml` in the
//! working directory, or the `--config` path), then `BADSPOT__SECTION__KEY` environment
//! variables. The merged result is validated before use.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

use crate::artifacts::ArtifactPaths;
use crate::error::Result;
use crate::processors::{EncodingPolicy, OverridePolicy};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_BUCKET, DEFAULT_CONFIG_FILE, DEFAULT_CREDENTIALS_ENV, DEFAULT_GCS_ENDPOINT,
    DEFAULT_RESULTS_PREFIX, DEFAULT_ZOOM_START, ENV_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    /// A local directory standing in for the bucket
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[validate(length(min = 1))]
    pub bucket: String,

    /// Root directory for the `local` backend; objects live under `<local_root>/<bucket>/`
    pub local_root: PathBuf,

    #[validate(url)]
    pub endpoint: String,

    /// Environment variable holding the service-account JSON
    #[validate(length(min = 1))]
    pub credentials_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: DEFAULT_BUCKET.to_string(),
            local_root: PathBuf::from("data"),
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            credentials_env: DEFAULT_CREDENTIALS_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PredictionConfig {
    pub override_policy: OverridePolicy,
    pub encoding_policy: EncodingPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MapConfig {
    #[validate(range(min = 1, max = 18))]
    pub zoom_start: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom_start: DEFAULT_ZOOM_START,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    pub results_prefix: String,

    /// Parquet compression codec
    #[validate(custom(function = "validate_compression"))]
    pub compression: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_prefix: DEFAULT_RESULTS_PREFIX.to_string(),
            compression: COMPRESSION_SNAPPY.to_string(),
        }
    }
}

fn validate_compression(value: &str) -> std::result::Result<(), ValidationError> {
    let known = [
        COMPRESSION_SNAPPY,
        COMPRESSION_GZIP,
        COMPRESSION_LZ4,
        COMPRESSION_ZSTD,
        COMPRESSION_NONE,
    ];
    if known.contains(&value.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("unsupported_compression"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub storage: StorageConfig,

    #[validate(nested)]
    pub artifacts: ArtifactPaths,

    #[validate(nested)]
    pub prediction: PredictionConfig,

    #[validate(nested)]
    pub map: MapConfig,

    #[validate(nested)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load from defaults, the config file and the environment. An explicit `path` must
    /// exist; the default `badspot.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = config::Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = Self::build(builder)?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BadspotError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() -> Result<()> {
        let config = AppConfig::from_toml_str("")?;

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.storage.bucket, "badspot-predict");
        assert_eq!(config.prediction.override_policy, OverridePolicy::rsrp_and_rsrq());
        assert_eq!(config.prediction.encoding_policy, EncodingPolicy::RejectBatch);
        assert_eq!(config.map.zoom_start, 10);
        Ok(())
    }

    #[test]
    fn test_toml_overrides() -> Result<()> {
        let config = AppConfig::from_toml_str(
            r#"
            [storage]
            backend = "local"
            bucket = "drive-tests"
            local_root = "/srv/buckets"

            [artifacts]
            prefix = "v2"

            [prediction]
            encoding_policy = "drop_rows"

            [prediction.override_policy]
            kind = "rsrq_only"
            rsrq_above = -12.0

            [output]
            compression = "zstd"
            "#,
        )?;

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_root, PathBuf::from("/srv/buckets"));
        assert_eq!(config.artifacts.model_object(), "v2/svc_model.json");
        assert_eq!(config.prediction.encoding_policy, EncodingPolicy::DropRows);
        assert_eq!(
            config.prediction.override_policy,
            OverridePolicy::RsrqOnly { rsrq_above: -12.0 }
        );
        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let result = AppConfig::from_toml_str("[map]\nzoom_start = 30\n");
        assert!(matches!(result, Err(BadspotError::Validation(_))));

        let result = AppConfig::from_toml_str("[output]\ncompression = \"brotli\"\n");
        assert!(matches!(result, Err(BadspotError::Validation(_))));

        let result = AppConfig::from_toml_str("[storage]\nbucket = \"\"\n");
        assert!(matches!(result, Err(BadspotError::Validation(_))));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/badspot.toml")));
        assert!(matches!(result, Err(BadspotError::Config(_))));
    }
}
