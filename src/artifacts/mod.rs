//! Trained artifacts consumed at inference time: classifier, scaler and category encoder.
//!
//! The three objects are fetched from a [`BlobStore`] and deserialized together. Loading
//! is all-or-nothing: any missing, unreadable or inconsistent object fails the whole set.

pub mod cache;
pub mod classifier;
pub mod encoder;
pub mod scaler;

pub use cache::ArtifactCache;
pub use classifier::{Classifier, ClassifierArtifact, Kernel, LinearClassifier, SupportVectorClassifier};
pub use encoder::LabelEncoder;
pub use scaler::StandardScaler;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

use crate::error::{BadspotError, Result};
use crate::storage::BlobStore;
use crate::utils::constants::{
    DEFAULT_ARTIFACT_PREFIX, DEFAULT_ENCODER_OBJECT, DEFAULT_MODEL_OBJECT, DEFAULT_SCALER_OBJECT,
    FEATURE_COUNT, REQUIRED_COLUMNS,
};
use crate::utils::filename::join_object_path;

/// Object names of the three artifacts within a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ArtifactPaths {
    pub prefix: String,

    #[validate(length(min = 1))]
    pub model: String,

    #[validate(length(min = 1))]
    pub scaler: String,

    #[validate(length(min = 1))]
    pub encoder: String,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            model: DEFAULT_MODEL_OBJECT.to_string(),
            scaler: DEFAULT_SCALER_OBJECT.to_string(),
            encoder: DEFAULT_ENCODER_OBJECT.to_string(),
        }
    }
}

impl ArtifactPaths {
    pub fn model_object(&self) -> String {
        join_object_path(&self.prefix, &self.model)
    }

    pub fn scaler_object(&self) -> String {
        join_object_path(&self.prefix, &self.scaler)
    }

    pub fn encoder_object(&self) -> String {
        join_object_path(&self.prefix, &self.encoder)
    }
}

/// A consistent classifier/scaler/encoder triple, read-only once built
#[derive(Debug)]
pub struct ArtifactSet {
    classifier: Box<dyn Classifier>,
    scaler: StandardScaler,
    encoder: LabelEncoder,
}

impl ArtifactSet {
    pub fn new(
        classifier: Box<dyn Classifier>,
        scaler: StandardScaler,
        encoder: LabelEncoder,
    ) -> Result<Self> {
        if scaler.n_features() != FEATURE_COUNT {
            return Err(BadspotError::ShapeMismatch {
                context: "scaler".to_string(),
                expected: FEATURE_COUNT,
                found: scaler.n_features(),
            });
        }
        if classifier.n_features() != FEATURE_COUNT {
            return Err(BadspotError::ShapeMismatch {
                context: "classifier".to_string(),
                expected: FEATURE_COUNT,
                found: classifier.n_features(),
            });
        }
        if let Some(names) = scaler.feature_names() {
            if names.iter().map(String::as_str).ne(REQUIRED_COLUMNS.iter().copied()) {
                return Err(BadspotError::InvalidFormat(format!(
                    "Scaler was fitted on columns [{}], expected [{}]",
                    names.join(", "),
                    REQUIRED_COLUMNS.join(", ")
                )));
            }
        }

        Ok(Self {
            classifier,
            scaler,
            encoder,
        })
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn summary(&self) -> String {
        format!(
            "Artifacts:\n\
            - Classifier: {}\n\
            - Scaler: {} features\n\
            - Encoder: {} categories ({})",
            self.classifier.describe(),
            self.scaler.n_features(),
            self.encoder.classes().len(),
            self.encoder.classes().join(", ")
        )
    }
}

pub struct ArtifactLoader {
    paths: ArtifactPaths,
}

impl ArtifactLoader {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    /// Fetch and deserialize all three artifacts, going through `cache` when given
    pub fn load(
        &self,
        store: &dyn BlobStore,
        mut cache: Option<&mut ArtifactCache>,
    ) -> Result<ArtifactSet> {
        let model_object = self.paths.model_object();
        let scaler_object = self.paths.scaler_object();
        let encoder_object = self.paths.encoder_object();

        tracing::info!(
            bucket = store.bucket(),
            model = %model_object,
            scaler = %scaler_object,
            encoder = %encoder_object,
            "loading artifacts"
        );

        let classifier: ClassifierArtifact =
            Self::load_object(store, cache.as_deref_mut(), &model_object)?;
        let scaler: StandardScaler = Self::load_object(store, cache.as_deref_mut(), &scaler_object)?;
        let encoder: LabelEncoder = Self::load_object(store, cache.as_deref_mut(), &encoder_object)?;

        ArtifactSet::new(classifier.into_classifier(), scaler, encoder).map_err(|e| {
            // Only the classifier width check blames the model; the rest concern the scaler
            let object = match &e {
                BadspotError::ShapeMismatch { context, .. } if context == "classifier" => {
                    &model_object
                }
                _ => &scaler_object,
            };
            BadspotError::artifact_unavailable(object, e)
        })
    }

    fn load_object<T: DeserializeOwned>(
        store: &dyn BlobStore,
        cache: Option<&mut ArtifactCache>,
        object: &str,
    ) -> Result<T> {
        let bytes = match cache {
            Some(cache) => cache.get_or_fetch(store, object),
            None => store.fetch(object),
        }
        .map_err(|e| BadspotError::artifact_unavailable(object, e))?;

        serde_json::from_slice(&bytes).map_err(|e| BadspotError::artifact_unavailable(object, e))
    }
}
