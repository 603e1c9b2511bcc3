use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactSet, Classifier, LabelEncoder, StandardScaler};
use crate::error::{BadspotError, Result};
use crate::models::{InputTable, LabeledRecord, PredictionLabel};
use crate::processors::preprocessor::{EncodingPolicy, FeaturePreprocessor};
use crate::utils::constants::{DEFAULT_RSRP_MIN, DEFAULT_RSRQ_ABOVE, DEFAULT_RSRQ_MIN};

fn default_rsrp_min() -> f64 {
    DEFAULT_RSRP_MIN
}

fn default_rsrq_min() -> f64 {
    DEFAULT_RSRQ_MIN
}

fn default_rsrq_above() -> f64 {
    DEFAULT_RSRQ_ABOVE
}

/// Signal-quality rule applied on top of the classifier.
///
/// Good measured signal vetoes a badspot call; otherwise the classifier's answer stands.
/// The rule never turns a classifier 0 into a 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverridePolicy {
    /// Non-badspot when `RSRP >= rsrp_min` and `RSRQ >= rsrq_min`
    RsrpAndRsrq {
        #[serde(default = "default_rsrp_min")]
        rsrp_min: f64,
        #[serde(default = "default_rsrq_min")]
        rsrq_min: f64,
    },
    /// Non-badspot when `RSRQ > rsrq_above`
    RsrqOnly {
        #[serde(default = "default_rsrq_above")]
        rsrq_above: f64,
    },
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self::rsrp_and_rsrq()
    }
}

impl OverridePolicy {
    pub fn rsrp_and_rsrq() -> Self {
        OverridePolicy::RsrpAndRsrq {
            rsrp_min: DEFAULT_RSRP_MIN,
            rsrq_min: DEFAULT_RSRQ_MIN,
        }
    }

    pub fn rsrq_only() -> Self {
        OverridePolicy::RsrqOnly {
            rsrq_above: DEFAULT_RSRQ_ABOVE,
        }
    }

    /// True when the raw measurements alone rule out a badspot. Missing values never qualify.
    pub fn signal_is_good(&self, rsrp: Option<f64>, rsrq: Option<f64>) -> bool {
        match *self {
            OverridePolicy::RsrpAndRsrq { rsrp_min, rsrq_min } => matches!(
                (rsrp, rsrq),
                (Some(p), Some(q)) if p >= rsrp_min && q >= rsrq_min
            ),
            OverridePolicy::RsrqOnly { rsrq_above } => matches!(rsrq, Some(q) if q > rsrq_above),
        }
    }

    pub fn apply(&self, rsrp: Option<f64>, rsrq: Option<f64>, raw: u8) -> PredictionLabel {
        if self.signal_is_good(rsrp, rsrq) {
            PredictionLabel::NonBadspot
        } else if raw == 1 {
            PredictionLabel::Badspot
        } else {
            PredictionLabel::NonBadspot
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OverridePolicy::RsrpAndRsrq { rsrp_min, rsrq_min } => {
                format!("non-badspot if RSRP >= {} and RSRQ >= {}", rsrp_min, rsrq_min)
            }
            OverridePolicy::RsrqOnly { rsrq_above } => {
                format!("non-badspot if RSRQ > {}", rsrq_above)
            }
        }
    }
}

/// Labeled output of one prediction pass
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub labeled: Vec<LabeledRecord>,
    pub dropped_rows: Vec<usize>,
    pub imputed_cells: usize,
}

impl PredictionOutcome {
    pub fn badspot_count(&self) -> usize {
        self.labeled.iter().filter(|r| r.prediction.is_badspot()).count()
    }

    pub fn overridden_count(&self) -> usize {
        self.labeled.iter().filter(|r| r.was_overridden()).count()
    }
}

pub struct PredictionEngine {
    preprocessor: FeaturePreprocessor,
    policy: OverridePolicy,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            preprocessor: FeaturePreprocessor::new(),
            policy: OverridePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_encoding_policy(mut self, encoding_policy: EncodingPolicy) -> Self {
        self.preprocessor = self.preprocessor.with_encoding_policy(encoding_policy);
        self
    }

    pub fn predict(&self, artifacts: &ArtifactSet, table: &InputTable) -> Result<PredictionOutcome> {
        self.predict_with(
            artifacts.classifier(),
            table,
            artifacts.scaler(),
            artifacts.encoder(),
        )
    }

    /// Classify every row and apply the override rule. Any failure fails the whole batch
    /// and is reported as a prediction error wrapping its cause.
    pub fn predict_with(
        &self,
        classifier: &dyn Classifier,
        table: &InputTable,
        scaler: &StandardScaler,
        encoder: &LabelEncoder,
    ) -> Result<PredictionOutcome> {
        self.run(classifier, table, scaler, encoder)
            .map_err(BadspotError::prediction)
    }

    fn run(
        &self,
        classifier: &dyn Classifier,
        table: &InputTable,
        scaler: &StandardScaler,
        encoder: &LabelEncoder,
    ) -> Result<PredictionOutcome> {
        let batch = self.preprocessor.preprocess(table, scaler, encoder)?;
        let raw = classifier.predict(batch.features.view())?;

        if raw.len() != batch.records.len() {
            return Err(BadspotError::ShapeMismatch {
                context: "classifier output rows".to_string(),
                expected: batch.records.len(),
                found: raw.len(),
            });
        }
        if let Some(bad) = raw.iter().find(|label| **label > 1) {
            return Err(BadspotError::InvalidFormat(format!(
                "Classifier produced label {}, expected 0 or 1",
                bad
            )));
        }

        let labeled: Vec<LabeledRecord> = batch
            .records
            .into_iter()
            .zip(raw)
            .map(|(record, raw)| {
                let prediction = self.policy.apply(record.rsrp, record.rsrq, raw);
                LabeledRecord::new(record, raw, prediction)
            })
            .collect();

        let outcome = PredictionOutcome {
            labeled,
            dropped_rows: batch.dropped_rows,
            imputed_cells: batch.imputed_cells,
        };

        tracing::info!(
            rows = outcome.labeled.len(),
            badspots = outcome.badspot_count(),
            overridden = outcome.overridden_count(),
            policy = %self.policy.describe(),
            "prediction complete"
        );

        Ok(outcome)
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}
