use serde::{Deserialize, Serialize};

use crate::error::{BadspotError, Result};
use crate::models::MeasurementRecord;
use crate::utils::constants::{LABEL_BADSPOT, LABEL_NON_BADSPOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionLabel {
    NonBadspot = 0,
    Badspot = 1,
}

impl PredictionLabel {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PredictionLabel::NonBadspot),
            1 => Ok(PredictionLabel::Badspot),
            _ => Err(BadspotError::InvalidFormat(format!(
                "Prediction must be 0 or 1, got {}",
                value
            ))),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn label_text(&self) -> &'static str {
        match self {
            PredictionLabel::NonBadspot => LABEL_NON_BADSPOT,
            PredictionLabel::Badspot => LABEL_BADSPOT,
        }
    }

    pub fn from_label_text(text: &str) -> Option<Self> {
        match text {
            LABEL_BADSPOT => Some(PredictionLabel::Badspot),
            LABEL_NON_BADSPOT => Some(PredictionLabel::NonBadspot),
            _ => None,
        }
    }

    pub fn is_badspot(&self) -> bool {
        matches!(self, PredictionLabel::Badspot)
    }
}

impl std::fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label_text())
    }
}

/// A measurement with the classifier's raw output and the final label after override
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub record: MeasurementRecord,
    pub raw_prediction: u8,
    pub prediction: PredictionLabel,
}

impl LabeledRecord {
    pub fn new(record: MeasurementRecord, raw_prediction: u8, prediction: PredictionLabel) -> Self {
        Self {
            record,
            raw_prediction,
            prediction,
        }
    }

    /// True when the signal-quality rule turned a classifier badspot into a non-badspot
    pub fn was_overridden(&self) -> bool {
        self.raw_prediction == 1 && !self.prediction.is_badspot()
    }
}

/// Row layout of the augmented output table. Fields are spelled out because the
/// csv serializer does not support flattened structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "PCI LTE")]
    pub pci: Option<i64>,
    #[serde(rename = "TAC")]
    pub tac: Option<i64>,
    #[serde(rename = "MCC")]
    pub mcc: Option<i64>,
    #[serde(rename = "MNC")]
    pub mnc: Option<i64>,
    #[serde(rename = "RSRP")]
    pub rsrp: Option<f64>,
    #[serde(rename = "RSRQ")]
    pub rsrq: Option<f64>,
    #[serde(rename = "DL EARFCN")]
    pub earfcn: Option<i64>,
    #[serde(rename = "Cat")]
    pub cat: Option<String>,
    #[serde(rename = "Prediction")]
    pub prediction: u8,
    #[serde(rename = "Label")]
    pub label: String,
}

impl From<&LabeledRecord> for OutputRow {
    fn from(labeled: &LabeledRecord) -> Self {
        let r = &labeled.record;
        Self {
            longitude: r.longitude,
            latitude: r.latitude,
            pci: r.pci,
            tac: r.tac,
            mcc: r.mcc,
            mnc: r.mnc,
            rsrp: r.rsrp,
            rsrq: r.rsrq,
            earfcn: r.earfcn,
            cat: r.cat.clone(),
            prediction: labeled.prediction.as_u8(),
            label: labeled.prediction.label_text().to_string(),
        }
    }
}
