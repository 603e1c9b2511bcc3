use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::artifacts::{LabelEncoder, StandardScaler};
use crate::error::{BadspotError, Result};
use crate::models::{InputTable, MeasurementRecord};
use crate::utils::constants::{COL_CAT, FEATURE_COUNT, REQUIRED_COLUMNS};

const MISSING_CATEGORY: &str = "<missing>";

/// What to do with rows whose category is not in the encoder's vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingPolicy {
    /// Fail the whole batch
    #[default]
    RejectBatch,
    /// Drop the offending rows and predict the rest
    DropRows,
}

/// Records that made it through preprocessing, with their model-ready features
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub records: Vec<MeasurementRecord>,
    pub features: Array2<f64>,
    /// 1-based input row numbers removed under `EncodingPolicy::DropRows`
    pub dropped_rows: Vec<usize>,
    pub imputed_cells: usize,
}

pub struct FeaturePreprocessor {
    required_fields: Vec<String>,
    encoding_policy: EncodingPolicy,
}

impl FeaturePreprocessor {
    pub fn new() -> Self {
        Self {
            required_fields: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            encoding_policy: EncodingPolicy::default(),
        }
    }

    pub fn with_encoding_policy(mut self, encoding_policy: EncodingPolicy) -> Self {
        self.encoding_policy = encoding_policy;
        self
    }

    /// Require additional columns on top of the ten model features
    pub fn with_required_fields(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if !self.required_fields.iter().any(|f| f == field) {
                self.required_fields.push(field.to_string());
            }
        }
        self
    }

    pub fn preprocess(
        &self,
        table: &InputTable,
        scaler: &StandardScaler,
        encoder: &LabelEncoder,
    ) -> Result<PreparedBatch> {
        let required: Vec<&str> = self.required_fields.iter().map(String::as_str).collect();
        table.require_columns(&required)?;

        let (records, codes, dropped_rows) = self.encode_categories(table.records()?, encoder)?;
        if records.is_empty() {
            return Err(BadspotError::EmptyBatch(
                "no rows left to predict".to_string(),
            ));
        }

        let rows: Vec<[Option<f64>; FEATURE_COUNT]> = records
            .iter()
            .zip(codes.iter())
            .map(|(record, code)| record.feature_values(*code as f64))
            .collect();

        let (features, imputed_cells) = impute_column_means(&rows)?;
        let features = scaler.transform(features)?;

        tracing::debug!(
            rows = records.len(),
            dropped = dropped_rows.len(),
            imputed_cells,
            "preprocessed batch"
        );

        Ok(PreparedBatch {
            records,
            features,
            dropped_rows,
            imputed_cells,
        })
    }

    fn encode_categories(
        &self,
        records: Vec<MeasurementRecord>,
        encoder: &LabelEncoder,
    ) -> Result<(Vec<MeasurementRecord>, Vec<usize>, Vec<usize>)> {
        let mut kept = Vec::with_capacity(records.len());
        let mut codes = Vec::with_capacity(records.len());
        let mut dropped_rows = Vec::new();
        let mut unseen = BTreeSet::new();

        for (i, record) in records.into_iter().enumerate() {
            match record.cat.as_deref().and_then(|cat| encoder.transform(cat)) {
                Some(code) => {
                    codes.push(code);
                    kept.push(record);
                }
                None => {
                    unseen.insert(record.cat.clone().unwrap_or_else(|| MISSING_CATEGORY.to_string()));
                    dropped_rows.push(i + 1);
                }
            }
        }

        if unseen.is_empty() {
            return Ok((kept, codes, dropped_rows));
        }

        match self.encoding_policy {
            EncodingPolicy::RejectBatch => Err(BadspotError::Encoding {
                column: COL_CAT.to_string(),
                values: unseen.into_iter().collect(),
            }),
            EncodingPolicy::DropRows => {
                tracing::warn!(
                    rows = dropped_rows.len(),
                    values = ?unseen,
                    "dropping rows with unseen categories"
                );
                Ok((kept, codes, dropped_rows))
            }
        }
    }
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill gaps with the mean of each column over this batch only.
///
/// Returns the dense matrix and the number of cells filled. A column with no observed
/// value has no mean and fails the batch.
pub fn impute_column_means(rows: &[[Option<f64>; FEATURE_COUNT]]) -> Result<(Array2<f64>, usize)> {
    let mut means = [0.0; FEATURE_COUNT];
    for (column, mean) in means.iter_mut().enumerate() {
        let (sum, count) = rows
            .iter()
            .filter_map(|row| row[column])
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            return Err(BadspotError::InvalidFormat(format!(
                "Column '{}' has no values in this batch to impute from",
                REQUIRED_COLUMNS[column]
            )));
        }
        *mean = sum / count as f64;
    }

    let mut imputed = 0;
    let features = Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(r, c)| {
        rows[r][c].unwrap_or_else(|| {
            imputed += 1;
            means[c]
        })
    });

    Ok((features, imputed))
}
