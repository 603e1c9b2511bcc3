use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::error::{BadspotError, Result};

#[derive(Debug, Deserialize)]
struct ScalerParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

/// Standardizes features with the mean and standard deviation learned at training time
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ScalerParams")]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    feature_names: Option<Vec<String>>,
}

impl TryFrom<ScalerParams> for StandardScaler {
    type Error = BadspotError;

    fn try_from(params: ScalerParams) -> Result<Self> {
        let scaler = StandardScaler::new(params.mean, params.scale)?;
        match params.feature_names {
            Some(names) if names.len() != scaler.n_features() => Err(BadspotError::ShapeMismatch {
                context: "scaler feature names".to_string(),
                expected: scaler.n_features(),
                found: names.len(),
            }),
            names => Ok(StandardScaler {
                feature_names: names,
                ..scaler
            }),
        }
    }
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.is_empty() || mean.len() != scale.len() {
            return Err(BadspotError::ShapeMismatch {
                context: "scaler parameters".to_string(),
                expected: mean.len(),
                found: scale.len(),
            });
        }

        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(BadspotError::InvalidFormat(
                "Scaler parameters must be finite".to_string(),
            ));
        }

        // A constant training column has zero spread and is passed through unscaled
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
            feature_names: None,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Subtract the training mean and divide by the training scale, column by column
    pub fn transform(&self, features: Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(BadspotError::ShapeMismatch {
                context: "scaler input".to_string(),
                expected: self.n_features(),
                found: features.ncols(),
            });
        }

        let mut scaled = features;
        scaled -= &self.mean;
        scaled /= &self.scale;
        Ok(scaled)
    }
}
