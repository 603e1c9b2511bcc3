use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::Deserialize;
use std::fmt;

use crate::error::{BadspotError, Result};

/// A trained binary classifier over scaled feature rows
pub trait Classifier: Send + Sync + fmt::Debug {
    fn n_features(&self) -> usize;

    /// One raw label (0 or 1) per input row
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { degree: i32, gamma: f64, coef0: f64 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    pub fn evaluate(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match *self {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf { gamma } => {
                let squared_distance: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * squared_distance).exp()
            }
            Kernel::Poly { degree, gamma, coef0 } => (gamma * a.dot(&b) + coef0).powi(degree),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
        }
    }
}

fn default_classes() -> [u8; 2] {
    [0, 1]
}

fn check_classes(classes: [u8; 2]) -> Result<[u8; 2]> {
    if classes == [0, 1] || classes == [1, 0] {
        Ok(classes)
    } else {
        Err(BadspotError::InvalidFormat(format!(
            "Classifier classes must be 0 and 1, found {:?}",
            classes
        )))
    }
}

fn check_width(features: &ArrayView2<'_, f64>, expected: usize) -> Result<()> {
    if features.ncols() == expected {
        Ok(())
    } else {
        Err(BadspotError::ShapeMismatch {
            context: "classifier input".to_string(),
            expected,
            found: features.ncols(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SvcParams {
    kernel: Kernel,
    support_vectors: Vec<Vec<f64>>,
    dual_coef: Vec<f64>,
    intercept: f64,
    #[serde(default = "default_classes")]
    classes: [u8; 2],
}

/// Binary support vector classifier evaluated from its dual form:
/// `f(x) = sum_i dual_coef[i] * K(sv_i, x) + intercept`, positive side is `classes[1]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "SvcParams")]
pub struct SupportVectorClassifier {
    kernel: Kernel,
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
    intercept: f64,
    classes: [u8; 2],
}

impl TryFrom<SvcParams> for SupportVectorClassifier {
    type Error = BadspotError;

    fn try_from(params: SvcParams) -> Result<Self> {
        SupportVectorClassifier::new(
            params.kernel,
            params.support_vectors,
            params.dual_coef,
            params.intercept,
            params.classes,
        )
    }
}

impl SupportVectorClassifier {
    pub fn new(
        kernel: Kernel,
        support_vectors: Vec<Vec<f64>>,
        dual_coef: Vec<f64>,
        intercept: f64,
        classes: [u8; 2],
    ) -> Result<Self> {
        let n_vectors = support_vectors.len();
        let width = support_vectors.first().map(Vec::len).unwrap_or(0);

        if n_vectors == 0 || width == 0 {
            return Err(BadspotError::InvalidFormat(
                "Support vector classifier has no support vectors".to_string(),
            ));
        }
        if let Some(row) = support_vectors.iter().find(|row| row.len() != width) {
            return Err(BadspotError::ShapeMismatch {
                context: "support vectors".to_string(),
                expected: width,
                found: row.len(),
            });
        }
        if dual_coef.len() != n_vectors {
            return Err(BadspotError::ShapeMismatch {
                context: "dual coefficients".to_string(),
                expected: n_vectors,
                found: dual_coef.len(),
            });
        }

        let flat: Vec<f64> = support_vectors.into_iter().flatten().collect();
        let support_vectors = Array2::from_shape_vec((n_vectors, width), flat)
            .map_err(|e| BadspotError::InvalidFormat(format!("Bad support vector layout: {}", e)))?;

        Ok(Self {
            kernel,
            support_vectors,
            dual_coef: Array1::from(dual_coef),
            intercept,
            classes: check_classes(classes)?,
        })
    }

    pub fn decision_value(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.support_vectors
            .outer_iter()
            .zip(self.dual_coef.iter())
            .map(|(sv, coef)| coef * self.kernel.evaluate(sv, row))
            .sum::<f64>()
            + self.intercept
    }
}

impl Classifier for SupportVectorClassifier {
    fn n_features(&self) -> usize {
        self.support_vectors.ncols()
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        check_width(&features, self.n_features())?;

        Ok(features
            .outer_iter()
            .map(|row| {
                if self.decision_value(row) > 0.0 {
                    self.classes[1]
                } else {
                    self.classes[0]
                }
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!(
            "SVC ({:?} kernel, {} support vectors, {} features)",
            self.kernel,
            self.support_vectors.nrows(),
            self.n_features()
        )
    }
}

#[derive(Debug, Deserialize)]
struct LinearParams {
    coef: Vec<f64>,
    intercept: f64,
    #[serde(default = "default_classes")]
    classes: [u8; 2],
}

/// Linear decision function `w . x + b`, positive side is `classes[1]`
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "LinearParams")]
pub struct LinearClassifier {
    coef: Array1<f64>,
    intercept: f64,
    classes: [u8; 2],
}

impl TryFrom<LinearParams> for LinearClassifier {
    type Error = BadspotError;

    fn try_from(params: LinearParams) -> Result<Self> {
        LinearClassifier::new(params.coef, params.intercept, params.classes)
    }
}

impl LinearClassifier {
    pub fn new(coef: Vec<f64>, intercept: f64, classes: [u8; 2]) -> Result<Self> {
        if coef.is_empty() {
            return Err(BadspotError::InvalidFormat(
                "Linear classifier has no coefficients".to_string(),
            ));
        }

        Ok(Self {
            coef: Array1::from(coef),
            intercept,
            classes: check_classes(classes)?,
        })
    }
}

impl Classifier for LinearClassifier {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
        check_width(&features, self.n_features())?;

        let decisions = features.dot(&self.coef) + self.intercept;
        Ok(decisions
            .iter()
            .map(|d| if *d > 0.0 { self.classes[1] } else { self.classes[0] })
            .collect())
    }

    fn describe(&self) -> String {
        format!("Linear classifier ({} features)", self.n_features())
    }
}

/// Serialized classifier artifact, tagged by `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    Svc(SupportVectorClassifier),
    Linear(LinearClassifier),
}

impl ClassifierArtifact {
    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            ClassifierArtifact::Svc(model) => Box::new(model),
            ClassifierArtifact::Linear(model) => Box::new(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_kernel_svc() {
        // f(x) = 1*(x.[1,0]) - 1*(x.[0,1]) + 0  =>  positive when x0 > x1
        let svc = SupportVectorClassifier::new(
            Kernel::Linear,
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![1.0, -1.0],
            0.0,
            [0, 1],
        )
        .unwrap();

        let labels = svc.predict(array![[2.0, 1.0], [1.0, 2.0]].view()).unwrap();
        assert_eq!(labels, vec![1, 0]);
    }

    #[test]
    fn test_rbf_kernel() {
        let kernel = Kernel::Rbf { gamma: 0.5 };
        let a = array![0.0, 0.0];
        let b = array![1.0, 1.0];

        assert!((kernel.evaluate(a.view(), a.view()) - 1.0).abs() < 1e-12);
        assert!((kernel.evaluate(a.view(), b.view()) - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_svc_artifact() {
        let json = r#"{
            "kind": "svc",
            "kernel": {"type": "rbf", "gamma": 0.1},
            "support_vectors": [[0.0, 0.0], [3.0, 3.0]],
            "dual_coef": [-1.0, 1.0],
            "intercept": 0.0
        }"#;
        let classifier = serde_json::from_str::<ClassifierArtifact>(json)
            .unwrap()
            .into_classifier();

        assert_eq!(classifier.n_features(), 2);
        let labels = classifier
            .predict(array![[0.1, 0.0], [2.9, 3.1]].view())
            .unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_svc() {
        let json = r#"{
            "kind": "svc",
            "kernel": {"type": "linear"},
            "support_vectors": [[0.0, 0.0], [3.0]],
            "dual_coef": [-1.0, 1.0],
            "intercept": 0.0
        }"#;
        assert!(serde_json::from_str::<ClassifierArtifact>(json).is_err());

        let json = r#"{"kind": "linear", "coef": [1.0], "intercept": 0.0, "classes": [0, 2]}"#;
        assert!(serde_json::from_str::<ClassifierArtifact>(json).is_err());
    }

    #[test]
    fn test_linear_classifier_and_width_check() {
        let model = LinearClassifier::new(vec![1.0, 1.0], -1.0, [0, 1]).unwrap();

        assert_eq!(
            model.predict(array![[1.0, 1.0], [0.2, 0.3]].view()).unwrap(),
            vec![1, 0]
        );
        assert!(matches!(
            model.predict(array![[1.0]].view()),
            Err(BadspotError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_swapped_classes() {
        let model = LinearClassifier::new(vec![1.0], 0.0, [1, 0]).unwrap();
        assert_eq!(model.predict(array![[1.0], [-1.0]].view()).unwrap(), vec![0, 1]);
    }
}
