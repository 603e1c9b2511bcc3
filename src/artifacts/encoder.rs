use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{BadspotError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClassValue {
    Text(String),
    Integer(i64),
}

impl From<ClassValue> for String {
    fn from(value: ClassValue) -> Self {
        match value {
            ClassValue::Text(s) => s,
            ClassValue::Integer(i) => i.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EncoderParams {
    classes: Vec<ClassValue>,
}

/// Maps category labels to integer codes. The vocabulary is closed: the code of a label
/// is its position in `classes`, and labels outside it cannot be encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "EncoderParams")]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl TryFrom<EncoderParams> for LabelEncoder {
    type Error = BadspotError;

    fn try_from(params: EncoderParams) -> Result<Self> {
        LabelEncoder::new(params.classes.into_iter().map(String::from).collect())
    }
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(BadspotError::InvalidFormat(
                "Label encoder has an empty vocabulary".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), code).is_some() {
                return Err(BadspotError::InvalidFormat(format!(
                    "Label encoder lists class '{}' more than once",
                    class
                )));
            }
        }

        Ok(Self { classes, index })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_and_unknown() {
        let encoder: LabelEncoder =
            serde_json::from_str(r#"{"classes": ["Rural", "Suburban", "Urban"]}"#).unwrap();

        assert_eq!(encoder.transform("Rural"), Some(0));
        assert_eq!(encoder.transform("Urban"), Some(2));
        assert_eq!(encoder.transform("urban"), None);
        assert_eq!(encoder.inverse_transform(1), Some("Suburban"));
    }

    #[test]
    fn test_integer_classes() {
        let encoder: LabelEncoder = serde_json::from_str(r#"{"classes": [1, 2, 4]}"#).unwrap();
        assert_eq!(encoder.transform("4"), Some(2));
    }

    #[test]
    fn test_invalid_vocabularies() {
        assert!(serde_json::from_str::<LabelEncoder>(r#"{"classes": []}"#).is_err());
        assert!(serde_json::from_str::<LabelEncoder>(r#"{"classes": ["A", "A"]}"#).is_err());
    }
}
