use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use validator::Validate;

use crate::error::{BadspotError, Result};

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The subset of a Google service-account key file needed to mint access tokens
#[derive(Clone, Deserialize, Validate)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,

    pub project_id: Option<String>,

    pub private_key_id: Option<String>,

    #[validate(length(min = 1))]
    pub private_key: String,

    #[validate(email)]
    pub client_email: String,

    #[validate(url)]
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| BadspotError::Credential(format!("Unparseable credential JSON: {}", e)))?;

        if key.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(BadspotError::Credential(format!(
                "Expected credential type '{}', found '{}'",
                SERVICE_ACCOUNT_TYPE, key.key_type
            )));
        }

        key.validate()
            .map_err(|e| BadspotError::Credential(format!("Invalid credential: {}", e)))?;

        Ok(key)
    }
}

/// Where a credential comes from. Credentials are always injected, never compiled in.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// An environment variable holding the JSON document
    Env(String),
    /// A JSON key file supplied by the user
    File(PathBuf),
    /// JSON content received directly, e.g. from an upload
    Json(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Env(var) => f.debug_tuple("Env").field(var).finish(),
            CredentialSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialSource::Json(_) => f.debug_tuple("Json").field(&"<redacted>").finish(),
        }
    }
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountKey> {
        let json = match self {
            CredentialSource::Env(var) => std::env::var(var).map_err(|_| {
                BadspotError::Credential(format!("Environment variable '{}' is not set.", var))
            })?,
            CredentialSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                BadspotError::Credential(format!(
                    "Cannot read credential file '{}': {}",
                    path.display(),
                    e
                ))
            })?,
            CredentialSource::Json(json) => json.clone(),
        };

        ServiceAccountKey::from_json(&json)
    }

    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Env(var) => format!("environment variable {}", var),
            CredentialSource::File(path) => format!("file {}", path.display()),
            CredentialSource::Json(_) => "uploaded credential".to_string(),
        }
    }
}
