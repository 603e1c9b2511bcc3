use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Mutex;
use url::Url;

use crate::error::{BadspotError, Result};
use crate::storage::{BlobStore, ServiceAccountKey};
use crate::utils::constants::GCS_SCOPE;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the token actually expires
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

/// Google Cloud Storage client over the JSON API.
///
/// Calls are blocking and are not retried; a failed request surfaces as an error right away.
pub struct GcsBlobStore {
    agent: ureq::Agent,
    endpoint: Url,
    bucket: String,
    key: ServiceAccountKey,
    token: Mutex<Option<AccessToken>>,
}

impl GcsBlobStore {
    pub fn new(key: ServiceAccountKey, bucket: &str, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BadspotError::Config(format!("Invalid storage endpoint '{}': {}", endpoint, e)))?;

        Ok(Self {
            agent: ureq::AgentBuilder::new().build(),
            endpoint,
            bucket: bucket.to_string(),
            key,
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String> {
        let mut cached = self
            .token
            .lock()
            .map_err(|_| BadspotError::Storage("Access token lock poisoned".to_string()))?;

        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let token = self.mint_token(now)?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Exchange a signed JWT assertion for an OAuth2 access token
    fn mint_token(&self, now: i64) -> Result<AccessToken> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: GCS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| BadspotError::Credential(format!("Invalid private key: {}", e)))?;
        let assertion = encode(&header, &claims, &signing_key)
            .map_err(|e| BadspotError::Credential(format!("Cannot sign token request: {}", e)))?;

        tracing::debug!(client = %self.key.client_email, "requesting storage access token");

        let response = self
            .agent
            .post(&self.key.token_uri)
            .send_form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => BadspotError::Credential(format!(
                    "Token endpoint rejected the credential (HTTP {})",
                    code
                )),
                other => BadspotError::Storage(format!("Token request failed: {}", other)),
            })?;

        let token: TokenResponse = response
            .into_json()
            .map_err(|e| BadspotError::Credential(format!("Malformed token response: {}", e)))?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS),
        })
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BadspotError::Config(format!("Endpoint '{}' cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, object: &str) -> Result<Url> {
        let mut url = self.url_with_segments(&["storage", "v1", "b", &self.bucket, "o", object])?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn upload_url(&self, object: &str) -> Result<Url> {
        let mut url = self.url_with_segments(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);
        Ok(url)
    }

    fn map_request_error(&self, object: &str, err: ureq::Error) -> BadspotError {
        match err {
            ureq::Error::Status(404, _) => BadspotError::ObjectNotFound {
                bucket: self.bucket.clone(),
                object: object.to_string(),
            },
            ureq::Error::Status(code @ (401 | 403), _) => BadspotError::Credential(format!(
                "Access to '{}' in bucket '{}' denied (HTTP {})",
                object, self.bucket, code
            )),
            ureq::Error::Status(code, _) => {
                BadspotError::Storage(format!("Request for '{}' failed with HTTP {}", object, code))
            }
            ureq::Error::Transport(t) => {
                BadspotError::Storage(format!("Request for '{}' failed: {}", object, t))
            }
        }
    }
}

impl BlobStore for GcsBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn fetch(&self, object: &str) -> Result<Vec<u8>> {
        let token = self.access_token()?;
        let url = self.object_url(object)?;
        tracing::info!(bucket = %self.bucket, object, "downloading object");

        let response = self
            .agent
            .request_url("GET", &url)
            .set("Authorization", &format!("Bearer {}", token))
            .call()
            .map_err(|e| self.map_request_error(object, e))?;

        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn put(&self, object: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let token = self.access_token()?;
        let url = self.upload_url(object)?;
        tracing::info!(bucket = %self.bucket, object, bytes = bytes.len(), "uploading object");

        self.agent
            .request_url("POST", &url)
            .set("Authorization", &format!("Bearer {}", token))
            .set("Content-Type", content_type)
            .send_bytes(bytes)
            .map_err(|e| self.map_request_error(object, e))?;

        Ok(())
    }

    fn check_bucket(&self) -> Result<()> {
        let token = self.access_token()?;
        let url = self.url_with_segments(&["storage", "v1", "b", &self.bucket])?;

        self.agent
            .request_url("GET", &url)
            .set("Authorization", &format!("Bearer {}", token))
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(404, _) => {
                    BadspotError::Storage(format!("Bucket '{}' not found", self.bucket))
                }
                other => self.map_request_error("<bucket>", other),
            })?;

        Ok(())
    }
}
