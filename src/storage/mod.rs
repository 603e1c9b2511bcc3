//! Object store access for model artifacts and published results.
//!
//! Everything the pipeline needs from a bucket goes through [`BlobStore`], which is handed
//! to the session explicitly once credentials are supplied.

pub mod credentials;
pub mod gcs;
pub mod local;

pub use credentials::{CredentialSource, ServiceAccountKey};
pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;

use crate::error::Result;

pub trait BlobStore: Send + Sync {
    /// Name of the bucket this client is bound to
    fn bucket(&self) -> &str;

    /// Download a named object in full
    fn fetch(&self, object: &str) -> Result<Vec<u8>>;

    /// Upload (create or replace) a named object
    fn put(&self, object: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Confirm the bucket is reachable with the current credentials
    fn check_bucket(&self) -> Result<()>;
}
