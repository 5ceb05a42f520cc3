//! Object storage and local files for pipeline runs: input download,
//! per-run directories, archive creation and publishing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

pub mod archive;
mod error;
pub mod location;
pub mod pkg_config;
pub mod s3_store;
pub mod workspace;

pub use archive::zip_directory;
pub use error::StorageError;
pub use location::ObjectLocation;
pub use s3_store::{S3ArtifactStore, upload_location};
pub use workspace::RunWorkspace;

/// Result of publishing an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub location: ObjectLocation,
    pub presigned_url: String,
    pub expires_in: Duration,
}

/// Time-limited PUT link for uploading a diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    pub location: ObjectLocation,
    pub upload_url: String,
    pub expires_in: Duration,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Downloads the object into `dest_dir`, keeping its file name.
    async fn fetch(&self, location: &ObjectLocation, dest_dir: &Path) -> Result<PathBuf, StorageError>;

    /// Uploads the archive and returns a time-limited download link.
    async fn publish(&self, archive: &Path) -> Result<PublishedArtifact, StorageError>;

    /// Returns a link a client can PUT a diagram of `content_type` to.
    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<PresignedUpload, StorageError>;
}
