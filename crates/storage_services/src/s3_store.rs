use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Local;
use log::{error, info};
use tokio::fs;

use crate::pkg_config::StorageConfig;
use crate::{ArtifactStore, ObjectLocation, PresignedUpload, PublishedArtifact, StorageError};

pub struct S3ArtifactStore {
    client: Client,
    results_bucket: String,
    diagram_bucket: String,
    key_prefix: String,
    presign_expiry: Duration,
    upload_expiry: Duration,
}

impl S3ArtifactStore {
    pub fn new(client: Client, config: &StorageConfig) -> Self {
        Self {
            client,
            results_bucket: config.results_bucket.clone(),
            diagram_bucket: config.diagram_bucket.clone(),
            key_prefix: config.key_prefix.clone(),
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
            upload_expiry: Duration::from_secs(config.upload_expiry_secs),
        }
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig, config: &StorageConfig) -> Self {
        Self::new(Client::new(sdk_config), config)
    }
}

/// `<prefix>/<timestamp>/<file_name>`, skipping an empty prefix.
pub fn upload_key(prefix: &str, timestamp: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", timestamp, file_name)
    } else {
        format!("{}/{}/{}", prefix, timestamp, file_name)
    }
}

/// Where an uploaded diagram goes. Bucket, key and content type must all be set.
pub fn upload_location(bucket: &str, key: &str, content_type: &str) -> Result<ObjectLocation, StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::MissingField("diagram bucket"));
    }
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(StorageError::MissingField("key"));
    }
    if content_type.trim().is_empty() {
        return Err(StorageError::MissingField("contentType"));
    }
    Ok(ObjectLocation::new(bucket, key))
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn fetch(&self, location: &ObjectLocation, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        info!("Downloading {}", location);
        let transfer_err = |message: String| StorageError::Transfer {
            location: location.to_string(),
            message,
        };

        let object = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                error!("Download of {} failed: {}", location, DisplayErrorContext(&e));
                transfer_err(DisplayErrorContext(&e).to_string())
            })?;
        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| transfer_err(e.to_string()))?
            .into_bytes();

        let dest = dest_dir.join(location.file_name());
        fs::write(&dest, &bytes)
            .await
            .map_err(|e| StorageError::io(&dest, e))?;
        info!("Downloaded {} bytes to {}", bytes.len(), dest.display());
        Ok(dest)
    }

    async fn publish(&self, archive: &Path) -> Result<PublishedArtifact, StorageError> {
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidLocation(archive.display().to_string()))?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let location = ObjectLocation::new(
            &self.results_bucket,
            upload_key(&self.key_prefix, &timestamp, &file_name),
        );

        let body = ByteStream::from_path(archive)
            .await
            .map_err(|e| StorageError::Transfer {
                location: location.to_string(),
                message: e.to_string(),
            })?;
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Upload to {} failed: {}", location, DisplayErrorContext(&e));
                StorageError::Transfer {
                    location: location.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                }
            })?;
        info!("Uploaded {} to {}", archive.display(), location);

        let presign_err = |message: String| StorageError::Presign {
            location: location.to_string(),
            message,
        };
        let presigning = PresigningConfig::expires_in(self.presign_expiry).map_err(|e| presign_err(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(DisplayErrorContext(&e).to_string()))?;

        Ok(PublishedArtifact {
            presigned_url: presigned.uri().to_string(),
            expires_in: self.presign_expiry,
            location,
        })
    }

    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<PresignedUpload, StorageError> {
        let location = upload_location(&self.diagram_bucket, key, content_type)?;
        let presign_err = |message: String| StorageError::Presign {
            location: location.to_string(),
            message,
        };
        let presigning = PresigningConfig::expires_in(self.upload_expiry).map_err(|e| presign_err(e.to_string()))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(DisplayErrorContext(&e).to_string()))?;
        info!("Presigned upload to {} for {}s", location, self.upload_expiry.as_secs());

        Ok(PresignedUpload {
            upload_url: presigned.uri().to_string(),
            expires_in: self.upload_expiry,
            location,
        })
    }
}
