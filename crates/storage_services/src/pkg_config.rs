use std::path::PathBuf;

use serde::Deserialize;

/// `[storage]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket receiving finished archives.
    pub results_bucket: String,
    /// Bucket clients upload diagrams to.
    pub diagram_bucket: String,
    /// Prefix in front of `<timestamp>/<archive name>`.
    pub key_prefix: String,
    pub work_dir: PathBuf,
    pub presign_expiry_secs: u64,
    pub upload_expiry_secs: u64,
    pub region: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_bucket: String::new(),
            diagram_bucket: String::new(),
            key_prefix: "subdirectory".to_string(),
            work_dir: std::env::temp_dir(),
            presign_expiry_secs: 86_400,
            upload_expiry_secs: 3_600,
            region: None,
        }
    }
}
