//! Per-run scratch directories.
//!
//! A run named `a2c-ai-stack-<timestamp>` gets `<work_dir>/<name>` for
//! generated sources and `<work_dir>/<name>_logs` for raw model responses.
//! Runs started within the same second get a `_N` suffix.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use log::{debug, info};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::StorageError;

pub const RUN_NAME_PREFIX: &str = "a2c-ai-stack-";

#[derive(Debug, Clone)]
pub struct RunWorkspace {
    name: String,
    output_dir: PathBuf,
    log_dir: PathBuf,
}

impl RunWorkspace {
    /// Creates a workspace named after the current local time.
    pub async fn create(work_dir: &Path) -> Result<Self, StorageError> {
        let name = format!("{}{}", RUN_NAME_PREFIX, Local::now().format("%Y%m%d_%H%M%S"));
        Self::create_named(work_dir, &name).await
    }

    /// Creates `<work_dir>/<name>` and its log directory. Neither may exist
    /// yet; when they do, `name_1`, `name_2`, ... are tried instead.
    pub async fn create_named(work_dir: &Path, name: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(work_dir)
            .await
            .map_err(|e| StorageError::io(work_dir, e))?;

        let mut suffix = 0u32;
        loop {
            let candidate = if suffix == 0 {
                name.to_string()
            } else {
                format!("{}_{}", name, suffix)
            };
            let output_dir = work_dir.join(&candidate);
            let log_dir = work_dir.join(format!("{}_logs", candidate));
            if fs::try_exists(&log_dir).await.map_err(|e| StorageError::io(&log_dir, e))? {
                suffix += 1;
                continue;
            }
            match fs::create_dir(&output_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    suffix += 1;
                    continue;
                }
                Err(e) => return Err(StorageError::io(&output_dir, e)),
            }
            fs::create_dir(&log_dir)
                .await
                .map_err(|e| StorageError::io(&log_dir, e))?;

            info!("Run workspace ready: {}", output_dir.display());
            return Ok(Self {
                name: candidate,
                output_dir,
                log_dir,
            });
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Writes a generated source file, replacing any previous version.
    /// `file_name` must be a single path component.
    pub async fn write_source(&self, file_name: &str, contents: &str) -> Result<PathBuf, StorageError> {
        if !is_bare_file_name(file_name) {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(path)
    }

    /// Stores a raw model response as `<label>.txt`. An existing file is
    /// never overwritten; a numeric suffix is added instead.
    pub async fn write_log(&self, label: &str, contents: &str) -> Result<PathBuf, StorageError> {
        let stem = sanitize_label(label);
        let mut suffix = 0u32;
        loop {
            let file_name = if suffix == 0 {
                format!("{}.txt", stem)
            } else {
                format!("{}_{}.txt", stem, suffix)
            };
            let path = self.log_dir.join(file_name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes())
                        .await
                        .map_err(|e| StorageError::io(&path, e))?;
                    file.flush().await.map_err(|e| StorageError::io(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }
    }
}

fn is_bare_file_name(file_name: &str) -> bool {
    let mut components = Path::new(file_name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !file_name.contains(['/', '\\'])
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "response".to_string()
    } else {
        cleaned
    }
}
