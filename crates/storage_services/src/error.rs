use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object location '{0}', expected s3://bucket/key")]
    InvalidLocation(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid file name '{0}', expected a bare file name")]
    InvalidFileName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("object transfer failed for {location}: {message}")]
    Transfer { location: String, message: String },

    #[error("failed to presign {location}: {message}")]
    Presign { location: String, message: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
