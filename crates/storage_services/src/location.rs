use std::fmt;
use std::str::FromStr;

use crate::StorageError;

/// Bucket and key of an object, written `s3://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl FromStr for ObjectLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidLocation(s.to_string());
        let rest = s.trim().strip_prefix("s3://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(invalid());
        }
        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        let loc: ObjectLocation = "s3://diagrams/uploads/2024/arch.png".parse().unwrap();
        assert_eq!(loc.bucket, "diagrams");
        assert_eq!(loc.key, "uploads/2024/arch.png");
        assert_eq!(loc.file_name(), "arch.png");
        assert_eq!(loc.to_string(), "s3://diagrams/uploads/2024/arch.png");
    }

    #[test]
    fn rejects_malformed_locations() {
        for bad in ["diagrams/arch.png", "s3://diagrams", "s3:///arch.png", "s3://diagrams/dir/"] {
            assert!(bad.parse::<ObjectLocation>().is_err(), "{bad} should be rejected");
        }
    }
}
