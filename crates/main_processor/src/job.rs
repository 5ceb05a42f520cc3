use anyhow::{Context, Result};
use log::info;
use prompt_builder::CodeLanguage;
use serde::{Deserialize, Serialize};
use storage_services::ObjectLocation;

use crate::pipeline::{ImageSource, Pipeline};

pub const COMPLETION_MESSAGE: &str = "Code generation completed successfully";

/// Payload of an asynchronous generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// `s3://bucket/key` of the uploaded diagram.
    pub file_path: String,
    pub code_language: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub message: String,
    pub presigned_url: String,
}

impl JobRequest {
    /// Checks language and location without touching the network.
    pub fn validate(&self) -> Result<(CodeLanguage, ObjectLocation)> {
        let language: CodeLanguage = self.code_language.parse()?;
        let location: ObjectLocation = self.file_path.parse()?;
        Ok((language, location))
    }
}

/// Runs the pipeline for `request`, publishes the archive and returns its link.
pub async fn handle_job(pipeline: &Pipeline<'_>, request: &JobRequest) -> Result<JobOutcome> {
    let (language, location) = request.validate()?;
    info!(
        "Job received for {} in {} (requested by {})",
        location,
        language,
        request.user_email.as_deref().unwrap_or("unknown")
    );

    let output = pipeline.run(&ImageSource::Object(location), language).await?;
    let published = pipeline
        .store()
        .publish(&output.archive)
        .await
        .with_context(|| format!("Failed to publish {}", output.archive.display()))?;
    info!(
        "Published {} (link valid for {}s)",
        published.location,
        published.expires_in.as_secs()
    );

    Ok(JobOutcome {
        message: COMPLETION_MESSAGE.to_string(),
        presigned_url: published.presigned_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_without_optional_fields() {
        let request: JobRequest =
            serde_json::from_str(r#"{"file_path": "s3://in/arch.png", "code_language": "TypeScript"}"#).unwrap();
        assert_eq!(request.user_email, None);
        let (language, location) = request.validate().unwrap();
        assert_eq!(language, CodeLanguage::TypeScript);
        assert_eq!(location, ObjectLocation::new("in", "arch.png"));
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let request = JobRequest {
            file_path: "s3://in/arch.png".into(),
            code_language: "java".into(),
            user_email: None,
            connection_id: None,
        };
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported language"));
    }

    #[test]
    fn outcome_shape() {
        let outcome = JobOutcome {
            message: COMPLETION_MESSAGE.into(),
            presigned_url: "https://example/x.zip".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["message"], "Code generation completed successfully");
        assert_eq!(value["presigned_url"], "https://example/x.zip");
    }
}
