//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use llm_requester::{LlmClient, LlmError, LlmRequest};
use prompt_builder::{keys, PromptStore};
use storage_services::{ArtifactStore, ObjectLocation, PresignedUpload, PublishedArtifact, StorageError};

type Responder = Box<dyn Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync>;
type Delay = Box<dyn Fn(&LlmRequest) -> Duration + Send + Sync>;

pub struct ScriptedLlm {
    respond: Responder,
    delay: Option<Delay>,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(respond: impl Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: impl Fn(&LlmRequest) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(request)).await;
        }
        (self.respond)(request)
    }
}

pub const DIAGRAM_BYTES: &[u8] = b"\x89PNG fake diagram";

#[derive(Default)]
pub struct MemoryStore {
    pub fetches: AtomicUsize,
    pub published: Mutex<Vec<PathBuf>>,
}

impl MemoryStore {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn fetch(&self, location: &ObjectLocation, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let dest = dest_dir.join(location.file_name());
        tokio::fs::write(&dest, DIAGRAM_BYTES)
            .await
            .map_err(|source| StorageError::Io {
                path: dest.clone(),
                source,
            })?;
        Ok(dest)
    }

    async fn publish(&self, archive: &Path) -> Result<PublishedArtifact, StorageError> {
        self.published.lock().unwrap().push(archive.to_path_buf());
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        Ok(PublishedArtifact {
            location: ObjectLocation::new("results", format!("subdirectory/test/{}", name)),
            presigned_url: format!("https://results.example/{}?signed", name),
            expires_in: Duration::from_secs(86_400),
        })
    }

    async fn presign_upload(&self, key: &str, _content_type: &str) -> Result<PresignedUpload, StorageError> {
        Ok(PresignedUpload {
            location: ObjectLocation::new("diagrams", key),
            upload_url: format!("https://diagrams.example/{}?put", key),
            expires_in: Duration::from_secs(3_600),
        })
    }
}

pub fn prompt_store() -> PromptStore {
    PromptStore::from_pairs([
        (keys::ARCHITECTURE_DESCRIPTION, "Describe this diagram."),
        (keys::MODULES_DESCRIPTION, "MODULES: "),
        (keys::DEPLOYMENT_SEQUENCE, "SEQUENCE: "),
        (
            keys::STAGING_TEMPLATE,
            "STAGING write {{staging_file}} importing\n {{stack_imports}}\nfrom\n {{module_files}}",
        ),
        (keys::MODULE_PROMPT_SUFFIX, "Be precise."),
        (keys::STEP_2, "STEP2 list IAM roles"),
        (keys::STEP_3, "STEP3 rewrite in {code_language}"),
        (keys::STEP_4, "STEP4 final {code_language}"),
    ])
}

pub const SEQUENCE_JSON: &str = r#"{
  "deployment_order": "Storage first, then compute",
  "Storage Module": "S3 bucket holding uploads",
  "Compute Module": "Lambda resizing uploads",
  "stack_names": ["Storage", "Compute"]
}"#;

/// Multimodal stages: description, modules, sequence.
pub fn analysis_llm(sequence: &'static str) -> ScriptedLlm {
    ScriptedLlm::new(move |request| {
        let prompt = request.prompt.as_str();
        let answer = if request.image.is_some() {
            "A web upload flow with S3 and Lambda".to_string()
        } else if prompt.starts_with("MODULES") {
            "Storage Module and Compute Module".to_string()
        } else if prompt.starts_with("SEQUENCE") {
            sequence.to_string()
        } else {
            return Err(LlmError::InvalidRequest(format!("unexpected prompt: {}", prompt)));
        };
        Ok(answer)
    })
}

/// Name quoted in the module prompt, e.g. `Storage Module`.
pub fn module_name_in(prompt: &str) -> Option<&str> {
    let start = prompt.find("module name '")? + "module name '".len();
    let len = prompt[start..].find('\'')?;
    Some(&prompt[start..start + len])
}

fn fence_tag(prompt: &str) -> &'static str {
    if prompt.contains("typescript") || prompt.contains("app.ts") {
        "typescript"
    } else {
        "python"
    }
}

/// Module chain steps and the staging file. Modules whose name contains
/// "Broken" never produce a code block.
pub fn codegen_llm() -> ScriptedLlm {
    ScriptedLlm::new(|request| {
        let prompt = request.prompt.as_str();
        let tag = fence_tag(prompt);
        if prompt.starts_with("STAGING") {
            return Ok(format!("```{}\nimport * as cdk from 'aws-cdk-lib';\n```", tag));
        }
        if prompt.starts_with("STEP2") {
            return Ok("s3:PutObject for the uploader".to_string());
        }
        if prompt.starts_with("STEP3") {
            return Ok(prompt.to_string());
        }
        if prompt.starts_with("STEP4") {
            let name = module_name_in(prompt).unwrap_or("Unknown");
            if name.contains("Broken") {
                return Ok("I could not produce this stack.".to_string());
            }
            let base = name.replace(" Module", "");
            return Ok(format!("Here it is\n```{}\nclass {}Stack:\n    pass\n```", tag, base));
        }
        Ok(prompt.to_string())
    })
}
