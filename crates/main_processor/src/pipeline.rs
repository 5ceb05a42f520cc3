//! The ten-stage diagram to CDK pipeline.
//!
//! Stages run strictly in order; only stage 7 fans out. Each completed stage
//! is reported to the [`ProgressReporter`] and every raw model response is
//! kept in the run's log directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use llm_requester::{ImageInput, LlmClient, LlmRequest, UNEXPECTED_RESPONSE_FORMAT};
use log::{info, warn};
use prompt_builder::stages::{
    architecture_description_prompt, deployment_sequence_prompt, module_prompts, modules_description_prompt,
    staging_prompt, CDK_EXPERT_ROLE,
};
use prompt_builder::{keys, CodeLanguage, ModuleDescriptionMap, PromptStore};
use single_processor::{ensure_distinct_file_names, extract_code_block, ModuleChain};
use storage_services::{zip_directory, ArtifactStore, ObjectLocation, RunWorkspace};
use tokio::fs;

use crate::fan_out::generate_modules;
use crate::pkg_config::AppConfig;
use crate::progress::{PipelineStage, ProgressReporter};

/// Where the architecture diagram comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Object(ObjectLocation),
    Inline { data_base64: String, mime: String },
}

impl ImageSource {
    /// `s3://bucket/key` becomes an object reference; anything else is read
    /// as a local file and inlined.
    pub async fn from_arg(arg: &str) -> Result<Self> {
        if arg.starts_with("s3://") {
            return Ok(ImageSource::Object(arg.parse()?));
        }
        Self::from_local_file(Path::new(arg)).await
    }

    pub async fn from_local_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read image: {}", path.display()))?;
        Ok(ImageSource::Inline {
            data_base64: STANDARD.encode(bytes),
            mime: infer_mime(path).to_string(),
        })
    }
}

/// MIME type from the file extension, `image/png` when unknown.
pub fn infer_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

/// Stage 1: downloads an object image into `dest_dir`. Inline images need no download.
pub async fn fetch_image(source: &ImageSource, store: &dyn ArtifactStore, dest_dir: &Path) -> Result<Option<PathBuf>> {
    match source {
        ImageSource::Object(location) => {
            let path = store
                .fetch(location, dest_dir)
                .await
                .with_context(|| format!("Failed to download diagram {}", location))?;
            Ok(Some(path))
        }
        ImageSource::Inline { .. } => Ok(None),
    }
}

/// Stage 2: base64 payload and media type for the model.
pub async fn encode_image(source: &ImageSource, downloaded: Option<&Path>) -> Result<ImageInput> {
    match (source, downloaded) {
        (ImageSource::Inline { data_base64, mime }, _) => Ok(ImageInput {
            data_base64: data_base64.clone(),
            media_type: mime.clone(),
        }),
        (ImageSource::Object(_), Some(path)) => {
            let bytes = fs::read(path)
                .await
                .with_context(|| format!("Failed to read downloaded image: {}", path.display()))?;
            Ok(ImageInput {
                data_base64: STANDARD.encode(bytes),
                media_type: infer_mime(path).to_string(),
            })
        }
        (ImageSource::Object(location), None) => {
            anyhow::bail!("Diagram {} has not been downloaded", location)
        }
    }
}

/// Stages 1 and 2 together, for callers without progress reporting.
pub async fn resolve_image(source: &ImageSource, store: &dyn ArtifactStore, dest_dir: &Path) -> Result<ImageInput> {
    let downloaded = fetch_image(source, store, dest_dir).await?;
    encode_image(source, downloaded.as_deref()).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
    pub description_max_tokens: u32,
    pub modules_max_tokens: u32,
    pub sequence_max_tokens: u32,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            work_dir: cfg.storage.work_dir.clone(),
            description_max_tokens: cfg.llm.bedrock.description_max_tokens,
            modules_max_tokens: cfg.llm.bedrock.modules_max_tokens,
            sequence_max_tokens: cfg.llm.bedrock.sequence_max_tokens,
        }
    }
}

/// Collaborators of a run.
#[derive(Clone, Copy)]
pub struct PipelineClients<'a> {
    /// Multimodal model for the description, module and sequence stages.
    pub analysis: &'a dyn LlmClient,
    /// Text model for the module chains and the staging file.
    pub codegen: &'a dyn LlmClient,
    pub store: &'a dyn ArtifactStore,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_name: String,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub module_files: Vec<PathBuf>,
    pub staging_file: PathBuf,
    pub archive: PathBuf,
}

pub struct Pipeline<'a> {
    clients: PipelineClients<'a>,
    prompts: &'a PromptStore,
    settings: &'a PipelineSettings,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        clients: PipelineClients<'a>,
        prompts: &'a PromptStore,
        settings: &'a PipelineSettings,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            clients,
            prompts,
            settings,
            progress,
        }
    }

    pub fn store(&self) -> &'a dyn ArtifactStore {
        self.clients.store
    }

    fn advance(&self, stage: PipelineStage) {
        self.progress.report(stage, stage.percent());
    }

    async fn ask(
        &self,
        client: &dyn LlmClient,
        request: LlmRequest,
        label: &str,
        workspace: &RunWorkspace,
    ) -> Result<String> {
        let response = client
            .complete(&request)
            .await
            .with_context(|| format!("LLM request '{}' failed", label))?;
        workspace.write_log(label, &response).await?;
        Ok(response)
    }

    /// Runs all ten stages and returns the generated files and the archive.
    pub async fn run(&self, image: &ImageSource, language: CodeLanguage) -> Result<PipelineOutput> {
        // Every pipeline template must exist before anything touches the network.
        for key in keys::PIPELINE {
            self.prompts.get(key)?;
        }
        let architecture_prompt = architecture_description_prompt(self.prompts)?;

        let workspace = RunWorkspace::create(&self.settings.work_dir).await?;
        info!("🚀 Starting run {} ({})", workspace.name(), language);

        let downloaded = fetch_image(image, self.clients.store, workspace.log_dir()).await?;
        self.advance(PipelineStage::DownloadImage);

        let image_input = encode_image(image, downloaded.as_deref()).await?;
        self.advance(PipelineStage::EncodeImage);

        let description = self
            .ask(
                self.clients.analysis,
                LlmRequest::new(architecture_prompt)
                    .with_image(image_input)
                    .with_max_tokens(self.settings.description_max_tokens),
                "01_architecture_description",
                &workspace,
            )
            .await?;
        if description == UNEXPECTED_RESPONSE_FORMAT {
            warn!("Architecture description came back in an unexpected format, continuing");
        }
        self.advance(PipelineStage::DescribeArchitecture);

        let modules = self
            .ask(
                self.clients.analysis,
                LlmRequest::new(modules_description_prompt(self.prompts, &description)?)
                    .with_max_tokens(self.settings.modules_max_tokens),
                "02_modules_description",
                &workspace,
            )
            .await?;
        self.advance(PipelineStage::DescribeModules);

        let sequence = self
            .ask(
                self.clients.analysis,
                LlmRequest::new(deployment_sequence_prompt(self.prompts, &modules)?)
                    .with_max_tokens(self.settings.sequence_max_tokens),
                "03_deployment_sequence",
                &workspace,
            )
            .await?;
        self.advance(PipelineStage::DeploymentSequence);

        let module_map = ModuleDescriptionMap::parse(&sequence)?;
        let prompts = module_prompts(&module_map, language);
        ensure_distinct_file_names(&prompts, language)?;
        info!(
            "Deployment sequence has {} modules and {} stacks",
            prompts.len(),
            module_map.stack_names.len()
        );
        self.advance(PipelineStage::ModulePrompts);

        let notify = |module_name: &str, notice: &str| self.progress.module_event(module_name, notice);
        let chain =
            ModuleChain::new(self.clients.codegen, self.prompts, &workspace, language).with_notifier(&notify);
        let artifacts = generate_modules(&chain, &prompts).await?;
        self.advance(PipelineStage::GenerateModules);

        let module_files: Vec<PathBuf> = artifacts.into_iter().map(|a| a.path).collect();
        let staging = staging_prompt(self.prompts, language, &module_files, &module_map.stack_names)?;
        self.advance(PipelineStage::StagingPrompt);

        let staging_response = self
            .ask(
                self.clients.codegen,
                LlmRequest::new(staging.prompt).with_system(CDK_EXPERT_ROLE),
                "04_staging_file",
                &workspace,
            )
            .await?;
        let staging_code = extract_code_block(&staging_response, language)
            .with_context(|| format!("No usable code for {}", staging.file_name))?;
        let staging_file = workspace.write_source(&staging.file_name, &staging_code).await?;
        self.advance(PipelineStage::StagingFile);

        let output_dir = workspace.output_dir().to_path_buf();
        let archive = tokio::task::spawn_blocking(move || zip_directory(&output_dir))
            .await
            .context("Archive task failed")??;
        self.advance(PipelineStage::Archive);
        info!("✅ Run {} finished: {}", workspace.name(), archive.display());

        Ok(PipelineOutput {
            run_name: workspace.name().to_string(),
            output_dir: workspace.output_dir().to_path_buf(),
            log_dir: workspace.log_dir().to_path_buf(),
            module_files,
            staging_file,
            archive,
        })
    }
}
