pub mod analysis;
pub mod fan_out;
pub mod job;
pub mod pipeline;
pub mod pkg_config;
pub mod progress;

use std::sync::Arc;

use anyhow::{Context, Result};
use llm_requester::LlmClient;
use prompt_builder::{CodeLanguage, PromptStore};
use storage_services::ArtifactStore;

pub use analysis::{
    analyze_diagram, describe_diagram, run_analysis_action, AnalysisAction, AnalysisEvent, AnalysisKind,
    AnalysisLimits, AnalysisResponse,
};
pub use job::{handle_job, JobOutcome, JobRequest, COMPLETION_MESSAGE};
pub use pipeline::{ImageSource, Pipeline, PipelineClients, PipelineOutput, PipelineSettings};
pub use pkg_config::AppConfig;
pub use progress::{BarProgress, LogProgress, PipelineStage, ProgressReporter};

/// Configuration, prompts and clients built once and shared by every run.
pub struct MainProcessor {
    cfg: AppConfig,
    prompts: PromptStore,
    settings: PipelineSettings,
    analysis: Arc<dyn LlmClient>,
    codegen: Arc<dyn LlmClient>,
    store: Arc<dyn ArtifactStore>,
}

impl MainProcessor {
    /// Loads the prompt files named in `cfg`.
    pub fn new(
        cfg: AppConfig,
        analysis: Arc<dyn LlmClient>,
        codegen: Arc<dyn LlmClient>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        let prompts = PromptStore::load(&cfg.prompts.pipeline_file, &cfg.prompts.chain_file)
            .context("Failed to load prompt templates")?;
        Ok(Self::with_prompts(cfg, prompts, analysis, codegen, store))
    }

    pub fn with_prompts(
        cfg: AppConfig,
        prompts: PromptStore,
        analysis: Arc<dyn LlmClient>,
        codegen: Arc<dyn LlmClient>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let settings = PipelineSettings::from_config(&cfg);
        Self {
            cfg,
            prompts,
            settings,
            analysis,
            codegen,
            store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    fn pipeline<'a>(&'a self, progress: &'a dyn ProgressReporter) -> Pipeline<'a> {
        Pipeline::new(
            PipelineClients {
                analysis: self.analysis.as_ref(),
                codegen: self.codegen.as_ref(),
                store: self.store.as_ref(),
            },
            &self.prompts,
            &self.settings,
            progress,
        )
    }

    /// Runs the pipeline without publishing the archive.
    pub async fn generate(
        &self,
        image: &ImageSource,
        language: CodeLanguage,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let output = self.pipeline(progress).run(image, language).await;
        progress.finish();
        output
    }

    /// Runs a job end to end, publishing the archive.
    pub async fn run_job(&self, request: &JobRequest, progress: &dyn ProgressReporter) -> Result<JobOutcome> {
        let outcome = handle_job(&self.pipeline(progress), request).await;
        progress.finish();
        outcome
    }
}
