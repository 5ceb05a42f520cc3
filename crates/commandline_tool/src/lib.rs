use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::{Parser, Subcommand};
use llm_requester::{BedrockProvider, ChatCompletionsProvider, ImageInput, LlmRequest, RetryPolicy};
use log::{error, info};
use main_processor::pipeline::resolve_image;
use main_processor::{
    AnalysisAction, AnalysisEvent, AnalysisLimits, AppConfig, BarProgress, ImageSource, JobOutcome, JobRequest,
    LogProgress, MainProcessor, ProgressReporter, COMPLETION_MESSAGE, describe_diagram, run_analysis_action,
};
use prompt_builder::{CodeLanguage, PromptStore, keys};
use serde_json::json;
use storage_services::{ArtifactStore, S3ArtifactStore};

#[derive(Parser)]
#[command(name = "arch2code")]
#[command(version)]
#[command(about = "Architecture diagram to AWS CDK", long_about = None)]
pub struct Cli {
    /// Show debug logs
    #[arg(long, short = 'd', global = true, help = "show debug log")]
    pub debug: bool,

    #[arg(long, global = true, value_name = "FILE", help = "config file (default: config/config.toml)")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'q', global = true, help = "log progress instead of drawing a bar")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate CDK stacks from an architecture diagram
    Generate {
        #[arg(long, short, value_name = "IMAGE", help = "s3://bucket/key or a local image path")]
        image: String,

        #[arg(long, short, value_name = "LANG", default_value = "python", value_parser = parse_language)]
        language: CodeLanguage,

        /// Upload the archive and print a download link
        #[arg(long)]
        upload: bool,
    },

    /// Run a job request read from a JSON file
    Job {
        #[arg(long, short, value_name = "FILE", required = true)]
        event: PathBuf,
    },

    /// Stream a diagram analysis as JSON lines
    Analyze {
        #[arg(long, short, value_name = "IMAGE")]
        image: String,

        /// analyze, cdk-modules or optimize
        #[arg(long, short, default_value = "analyze", value_parser = parse_action)]
        action: AnalysisAction,
    },

    /// Describe a diagram in one request and print the timing
    Describe {
        #[arg(long, short, value_name = "IMAGE")]
        image: String,

        #[arg(long, short)]
        prompt: Option<String>,
    },

    /// Print a presigned PUT link for uploading a diagram
    UploadUrl {
        #[arg(long, short, value_name = "KEY")]
        key: String,

        #[arg(long, short = 't', value_name = "MIME", default_value = "image/png")]
        content_type: String,
    },
}

fn parse_language(raw: &str) -> Result<CodeLanguage, String> {
    raw.parse::<CodeLanguage>().map_err(|e| e.to_string())
}

fn parse_action(raw: &str) -> Result<AnalysisAction, String> {
    raw.parse::<AnalysisAction>()
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

fn progress_for(quiet: bool) -> Box<dyn ProgressReporter> {
    if quiet {
        Box::new(LogProgress)
    } else {
        Box::new(BarProgress::new())
    }
}

/// Builds the Bedrock, chat and S3 clients once and hands them to the processor.
pub async fn build_processor(cfg: AppConfig) -> Result<MainProcessor> {
    let bedrock_sdk = load_sdk_config(cfg.llm.bedrock.region.as_deref()).await;
    let storage_sdk = match &cfg.storage.region {
        Some(region) if cfg.llm.bedrock.region.as_ref() != Some(region) => load_sdk_config(Some(region)).await,
        _ => bedrock_sdk.clone(),
    };

    let analysis = BedrockProvider::from_sdk_config(&bedrock_sdk, &cfg.llm.bedrock);
    let codegen = ChatCompletionsProvider::new(&cfg.llm.chat).context("Failed to create chat completions client")?;
    let store = S3ArtifactStore::from_sdk_config(&storage_sdk, &cfg.storage);

    MainProcessor::new(cfg, Arc::new(analysis), Arc::new(codegen), Arc::new(store))
}

pub async fn run_generate(
    processor: &MainProcessor,
    image: &str,
    language: CodeLanguage,
    upload: bool,
    quiet: bool,
) -> Result<()> {
    let source = ImageSource::from_arg(image).await?;
    let progress = progress_for(quiet);
    let output = processor.generate(&source, language, progress.as_ref()).await?;

    println!("📁 Generated {} module stacks in {}", output.module_files.len(), output.output_dir.display());
    println!("📦 Archive: {}", output.archive.display());
    println!("📝 Model responses: {}", output.log_dir.display());

    if upload {
        let published = processor
            .store()
            .publish(&output.archive)
            .await
            .context("Failed to publish archive")?;
        info!("Published to {}", published.location);
        let outcome = JobOutcome {
            message: COMPLETION_MESSAGE.to_string(),
            presigned_url: published.presigned_url,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

pub fn read_job_request(path: &Path) -> Result<JobRequest> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read job event: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid job event: {}", path.display()))
}

pub async fn run_job(processor: &MainProcessor, event: &Path, quiet: bool) -> Result<()> {
    let request = read_job_request(event)?;
    let progress = progress_for(quiet);
    let outcome = processor.run_job(&request, progress.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// The given prompt, or the configured architecture description prompt.
fn analysis_prompt(cfg: &AppConfig, prompt: Option<String>) -> Result<String> {
    if let Some(prompt) = prompt {
        return Ok(prompt);
    }
    let store = PromptStore::load_keys(&cfg.prompts.pipeline_file, &[keys::ARCHITECTURE_DESCRIPTION])?;
    Ok(store.get(keys::ARCHITECTURE_DESCRIPTION)?.to_string())
}

async fn load_image(cfg: &AppConfig, sdk: &SdkConfig, image: &str) -> Result<ImageInput> {
    let source = ImageSource::from_arg(image).await?;
    let store = S3ArtifactStore::from_sdk_config(sdk, &cfg.storage);
    resolve_image(&source, &store, &cfg.storage.work_dir).await
}

async fn analysis_request(cfg: &AppConfig, sdk: &SdkConfig, image: &str, prompt: Option<String>) -> Result<LlmRequest> {
    let prompt = analysis_prompt(cfg, prompt)?;
    let image = load_image(cfg, sdk, image).await?;
    Ok(LlmRequest::new(prompt)
        .with_image(image)
        .with_max_tokens(cfg.llm.bedrock.description_max_tokens))
}

/// Token limits for streamed analysis; a zero thinking budget turns thinking off.
pub fn analysis_limits(cfg: &AppConfig) -> AnalysisLimits {
    let budget = cfg.llm.bedrock.thinking_budget_tokens;
    AnalysisLimits {
        max_tokens: cfg.llm.bedrock.max_tokens,
        thinking_budget: (budget > 0).then_some(budget),
    }
}

pub async fn run_analyze(cfg: &AppConfig, image: &str, action: AnalysisAction) -> Result<()> {
    let prompts = PromptStore::load_keys(&cfg.prompts.analysis_file, &keys::STREAMED_ANALYSIS)
        .context("Failed to load analysis prompts")?;
    let sdk = load_sdk_config(cfg.llm.bedrock.region.as_deref()).await;
    let image = load_image(cfg, &sdk, image).await?;
    let client = BedrockProvider::from_sdk_config(&sdk, &cfg.llm.bedrock);
    let policy = RetryPolicy::from_config(&cfg.llm.retry);

    let sink = |event: AnalysisEvent| match serde_json::to_string(&event) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to encode analysis event: {}", e),
    };
    run_analysis_action(&client, &prompts, action, &image, analysis_limits(cfg), &policy, &sink).await?;
    Ok(())
}

pub async fn run_upload_url(cfg: &AppConfig, key: &str, content_type: &str) -> Result<()> {
    let sdk = load_sdk_config(cfg.storage.region.as_deref()).await;
    let store = S3ArtifactStore::from_sdk_config(&sdk, &cfg.storage);
    let upload = store
        .presign_upload(key, content_type)
        .await
        .context("Failed to presign diagram upload")?;
    info!("Upload link issued for {}", upload.location);

    let body = json!({
        "uploadUrl": upload.upload_url,
        "bucket": upload.location.bucket,
        "key": upload.location.key,
        "expiresIn": upload.expires_in.as_secs(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

pub async fn run_describe(cfg: &AppConfig, image: &str, prompt: Option<String>) -> Result<()> {
    let sdk = load_sdk_config(cfg.llm.bedrock.region.as_deref()).await;
    let request = analysis_request(cfg, &sdk, image, prompt).await?;
    let client = BedrockProvider::from_sdk_config(&sdk, &cfg.llm.bedrock);

    let response = describe_diagram(&client, &request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_arguments() {
        let cli = Cli::try_parse_from([
            "arch2code",
            "--debug",
            "generate",
            "--image",
            "s3://uploads/arch.png",
            "--language",
            "TypeScript",
            "--upload",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Generate {
                image,
                language,
                upload,
            } => {
                assert_eq!(image, "s3://uploads/arch.png");
                assert_eq!(language, CodeLanguage::TypeScript);
                assert!(upload);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn analyze_action_defaults_to_analyze() {
        let cli = Cli::try_parse_from(["arch2code", "analyze", "-i", "arch.png"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Analyze {
                action: AnalysisAction::Analyze,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["arch2code", "analyze", "-i", "arch.png", "--action", "cdk-modules"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Analyze {
                action: AnalysisAction::CdkModules,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["arch2code", "analyze", "-i", "arch.png", "-a", "summarize"]).is_err());
    }

    #[test]
    fn upload_url_arguments() {
        let cli = Cli::try_parse_from(["arch2code", "upload-url", "--key", "diagrams/arch.jpg", "-t", "image/jpeg"])
            .unwrap();
        match cli.command {
            Commands::UploadUrl { key, content_type } => {
                assert_eq!(key, "diagrams/arch.jpg");
                assert_eq!(content_type, "image/jpeg");
            }
            _ => panic!("expected upload-url"),
        }
    }

    #[test]
    fn zero_thinking_budget_disables_thinking() {
        let mut cfg = AppConfig::default();
        assert_eq!(analysis_limits(&cfg).thinking_budget, Some(2000));
        cfg.llm.bedrock.thinking_budget_tokens = 0;
        assert_eq!(analysis_limits(&cfg).thinking_budget, None);
    }

    #[test]
    fn unsupported_language_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["arch2code", "generate", "-i", "arch.png", "-l", "java"]);
        assert!(result.is_err());
    }

    #[test]
    fn job_event_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"file_path": "s3://uploads/arch.png", "code_language": "python", "user_email": "a@b.c", "connection_id": "abc"}"#,
        )
        .unwrap();

        let request = read_job_request(&path).unwrap();
        assert_eq!(request.file_path, "s3://uploads/arch.png");
        assert_eq!(request.connection_id.as_deref(), Some("abc"));
        assert!(read_job_request(&dir.path().join("missing.json")).is_err());
    }
}
