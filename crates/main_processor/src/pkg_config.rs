use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use llm_requester::pkg_config::LlmConfig;
use serde::Deserialize;
use storage_services::pkg_config::StorageConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub prompts: PromptPaths,
    pub storage: StorageConfig,
}

/// `[prompts]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptPaths {
    pub pipeline_file: PathBuf,
    pub chain_file: PathBuf,
    /// Prompts for the streamed analysis, CDK module and optimization runs.
    pub analysis_file: PathBuf,
}

impl Default for PromptPaths {
    fn default() -> Self {
        Self {
            pipeline_file: PathBuf::from("config/prompts/a2cai_prompts.yaml"),
            chain_file: PathBuf::from("config/prompts/stack_gen_prompts.yaml"),
            analysis_file: PathBuf::from("config/prompts/analysis_prompts.yaml"),
        }
    }
}

/// Ordered search locations for `config.toml` relative to the working directory.
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config/config.toml",
    "../config/config.toml",
    "../../config/config.toml",
];

const ENV_PREFIX: &str = "A2C";

/// Reads `explicit` or the first file found in the search paths, then
/// applies `A2C__SECTION__KEY` environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, config::ConfigError> {
    let path = match explicit {
        Some(path) if path.exists() => path.to_path_buf(),
        Some(path) => {
            return Err(config::ConfigError::NotFound(format!(
                "config file not found: {}",
                path.display()
            )))
        }
        None => locate_config_file()?,
    };
    build_config(&path)?.try_deserialize()
}

fn locate_config_file() -> Result<PathBuf, config::ConfigError> {
    let mut attempted = Vec::new();

    for raw_path in CONFIG_SEARCH_PATHS {
        let candidate = Path::new(raw_path);
        if candidate.exists() {
            return Ok(candidate.to_path_buf());
        }
        attempted.push(candidate.display().to_string());
    }

    Err(config::ConfigError::NotFound(format!(
        "config file not found. searched paths: [{}]",
        attempted.join(", ")
    )))
}

fn build_config(path: &Path) -> Result<Config, config::ConfigError> {
    Config::builder()
        .add_source(File::from(path.to_path_buf()))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
}
