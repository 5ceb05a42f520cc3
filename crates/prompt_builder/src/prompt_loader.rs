//! Prompt templates keyed by name, read from YAML files.
//!
//! Missing keys are logged and left out; asking for one later yields
//! [`StageError::MissingTemplate`] so the failure names the key.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use log::{debug, warn};

use crate::StageError;

pub mod keys {
    pub const ARCHITECTURE_DESCRIPTION: &str = "architecture_description_prompt";
    pub const STAGING_TEMPLATE: &str = "staging_prompt_template";
    pub const MODULES_DESCRIPTION: &str = "modules_description_prompt";
    pub const DEPLOYMENT_SEQUENCE: &str = "deployment_sequence_prompt";

    pub const MODULE_PROMPT_SUFFIX: &str = "module_prompt_suffix";
    pub const STEP_2: &str = "step_2";
    pub const STEP_3: &str = "step_3";
    pub const STEP_4: &str = "step_4";

    /// Keys read from the pipeline prompt file.
    pub const PIPELINE: [&str; 4] = [
        ARCHITECTURE_DESCRIPTION,
        STAGING_TEMPLATE,
        MODULES_DESCRIPTION,
        DEPLOYMENT_SEQUENCE,
    ];

    /// Keys read from the stack generation prompt file.
    pub const CHAIN: [&str; 4] = [MODULE_PROMPT_SUFFIX, STEP_2, STEP_3, STEP_4];

    pub const ANALYSIS: &str = "analysis_prompt";
    pub const CDK_MODULES: &str = "cdk_modules_prompt";
    pub const OPTIMIZATION: &str = "optimization_prompt";

    /// Keys read from the streamed analysis prompt file.
    pub const STREAMED_ANALYSIS: [&str; 3] = [ANALYSIS, CDK_MODULES, OPTIMIZATION];
}

#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    templates: HashMap<String, String>,
}

impl PromptStore {
    /// Loads pipeline keys from `pipeline_path` and chain keys from `chain_path`.
    pub fn load(pipeline_path: &Path, chain_path: &Path) -> Result<Self> {
        let mut store = Self::load_keys(pipeline_path, &keys::PIPELINE)?;
        store.extend(Self::load_keys(chain_path, &keys::CHAIN)?);
        Ok(store)
    }

    pub fn load_keys(path: &Path, wanted: &[&str]) -> Result<Self> {
        debug!("Loading prompts from: {}", path.display());
        let source = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        Self::collect(&source, wanted, &path.display().to_string())
    }

    pub fn from_yaml_str(text: &str, wanted: &[&str]) -> Result<Self> {
        let source = Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()
            .context("Failed to parse prompt YAML")?;
        Self::collect(&source, wanted, "inline YAML")
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn collect(source: &Config, wanted: &[&str], origin: &str) -> Result<Self> {
        let mut templates = HashMap::new();
        for key in wanted {
            match source.get_string(key) {
                Ok(text) => {
                    templates.insert(key.to_string(), text);
                }
                Err(ConfigError::NotFound(_)) => {
                    warn!("Prompt '{}' not found in {}", key, origin);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Prompt '{}' in {} is not a string", key, origin));
                }
            }
        }
        Ok(Self { templates })
    }

    pub fn extend(&mut self, other: PromptStore) {
        self.templates.extend(other.templates);
    }

    pub fn get(&self, key: &str) -> Result<&str, StageError> {
        self.templates
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StageError::MissingTemplate(key.to_string()))
    }
}
