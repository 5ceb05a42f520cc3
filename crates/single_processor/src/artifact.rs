use std::collections::HashMap;
use std::path::PathBuf;

use prompt_builder::{CodeLanguage, ModulePrompt, StageError};

/// Stack file name for a module: lowercase, the " module" suffix word
/// removed, every character outside `[a-z0-9_]` turned into `_`, then
/// `_stack.<ext>`. The result never contains a path separator.
pub fn module_file_name(module_name: &str, language: CodeLanguage) -> String {
    let lowered = module_name.to_lowercase().replace(" module", "");
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .collect();
    let base = cleaned.trim_matches('_');
    let base = if base.is_empty() { "module" } else { base };
    format!("{}_stack.{}", base, language.extension())
}

/// Fails when two modules would be written to the same stack file.
pub fn ensure_distinct_file_names(prompts: &[ModulePrompt], language: CodeLanguage) -> Result<(), StageError> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for prompt in prompts {
        let file_name = module_file_name(&prompt.module_name, language);
        if let Some(first) = owners.insert(file_name.clone(), &prompt.module_name) {
            return Err(StageError::MalformedModuleMap(format!(
                "modules '{}' and '{}' both map to {}",
                first, prompt.module_name, file_name
            )));
        }
    }
    Ok(())
}

/// Generated source file written into the run's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArtifact {
    pub module_name: String,
    pub file_name: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> ModulePrompt {
        ModulePrompt {
            module_name: name.into(),
            prompt: format!("Generate {}", name),
        }
    }

    #[test]
    fn file_names() {
        assert_eq!(
            module_file_name("User Authentication Module", CodeLanguage::Python),
            "user_authentication_stack.py"
        );
        assert_eq!(module_file_name("Storage", CodeLanguage::TypeScript), "storage_stack.ts");
        assert_eq!(
            module_file_name("Data Module Processing", CodeLanguage::Python),
            "data_processing_stack.py"
        );
    }

    #[test]
    fn path_characters_are_replaced() {
        assert_eq!(
            module_file_name("API Gateway/Lambda Module", CodeLanguage::Python),
            "api_gateway_lambda_stack.py"
        );
        assert_eq!(module_file_name("../../escape Module", CodeLanguage::Python), "escape_stack.py");
        assert_eq!(module_file_name("C:\\temp\\x", CodeLanguage::TypeScript), "c__temp_x_stack.ts");
        assert_eq!(module_file_name("/// Module", CodeLanguage::Python), "module_stack.py");
    }

    #[test]
    fn colliding_file_names_are_rejected() {
        let prompts = [module("Storage Module"), module("Compute Module"), module("Storage")];
        let err = ensure_distinct_file_names(&prompts, CodeLanguage::Python).unwrap_err();
        let StageError::MalformedModuleMap(message) = err else {
            panic!("expected MalformedModuleMap, got {:?}", err);
        };
        assert!(message.contains("'Storage Module'"));
        assert!(message.contains("'Storage'"));
        assert!(message.contains("storage_stack.py"));
    }

    #[test]
    fn distinct_file_names_pass() {
        let prompts = [module("Storage Module"), module("Compute Module")];
        assert!(ensure_distinct_file_names(&prompts, CodeLanguage::TypeScript).is_ok());
        assert!(ensure_distinct_file_names(&[], CodeLanguage::Python).is_ok());
    }
}
