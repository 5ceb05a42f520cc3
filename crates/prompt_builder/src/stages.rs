//! Prompt text for each pipeline stage and each step of the module chain.

use std::path::Path;

use crate::prompt_loader::{PromptStore, keys};
use crate::template::{StagingValues, render_staging_template, substitute};
use crate::types::{ModuleDescriptionMap, ModulePrompt, StagingPrompt};
use crate::{CodeLanguage, StageError};

/// System role sent with every code generation request.
pub const CDK_EXPERT_ROLE: &str =
    "You are an expert in the latest version of AWS CDK and understanding of AWS services";

pub const IAM_ROLES_HEADER: &str = "##IAM Roles and policies to be included##";

const CODE_LANGUAGE: &str = "code_language";

pub fn architecture_description_prompt(store: &PromptStore) -> Result<String, StageError> {
    store.get(keys::ARCHITECTURE_DESCRIPTION).map(str::to_string)
}

pub fn modules_description_prompt(store: &PromptStore, architecture_description: &str) -> Result<String, StageError> {
    Ok(format!("{}{}", store.get(keys::MODULES_DESCRIPTION)?, architecture_description))
}

pub fn deployment_sequence_prompt(store: &PromptStore, modules_description: &str) -> Result<String, StageError> {
    Ok(format!("{}{}", store.get(keys::DEPLOYMENT_SEQUENCE)?, modules_description))
}

pub fn build_module_prompt(module_name: &str, module_description: &str, language: CodeLanguage) -> String {
    format!(
        "Generate a AWS CDK stack in {} for module name '{}' with the following module description: {}. \
         Ensure Implementation reflects all interaction mentioned. \
         Use the Basename of the Module as the name of the CDK stack, \
         without the substring 'Module' included in the name of the stack",
        language.as_str(),
        module_name,
        module_description
    )
}

/// One prompt per module, in deployment order.
pub fn module_prompts(map: &ModuleDescriptionMap, language: CodeLanguage) -> Vec<ModulePrompt> {
    map.modules
        .iter()
        .map(|module| ModulePrompt {
            module_name: module.name.clone(),
            prompt: build_module_prompt(&module.name, &module.description, language),
        })
        .collect()
}

pub fn step_1_prompt(store: &PromptStore, module_prompt: &str) -> Result<String, StageError> {
    Ok(format!("{}\n{}", module_prompt, store.get(keys::MODULE_PROMPT_SUFFIX)?))
}

pub fn step_2_prompt(store: &PromptStore, step_1_response: &str) -> Result<String, StageError> {
    Ok(format!("{}\n{}", store.get(keys::STEP_2)?, step_1_response))
}

pub fn step_3_prompt(
    store: &PromptStore,
    language: CodeLanguage,
    step_1_response: &str,
    step_2_response: &str,
) -> Result<String, StageError> {
    let template = substitute(store.get(keys::STEP_3)?, CODE_LANGUAGE, language.as_str());
    Ok(format!(
        "{}\n{}\n{}\n{}",
        template, step_1_response, IAM_ROLES_HEADER, step_2_response
    ))
}

pub fn step_4_prompt(store: &PromptStore, language: CodeLanguage, step_3_response: &str) -> Result<String, StageError> {
    let template = substitute(store.get(keys::STEP_4)?, CODE_LANGUAGE, language.as_str());
    Ok(format!("{}\n{}", template, step_3_response))
}

/// Staging prompt that asks for the CDK app entry point importing every stack.
pub fn staging_prompt<P: AsRef<Path>>(
    store: &PromptStore,
    language: CodeLanguage,
    module_files: &[P],
    stack_names: &[String],
) -> Result<StagingPrompt, StageError> {
    let file_name = language.staging_file_name();
    let stack_imports = stack_names
        .iter()
        .map(|name| format!("-{}Stack", name))
        .collect::<Vec<_>>()
        .join("\n ");
    let module_list = module_files
        .iter()
        .filter_map(|path| path.as_ref().file_name())
        .map(|name| format!("-{}", name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join("\n ");

    let prompt = render_staging_template(
        store.get(keys::STAGING_TEMPLATE)?,
        &StagingValues {
            staging_file: &file_name,
            stack_imports: &stack_imports,
            module_files: &module_list,
        },
    )?;
    Ok(StagingPrompt { file_name, prompt })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleEntry;
    use std::path::PathBuf;

    fn store() -> PromptStore {
        PromptStore::from_pairs([
            (keys::ARCHITECTURE_DESCRIPTION, "Describe."),
            (keys::MODULES_DESCRIPTION, "Modules for: "),
            (keys::DEPLOYMENT_SEQUENCE, "Sequence for: "),
            (
                keys::STAGING_TEMPLATE,
                "Write {{staging_file}} with\n {{stack_imports}}\nusing\n {{module_files}}",
            ),
            (keys::MODULE_PROMPT_SUFFIX, "SUFFIX"),
            (keys::STEP_2, "STEP2"),
            (keys::STEP_3, "STEP3 in {code_language}"),
            (keys::STEP_4, "STEP4 in {code_language}"),
        ])
    }

    #[test]
    fn stage_prompts_concatenate_previous_output() {
        let store = store();
        assert_eq!(architecture_description_prompt(&store).unwrap(), "Describe.");
        assert_eq!(
            modules_description_prompt(&store, "three tiers").unwrap(),
            "Modules for: three tiers"
        );
        assert_eq!(
            deployment_sequence_prompt(&store, "web, api").unwrap(),
            "Sequence for: web, api"
        );
    }

    #[test]
    fn chain_prompts() {
        let store = store();
        assert_eq!(step_1_prompt(&store, "MODULE").unwrap(), "MODULE\nSUFFIX");
        assert_eq!(step_2_prompt(&store, "R1").unwrap(), "STEP2\nR1");
        assert_eq!(
            step_3_prompt(&store, CodeLanguage::TypeScript, "R1", "R2").unwrap(),
            "STEP3 in typescript\nR1\n##IAM Roles and policies to be included##\nR2"
        );
        assert_eq!(
            step_4_prompt(&store, CodeLanguage::Python, "R3").unwrap(),
            "STEP4 in python\nR3"
        );
    }

    #[test]
    fn missing_step_template_is_named() {
        let store = PromptStore::from_pairs([(keys::STEP_2, "STEP2")]);
        assert_eq!(
            step_3_prompt(&store, CodeLanguage::Python, "a", "b"),
            Err(StageError::MissingTemplate(keys::STEP_3.into()))
        );
    }

    #[test]
    fn module_prompt_wording() {
        let map = ModuleDescriptionMap {
            modules: vec![ModuleEntry {
                name: "Storage Module".into(),
                description: "An S3 bucket".into(),
            }],
            stack_names: vec!["Storage".into()],
        };
        let prompts = module_prompts(&map, CodeLanguage::Python);
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].module_name, "Storage Module");
        assert_eq!(
            prompts[0].prompt,
            "Generate a AWS CDK stack in python for module name 'Storage Module' with the following module description: An S3 bucket. Ensure Implementation reflects all interaction mentioned. Use the Basename of the Module as the name of the CDK stack, without the substring 'Module' included in the name of the stack"
        );
    }

    #[test]
    fn staging_prompt_lists_stacks_and_files() {
        let files = [
            PathBuf::from("/tmp/run/storage_stack.py"),
            PathBuf::from("/tmp/run/compute_stack.py"),
        ];
        let stacks = vec!["Storage".to_string(), "Compute".to_string()];
        let staging = staging_prompt(&store(), CodeLanguage::Python, &files, &stacks).unwrap();

        assert_eq!(staging.file_name, "app.py");
        assert_eq!(
            staging.prompt,
            "Write app.py with\n -StorageStack\n -ComputeStack\nusing\n -storage_stack.py\n -compute_stack.py"
        );
    }
}
