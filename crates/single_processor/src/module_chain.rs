use anyhow::{Context, Result};
use llm_requester::{LlmClient, LlmRequest};
use log::info;
use prompt_builder::stages::{CDK_EXPERT_ROLE, step_1_prompt, step_2_prompt, step_3_prompt, step_4_prompt};
use prompt_builder::{CodeLanguage, ModulePrompt, PromptStore};
use storage_services::RunWorkspace;

use crate::artifact::{ModuleArtifact, module_file_name};
use crate::code_extractor::extract_code_block;

/// Receives `(module name, notice)` as a chain moves through its steps.
pub type ModuleNotifier<'a> = &'a (dyn Fn(&str, &str) + Send + Sync);

/// Four sequential LLM steps that turn one module prompt into a stack file:
/// draft, IAM review, refinement with the IAM notes, final code.
pub struct ModuleChain<'a> {
    client: &'a dyn LlmClient,
    prompts: &'a PromptStore,
    workspace: &'a RunWorkspace,
    language: CodeLanguage,
    notifier: Option<ModuleNotifier<'a>>,
}

impl<'a> ModuleChain<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        prompts: &'a PromptStore,
        workspace: &'a RunWorkspace,
        language: CodeLanguage,
    ) -> Self {
        Self {
            client,
            prompts,
            workspace,
            language,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: ModuleNotifier<'a>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    fn notify(&self, module_name: &str, notice: &str) {
        if let Some(notify) = self.notifier {
            notify(module_name, notice);
        }
    }

    async fn ask(&self, prompt: String) -> Result<String> {
        let request = LlmRequest::new(prompt).with_system(CDK_EXPERT_ROLE);
        Ok(self.client.complete(&request).await?)
    }

    async fn log_step(&self, stem: &str, step: u8, response: &str) -> Result<()> {
        self.workspace
            .write_log(&format!("{}_step_{}", stem, step), response)
            .await?;
        Ok(())
    }

    /// Runs the chain for one module and writes its stack file.
    pub async fn run(&self, module: &ModulePrompt) -> Result<ModuleArtifact> {
        let name = module.module_name.as_str();
        let file_name = module_file_name(name, self.language);
        let stem = file_name
            .rsplit_once('.')
            .map_or(file_name.as_str(), |(stem, _)| stem)
            .to_string();
        info!("Generating stack for module '{}' -> {}", name, file_name);

        self.notify(name, "📝 drafting stack");
        let step_1 = self
            .ask(step_1_prompt(self.prompts, &module.prompt)?)
            .await
            .with_context(|| format!("step 1 failed for module '{}'", name))?;
        self.log_step(&stem, 1, &step_1).await?;

        self.notify(name, "🔐 reviewing IAM roles");
        let step_2 = self
            .ask(step_2_prompt(self.prompts, &step_1)?)
            .await
            .with_context(|| format!("step 2 failed for module '{}'", name))?;
        self.log_step(&stem, 2, &step_2).await?;

        self.notify(name, "🔄 refining stack");
        let step_3 = self
            .ask(step_3_prompt(self.prompts, self.language, &step_1, &step_2)?)
            .await
            .with_context(|| format!("step 3 failed for module '{}'", name))?;
        self.log_step(&stem, 3, &step_3).await?;

        self.notify(name, "✍️ writing final code");
        let step_4 = self
            .ask(step_4_prompt(self.prompts, self.language, &step_3)?)
            .await
            .with_context(|| format!("step 4 failed for module '{}'", name))?;
        self.log_step(&stem, 4, &step_4).await?;

        let code = extract_code_block(&step_4, self.language)
            .with_context(|| format!("no usable code in final response for module '{}'", name))?;
        let path = self.workspace.write_source(&file_name, &code).await?;
        info!("✅ Module '{}' written to {}", name, path.display());
        self.notify(name, "✓ done");

        Ok(ModuleArtifact {
            module_name: name.to_string(),
            file_name,
            path,
        })
    }
}
