use anyhow::Result;
use futures::future::join_all;
use log::{error, info};
use prompt_builder::ModulePrompt;
use single_processor::{ensure_distinct_file_names, ModuleArtifact, ModuleChain};

/// Runs every module chain concurrently on the current task and returns the
/// artifacts in the order of `prompts`.
///
/// Modules whose stack files would collide are rejected before any chain
/// starts. All chains run to completion. If any failed, the first failure
/// is returned with the names of every failed module attached.
pub async fn generate_modules(chain: &ModuleChain<'_>, prompts: &[ModulePrompt]) -> Result<Vec<ModuleArtifact>> {
    ensure_distinct_file_names(prompts, chain.language())?;
    info!("Generating {} module stacks concurrently", prompts.len());
    let results = join_all(prompts.iter().map(|prompt| chain.run(prompt))).await;

    let mut artifacts = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    let mut first_error = None;
    for (prompt, result) in prompts.iter().zip(results) {
        match result {
            Ok(artifact) => artifacts.push(artifact),
            Err(err) => {
                error!("Module '{}' failed: {:#}", prompt.module_name, err);
                failed.push(prompt.module_name.as_str());
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err.context(format!(
            "{} of {} module chains failed: {}",
            failed.len(),
            prompts.len(),
            failed.join(", ")
        )));
    }
    info!("All {} module stacks generated", artifacts.len());
    Ok(artifacts)
}
