//! Prompt construction for the diagram to CDK pipeline.
//!
//! Templates come from YAML files ([`PromptStore`]); the functions in
//! [`stages`] splice previous stage output into them.

mod error;
pub mod language;
pub mod prompt_loader;
pub mod stages;
pub mod template;
pub mod types;

pub use error::StageError;
pub use language::CodeLanguage;
pub use prompt_loader::{PromptStore, keys};
pub use types::{ModuleDescriptionMap, ModuleEntry, ModulePrompt, StagingPrompt};
