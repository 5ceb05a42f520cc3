//! Per-module code generation and code block extraction.

pub mod artifact;
pub mod code_extractor;
pub mod module_chain;

pub use artifact::{ModuleArtifact, ensure_distinct_file_names, module_file_name};
pub use code_extractor::{ExtractError, extract_code_block};
pub use module_chain::{ModuleChain, ModuleNotifier};
