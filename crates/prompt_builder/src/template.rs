//! Placeholder substitution for prompt templates.

use regex::Regex;

use crate::StageError;

pub const STAGING_FILE_PLACEHOLDER: &str = "{{staging_file}}";
pub const STACK_IMPORTS_PLACEHOLDER: &str = "{{stack_imports}}";
pub const MODULE_FILES_PLACEHOLDER: &str = "{{module_files}}";

// Markers used by older staging templates.
const LEGACY_STAGING_FILE: &str = "app.py";
const LEGACY_STACK_LIST: &str = "- StackA - StackB - StackC - StackD";
const LEGACY_MODULE_LIST: &str = "stack_a.py - stack_b.py - stack_c.py - stack_d.py";

/// Replaces every `{name}`. Unknown placeholders are left as they are.
pub fn substitute(template: &str, name: &str, value: &str) -> String {
    template.replace(&format!("{{{}}}", name), value)
}

/// Values spliced into the staging template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingValues<'a> {
    pub staging_file: &'a str,
    pub stack_imports: &'a str,
    pub module_files: &'a str,
}

/// Renders the staging template.
///
/// Templates using `{{...}}` placeholders must contain all three of them.
/// Older templates are matched on their literal sample markers, each of
/// which must be present.
pub fn render_staging_template(template: &str, values: &StagingValues<'_>) -> Result<String, StageError> {
    if template.contains("{{") {
        render_named(template, values)
    } else {
        render_legacy(template, values)
    }
}

fn render_named(template: &str, values: &StagingValues<'_>) -> Result<String, StageError> {
    let replacements = [
        (STAGING_FILE_PLACEHOLDER, values.staging_file),
        (STACK_IMPORTS_PLACEHOLDER, values.stack_imports),
        (MODULE_FILES_PLACEHOLDER, values.module_files),
    ];
    let mut rendered = template.to_string();
    for (placeholder, value) in replacements {
        if !rendered.contains(placeholder) {
            return Err(StageError::TemplatePlaceholderMissing(placeholder.to_string()));
        }
        rendered = rendered.replace(placeholder, value);
    }
    Ok(rendered)
}

fn render_legacy(template: &str, values: &StagingValues<'_>) -> Result<String, StageError> {
    for marker in [LEGACY_STAGING_FILE, LEGACY_STACK_LIST, LEGACY_MODULE_LIST] {
        if !template.contains(marker) {
            return Err(StageError::TemplatePlaceholderMissing(marker.to_string()));
        }
    }
    let rendered = template
        .replace(LEGACY_STAGING_FILE, values.staging_file)
        .replace(LEGACY_STACK_LIST, values.stack_imports);

    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(LEGACY_MODULE_LIST)))
        .map_err(|_| StageError::TemplatePlaceholderMissing(LEGACY_MODULE_LIST.to_string()))?;
    if !pattern.is_match(&rendered) {
        return Err(StageError::TemplatePlaceholderMissing(LEGACY_MODULE_LIST.to_string()));
    }
    Ok(pattern
        .replace_all(&rendered, regex::NoExpand(values.module_files))
        .into_owned())
}
