//! Data passed between pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StageError;

/// One deployable module named in the deployment sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    pub description: String,
}

/// Parsed deployment-sequence response.
///
/// The response is a JSON object whose first key is framing text, whose
/// last value lists the stack names, and whose keys in between are the
/// modules in deployment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptionMap {
    pub modules: Vec<ModuleEntry>,
    pub stack_names: Vec<String>,
}

impl ModuleDescriptionMap {
    pub fn parse(raw: &str) -> Result<Self, StageError> {
        let body = strip_json_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| StageError::MalformedModuleMap(format!("response is not valid JSON: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(StageError::MalformedModuleMap(
                "expected a JSON object at the top level".to_string(),
            ));
        };
        if map.len() < 3 {
            return Err(StageError::MalformedModuleMap(format!(
                "expected at least 3 keys, found {}",
                map.len()
            )));
        }

        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
        let Some((stack_key, stacks)) = entries.pop() else {
            return Err(StageError::MalformedModuleMap("empty object".to_string()));
        };
        let stack_names = stacks
            .as_array()
            .ok_or_else(|| {
                StageError::MalformedModuleMap(format!("last key '{}' must hold a list of stack names", stack_key))
            })?
            .iter()
            .map(|name| {
                name.as_str().map(str::to_string).ok_or_else(|| {
                    StageError::MalformedModuleMap(format!("stack name {} is not a string", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let modules = entries
            .into_iter()
            .skip(1)
            .map(|(name, description)| ModuleEntry {
                name,
                description: match description {
                    Value::String(text) => text,
                    other => other.to_string(),
                },
            })
            .collect();

        Ok(Self { modules, stack_names })
    }
}

/// Drops a surrounding ```` ```json ```` fence if the model added one.
pub fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Module name and the generation prompt built for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePrompt {
    pub module_name: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPrompt {
    pub file_name: String,
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQUENCE: &str = r#"{
        "deployment_sequence": "Deploy storage first",
        "Storage Module": "S3 bucket for uploads",
        "Compute Module": {"lambda": "thumbnailer"},
        "stack_names": ["Storage", "Compute"]
    }"#;

    #[test]
    fn keeps_module_order() {
        let map = ModuleDescriptionMap::parse(SEQUENCE).unwrap();
        let names: Vec<_> = map.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Storage Module", "Compute Module"]);
        assert_eq!(map.modules[0].description, "S3 bucket for uploads");
        assert_eq!(map.modules[1].description, r#"{"lambda":"thumbnailer"}"#);
        assert_eq!(map.stack_names, ["Storage", "Compute"]);
    }

    #[test]
    fn accepts_fenced_json() {
        let fenced = format!("```json\n{}\n```\n", SEQUENCE);
        assert_eq!(
            ModuleDescriptionMap::parse(&fenced).unwrap(),
            ModuleDescriptionMap::parse(SEQUENCE).unwrap()
        );
    }

    #[test]
    fn rejects_too_few_keys() {
        let err = ModuleDescriptionMap::parse(r#"{"a": "x", "b": []}"#).unwrap_err();
        assert!(matches!(err, StageError::MalformedModuleMap(_)));
    }

    #[test]
    fn rejects_non_list_stack_names() {
        let err = ModuleDescriptionMap::parse(r#"{"a": "x", "m": "y", "stacks": "Storage"}"#).unwrap_err();
        assert!(matches!(err, StageError::MalformedModuleMap(_)));
    }

    #[test]
    fn rejects_non_json() {
        let err = ModuleDescriptionMap::parse("Unexpected response format").unwrap_err();
        assert!(matches!(err, StageError::MalformedModuleMap(_)));
    }
}
