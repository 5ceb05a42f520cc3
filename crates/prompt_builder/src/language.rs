use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StageError;

/// Target language of the generated CDK project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    Python,
    TypeScript,
}

impl CodeLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::Python => "python",
            CodeLanguage::TypeScript => "typescript",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CodeLanguage::Python => "py",
            CodeLanguage::TypeScript => "ts",
        }
    }

    /// Info string expected after the opening code fence.
    pub fn fence_tag(&self) -> &'static str {
        self.as_str()
    }

    /// CDK app entry point: `app.py` or `app.ts`.
    pub fn staging_file_name(&self) -> String {
        format!("app.{}", self.extension())
    }
}

impl FromStr for CodeLanguage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(CodeLanguage::Python),
            "typescript" => Ok(CodeLanguage::TypeScript),
            _ => Err(StageError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staging file name for a raw language string.
pub fn staging_file_name(language: &str) -> Result<String, StageError> {
    language.parse::<CodeLanguage>().map(|lang| lang.staging_file_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Python".parse::<CodeLanguage>(), Ok(CodeLanguage::Python));
        assert_eq!(" TYPESCRIPT ".parse::<CodeLanguage>(), Ok(CodeLanguage::TypeScript));
    }

    #[test]
    fn staging_names() {
        assert_eq!(staging_file_name("python").unwrap(), "app.py");
        assert_eq!(staging_file_name("typescript").unwrap(), "app.ts");
        assert_eq!(
            staging_file_name("java"),
            Err(StageError::UnsupportedLanguage("java".into()))
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let lang: CodeLanguage = serde_json::from_str("\"typescript\"").unwrap();
        assert_eq!(lang, CodeLanguage::TypeScript);
        assert_eq!(serde_json::to_string(&CodeLanguage::Python).unwrap(), "\"python\"");
    }
}
