use std::sync::LazyLock;

use log::{debug, warn};
use prompt_builder::CodeLanguage;
use regex::Regex;
use thiserror::Error;

static PYTHON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python\n(.*?)\n```").expect("unreachable error: invalid python fence pattern"));
static TYPESCRIPT_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```typescript\n(.*?)\n```").expect("unreachable error: invalid typescript fence pattern")
});

fn fence_pattern(language: CodeLanguage) -> &'static Regex {
    match language {
        CodeLanguage::Python => &PYTHON_FENCE,
        CodeLanguage::TypeScript => &TYPESCRIPT_FENCE,
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no {0} code block found in response")]
    NoCodeBlock(CodeLanguage),

    #[error("expected one {language} code block, found {count}")]
    MultipleCodeBlocks { language: CodeLanguage, count: usize },
}

/// Body of the single fenced block tagged with the language, e.g.
/// a block opened by a python fence and closed by a fence on its own line.
pub fn extract_code_block(response: &str, language: CodeLanguage) -> Result<String, ExtractError> {
    let blocks: Vec<&str> = fence_pattern(language)
        .captures_iter(response)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    match blocks.as_slice() {
        [] => {
            warn!("No {} code block in response of {} chars", language, response.len());
            Err(ExtractError::NoCodeBlock(language))
        }
        [code] => {
            debug!("Extracted {} chars of {} code", code.len(), language);
            Ok(code.to_string())
        }
        _ => Err(ExtractError::MultipleCodeBlocks {
            language,
            count: blocks.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_block() {
        let response = "Here you go:\n```python\nfrom aws_cdk import Stack\n\nclass WebStack(Stack):\n    pass\n```\nDone.";
        let code = extract_code_block(response, CodeLanguage::Python).unwrap();
        assert_eq!(code, "from aws_cdk import Stack\n\nclass WebStack(Stack):\n    pass");
    }

    #[test]
    fn ignores_blocks_in_other_languages() {
        let response = "```bash\ncdk deploy\n```\n```typescript\nexport class ApiStack {}\n```";
        assert_eq!(
            extract_code_block(response, CodeLanguage::TypeScript).unwrap(),
            "export class ApiStack {}"
        );
        assert!(matches!(
            extract_code_block(response, CodeLanguage::Python),
            Err(ExtractError::NoCodeBlock(CodeLanguage::Python))
        ));
    }

    #[test]
    fn rejects_multiple_blocks() {
        let response = "```python\na = 1\n```\ntext\n```python\nb = 2\n```";
        assert!(matches!(
            extract_code_block(response, CodeLanguage::Python),
            Err(ExtractError::MultipleCodeBlocks { count: 2, .. })
        ));
    }

    #[test]
    fn patterns_match_fence_tags() {
        for language in [CodeLanguage::Python, CodeLanguage::TypeScript] {
            let response = format!("```{}\nok\n```", language.fence_tag());
            assert_eq!(extract_code_block(&response, language).unwrap(), "ok");
        }
    }

    #[test]
    fn unterminated_block_is_missing() {
        let response = "```python\nprint('cut off')";
        assert!(extract_code_block(response, CodeLanguage::Python).is_err());
    }
}
