use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("Unsupported language '{0}'. Use 'python' or 'typescript'.")]
    UnsupportedLanguage(String),

    #[error("Prompt template '{0}' is not configured")]
    MissingTemplate(String),

    #[error("Malformed module description map: {0}")]
    MalformedModuleMap(String),

    #[error("Staging template is missing placeholder '{0}'")]
    TemplatePlaceholderMissing(String),
}
