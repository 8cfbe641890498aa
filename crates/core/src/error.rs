use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Data error: {0}")]
    DataError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("LLM error: {0}")]
    LlmError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, InsightError>;

impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        InsightError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::DataError(err.to_string())
    }
}
