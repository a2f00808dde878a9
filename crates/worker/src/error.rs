use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("conductor reported an error: {0}")]
    Business(String),

    #[error("failed to decode conductor response: {0}")]
    Decode(#[from] serde_json::Error),
}
