use gs_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Not implemented")]
    NotImplemented,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
