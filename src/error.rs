//! Crate-wide error taxonomy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("catalog fetch failed: {0}")]
    Catalog(String),

    #[error("circuit breaker is open, trading disabled")]
    CircuitBreakerOpen,

    #[error("opportunity missing legs: expected {expected}, have {actual}")]
    InsufficientLegs { expected: usize, actual: usize },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("attempt ended in partial fill")]
    PartialFill,

    #[error("invalid orderbook level: {0}")]
    InvalidLevel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
