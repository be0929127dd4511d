//! error.rs — Engine error taxonomy
//!
//! Every boundary call (market data, brokerage, chat completion) and every
//! computation returns `Result<T, EngineError>`.  Callers decide whether a
//! failure is worth retrying via [`EngineError::is_retryable`]; the engine
//! itself never retries.

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication rejected by remote service")]
    Auth,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("No data available for {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: need {needed} bars, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Remote service returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },
}

impl EngineError {
    /// Transient failures that may succeed if the same call is repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) | EngineError::RateLimited => true,
            EngineError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a non-success HTTP response.  `subject` names the symbol or
    /// resource the request was about.
    pub fn from_status(status: u16, body: String, subject: &str) -> Self {
        match status {
            401 | 403 => EngineError::Auth,
            429 => EngineError::RateLimited,
            404 | 422 => EngineError::InvalidSymbol(subject.to_string()),
            _ => EngineError::Remote { status, body },
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Parse(err.to_string())
        } else {
            EngineError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<polars::error::PolarsError> for EngineError {
    fn from(err: polars::error::PolarsError) -> Self {
        EngineError::Io(format!("Polars error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_rate_limit_are_retryable() {
        assert!(EngineError::Network("reset".into()).is_retryable());
        assert!(EngineError::RateLimited.is_retryable());
        assert!(EngineError::Remote { status: 503, body: String::new() }.is_retryable());
    }

    #[test]
    fn bad_input_is_permanent() {
        assert!(!EngineError::InvalidSymbol("ZZZZ".into()).is_retryable());
        assert!(!EngineError::InsufficientData { needed: 21, got: 5 }.is_retryable());
        assert!(!EngineError::Remote { status: 422, body: String::new() }.is_retryable());
        assert!(!EngineError::Auth.is_retryable());
    }

    #[test]
    fn status_codes_map_to_variants() {
        assert!(matches!(EngineError::from_status(401, String::new(), "AAPL"), EngineError::Auth));
        assert!(matches!(EngineError::from_status(429, String::new(), "AAPL"), EngineError::RateLimited));
        assert!(matches!(
            EngineError::from_status(422, String::new(), "ZZZZ"),
            EngineError::InvalidSymbol(s) if s == "ZZZZ"
        ));
        assert!(EngineError::from_status(502, "bad gateway".into(), "AAPL").is_retryable());
    }
}
