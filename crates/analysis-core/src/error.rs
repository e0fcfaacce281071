use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AnalysisError {
    /// Attach symbol/market context to an upstream failure so a universe
    /// pass can report which symbol broke.
    pub fn with_symbol(self, symbol: &str, market: impl std::fmt::Display) -> Self {
        match self {
            AnalysisError::UpstreamUnavailable(msg) => {
                AnalysisError::UpstreamUnavailable(format!("{symbol} ({market}): {msg}"))
            }
            other => other,
        }
    }
}
