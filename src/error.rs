use thiserror::Error;

/// Every failure of the outbound completion call lands here: transport,
/// authentication, rate limiting, malformed bodies. Callers never branch on
/// the cause, so there is one variant.
#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("upstream call failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ChatbotError {
    fn from(err: reqwest::Error) -> Self {
        ChatbotError::Upstream(err.to_string())
    }
}
