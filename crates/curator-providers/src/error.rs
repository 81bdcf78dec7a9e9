//! Provider error type.

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("{service} is not configured")]
    Unconfigured { service: &'static str },

    #[error("io error: {0}")]
    Io(String),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("settings lookup failed: {0}")]
    Settings(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

impl From<curator_store::StoreError> for ProviderError {
    fn from(err: curator_store::StoreError) -> Self {
        ProviderError::Settings(err.to_string())
    }
}
