use crumble_addons::AddonClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Addon error: {0}")]
    Addon(#[from] AddonClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether the error is an addon answering 401 (missing or bad API key)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Addon(e) if e.is_unauthorized())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_passes_through() {
        let err: Error = AddonClientError::Unauthorized {
            url: "http://localhost:7001/catalog/movie/tmdb_popular.json".to_string(),
        }
        .into();
        assert!(err.is_unauthorized());

        let err = Error::InvalidInput("empty manifest URL".to_string());
        assert!(!err.is_unauthorized());
    }
}
