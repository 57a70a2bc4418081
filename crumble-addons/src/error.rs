//! Addon client error types
//!
//! Error enum and response helpers shared by every addon HTTP call.

use bytes::Bytes;
use thiserror::Error;

/// Maximum response body size for addon HTTP calls (16 MB).
/// Prevents OOM from malicious or misconfigured addon servers.
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Error type for addon HTTP clients.
#[derive(Debug, Error)]
pub enum AddonClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    /// The addon rejected the request's credentials (missing or invalid API key).
    #[error("Unauthorized (API key missing or invalid) for {url}")]
    Unauthorized { url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

impl AddonClientError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Network failures, 5xx and 429 are transient; everything else is final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Whether this error means the API key must be (re)configured.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Read a response body with size limit and deserialize as JSON.
///
/// Checks `Content-Length` hint first (if available), then enforces the
/// limit on the actual body bytes before deserializing.
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AddonClientError> {
    let bytes = body_with_limit(response).await?;
    serde_json::from_slice(&bytes).map_err(Into::into)
}

/// Read a response body as UTF-8 text with the same size limit.
pub async fn text_with_limit(response: reqwest::Response) -> Result<String, AddonClientError> {
    let bytes = body_with_limit(response).await?;
    String::from_utf8(bytes.into()).map_err(|e| AddonClientError::Parse(e.to_string()))
}

async fn body_with_limit(response: reqwest::Response) -> Result<Bytes, AddonClientError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(AddonClientError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(AddonClientError::ResponseTooLarge { size: bytes.len() as u64 });
    }
    Ok(bytes)
}

/// Check HTTP response status before processing body.
///
/// 401 is reported as [`AddonClientError::Unauthorized`] so callers can tell a
/// key problem apart from an ordinary failure.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, AddonClientError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(AddonClientError::Unauthorized {
            url: resp.url().to_string(),
        });
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(AddonClientError::Http {
            status,
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

impl From<reqwest::Error> for AddonClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AddonClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<url::ParseError> for AddonClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_network() {
        let err = AddonClientError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_error_display_http() {
        let err = AddonClientError::Http {
            status: reqwest::StatusCode::NOT_FOUND,
            url: "https://example.com/catalog/movie/top.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error 404 Not Found for https://example.com/catalog/movie/top.json"
        );
    }

    #[test]
    fn test_error_display_response_too_large() {
        let err = AddonClientError::ResponseTooLarge { size: 20_000_000 };
        let msg = err.to_string();
        assert!(msg.contains("20000000"));
        assert!(msg.contains(&MAX_RESPONSE_SIZE.to_string()));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: AddonClientError = json_err.into();
        assert!(matches!(err, AddonClientError::Parse(_)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AddonClientError::Network("reset".into()).is_retryable());
        assert!(AddonClientError::Http {
            status: reqwest::StatusCode::BAD_GATEWAY,
            url: String::new(),
        }
        .is_retryable());
        assert!(AddonClientError::Http {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            url: String::new(),
        }
        .is_retryable());
        assert!(!AddonClientError::Http {
            status: reqwest::StatusCode::NOT_FOUND,
            url: String::new(),
        }
        .is_retryable());
        assert!(!AddonClientError::Unauthorized { url: String::new() }.is_retryable());
        assert!(!AddonClientError::Parse("eof".into()).is_retryable());
    }

    #[test]
    fn test_unauthorized_is_distinguishable() {
        let err = AddonClientError::Unauthorized {
            url: "http://localhost:7001/catalog/movie/tmdb_popular.json".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("API key"));
    }
}
