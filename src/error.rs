use thiserror::Error;

/// Unified error type for the Volley application
///
/// Only configuration and setup failures end up here. Per-attempt network
/// failures never surface as a `VolleyError`; they are folded into recorded
/// outcomes by the dispatcher.
#[derive(Error, Debug)]
pub enum VolleyError {
    // Configuration errors
    #[error("Target URL must be specified either as a command-line argument or in the config file")]
    MissingUrl,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // Proxy errors
    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    // HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Volley operations
pub type Result<T> = std::result::Result<T, VolleyError>;

impl VolleyError {
    /// Whether this error came out of configuration resolution
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            VolleyError::MissingUrl
                | VolleyError::InvalidConfig(_)
                | VolleyError::ConfigIo { .. }
                | VolleyError::ConfigParse(_)
                | VolleyError::InvalidProxyAddress(_)
        )
    }
}

// Convert from reqwest errors (client construction only)
impl From<reqwest::Error> for VolleyError {
    fn from(err: reqwest::Error) -> Self {
        VolleyError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for VolleyError {
    fn from(err: url::ParseError) -> Self {
        VolleyError::InvalidConfig(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_classification() {
        assert!(VolleyError::MissingUrl.is_config_error());
        assert!(VolleyError::InvalidConfig("threads".to_string()).is_config_error());
        assert!(VolleyError::InvalidProxyAddress("nope".to_string()).is_config_error());

        assert!(!VolleyError::Http("builder".to_string()).is_config_error());
        assert!(!VolleyError::Internal("join".to_string()).is_config_error());
    }

    #[test]
    fn test_error_from_url_parse() {
        let err: VolleyError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, VolleyError::InvalidConfig(_)));
        assert!(err.to_string().starts_with("Invalid configuration: invalid URL"));
    }

    #[test]
    fn test_missing_url_message() {
        assert_eq!(
            VolleyError::MissingUrl.to_string(),
            "Target URL must be specified either as a command-line argument or in the config file"
        );
    }
}
