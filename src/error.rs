//! Error types for winepress
//!
//! Both kinds are recoverable: a [`NormalizeError`] drops one item from the
//! export, an [`ApiError`] ends the current remote step.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TOKEN_PARAM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([?&]token=)[^&\s#:]*").unwrap());

/// Why a raw item could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The item itself is not a JSON object
    #[error("item is a {found}, expected an object")]
    NotAnObject { found: &'static str },

    /// A nested field has the wrong type, e.g. a string where an object was expected
    #[error("`{path}` is a {found}, expected {expected}")]
    UnexpectedShape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure talking to the job control API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failure, timeout or non-success HTTP status
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Response body did not match the expected envelope
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The request body could not be encoded
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    // The HTTP client renders the full request URL, query included, into
    // its error text, so the message is scrubbed as well as the url.
    pub(crate) fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Transport {
            url: redact_token(url),
            message: redact_token(&err.to_string()),
        }
    }

    pub(crate) fn decode(url: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Decode {
            url: redact_token(url),
            message: redact_token(&err.to_string()),
        }
    }
}

/// Mask every `token` query parameter value in `text`
fn redact_token(text: &str) -> String {
    TOKEN_PARAM_REGEX.replace_all(text, "${1}REDACTED").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_redacted_from_client_message() {
        let err = ApiError::transport(
            "https://api.example.com/v2/actor-runs/run-1",
            "https://api.example.com/v2/datasets/abc/items?token=secret&offset=0: status code 500",
        );
        let message = err.to_string();
        assert!(!message.contains("secret"));
        assert!(message.contains("token=REDACTED&offset=0"));
        assert!(message.contains("status code 500"));
    }

    #[test]
    fn test_redact_token_leaves_other_params() {
        assert_eq!(redact_token("https://h/x?limit=2&token=abc"), "https://h/x?limit=2&token=REDACTED");
        assert_eq!(redact_token("https://h/x?mytoken=abc"), "https://h/x?mytoken=abc");
        assert_eq!(redact_token("no url here"), "no url here");
    }

    #[test]
    fn test_shape_error_message() {
        let err = NormalizeError::UnexpectedShape {
            path: "vintage.wine.taste.flavor".to_string(),
            expected: "an array",
            found: "number",
        };
        assert_eq!(
            err.to_string(),
            "`vintage.wine.taste.flavor` is a number, expected an array"
        );
    }
}
