use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Internal code shared by every normalized failure.
pub const ERROR_CODE: i32 = 2;

#[derive(Error, Debug)]
pub enum RulesApiError {
    /// The service answered with a structured error body; the message is
    /// surfaced verbatim.
    #[error("{message}")]
    Api { message: String },
    /// Any other non-200 answer. The status and raw body are logged when
    /// the failure is classified.
    #[error("unexpected error talking to the rules service")]
    Unexpected { status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RulesApiError {
    /// Fixed internal error code; callers branch on the message or the
    /// variant, not the code.
    pub fn code(&self) -> i32 {
        ERROR_CODE
    }
}

pub type Result<T> = std::result::Result<T, RulesApiError>;

// Structured error body the service returns on failed calls.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Classifies a non-200 response body. A body that parses as the
/// structured error shape surfaces its message; anything else becomes a
/// generic failure with the raw status and body logged for diagnosis.
pub(crate) fn normalize_failure(status: u16, body: &str) -> RulesApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => RulesApiError::Api {
            message: parsed.error.message,
        },
        Err(_) => {
            warn!(status, body, "rules service returned an unstructured failure");
            RulesApiError::Unexpected { status }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_surfaces_message() {
        let err = normalize_failure(400, r#"{"error":{"message":"Invalid ruleset"}}"#);
        assert_eq!(err.to_string(), "Invalid ruleset");
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn unstructured_body_gets_generic_message() {
        let err = normalize_failure(502, "Bad Gateway");
        assert_eq!(err.to_string(), "unexpected error talking to the rules service");
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn empty_body_gets_generic_message() {
        let err = normalize_failure(500, "");
        assert!(matches!(err, RulesApiError::Unexpected { status: 500 }));
    }
}
