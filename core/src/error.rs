//! Error types for the reports client.
//!
//! # Design
//! Failures detected locally (`Configuration`, `Validation`) are raised
//! before any request exists. `Transport` wraps whatever the host transport
//! reported and is passed through untouched. Non-200 responses become `Api`
//! when the body is JSON, and `NonJsonErrorBody` otherwise, so callers never
//! have to guess at the shape of an error payload.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Error type a `Transport` hands back when no response was received.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by `ReportsClient`.
#[derive(Debug, Error)]
pub enum ReportsError {
    /// A required configuration value was missing or blank.
    #[error("missing required configuration: {0}")]
    Configuration(&'static str),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The call was rejected locally; no request was sent.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The transport failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The service answered with a non-200 status and a JSON body.
    /// `response` is the body's `"response"` member, when present.
    #[error("API error, {status}")]
    Api {
        status: u16,
        response: Option<Value>,
    },

    /// The service answered with a non-200 status and a body that is not JSON.
    #[error("API error, {status}: non-JSON body")]
    NonJsonErrorBody { status: u16, body: String },

    /// Import rows could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An import stream could not be read.
    #[error("reading import stream failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error detail the service nests under `response.error`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceError {
    pub code: i64,
    pub message: String,
}

impl ReportsError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ReportsError::Validation(msg.into())
    }

    /// HTTP status for `Api` and `NonJsonErrorBody`.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReportsError::Api { status, .. } | ReportsError::NonJsonErrorBody { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Decode `response.error` into a `ServiceError`, if the service sent one.
    pub fn service_error(&self) -> Option<ServiceError> {
        match self {
            ReportsError::Api {
                response: Some(response),
                ..
            } => response
                .get("error")
                .and_then(|e| ServiceError::deserialize(e).ok()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_error_is_extracted_from_api_response() {
        let err = ReportsError::Api {
            status: 400,
            response: Some(json!({
                "uri": "/api/u/d/T",
                "action": "IMPORT",
                "error": {"code": 7138, "message": "Table not present"}
            })),
        };
        assert_eq!(
            err.service_error(),
            Some(ServiceError {
                code: 7138,
                message: "Table not present".to_string()
            })
        );
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn service_error_absent_for_unstructured_detail() {
        let err = ReportsError::Api {
            status: 403,
            response: Some(json!({"error": "denied"})),
        };
        assert!(err.service_error().is_none());

        let err = ReportsError::validation("table");
        assert!(err.service_error().is_none());
        assert!(err.status().is_none());
    }

    #[test]
    fn display_matches_api_error_convention() {
        let err = ReportsError::Api {
            status: 500,
            response: None,
        };
        assert_eq!(err.to_string(), "API error, 500");
    }
}
