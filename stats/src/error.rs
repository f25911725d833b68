//! Error types for the analytics client

use thiserror::Error;

/// Errors that can occur when talking to the analytics service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The client could not be constructed
    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP request failed (connection refused, DNS, TLS)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// The service answered with a non-success status
    #[error("Analytics API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl StatsError {
    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}
