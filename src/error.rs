//! Error taxonomy for a poll cycle.
//!
//! None of these are fatal: the orchestrator logs them and moves on to the
//! next credential (or the next tick).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Credential rejected upstream (HTTP 401/403).
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Any other non-200 response, undecodable body, or transport failure.
    #[error("remote request failed: {0}")]
    Remote(String),

    /// A single device entry could not be normalized.
    #[error("malformed device record: {0}")]
    MalformedRecord(String),

    /// The notification sink did not accept the report.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl MonitorError {
    pub fn is_auth(&self) -> bool {
        matches!(self, MonitorError::Auth { .. })
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MonitorError::Remote(format!("request timed out: {err}"))
        } else if err.is_decode() {
            MonitorError::Remote(format!("invalid response body: {err}"))
        } else {
            MonitorError::Remote(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Remote(format!("invalid JSON payload: {err}"))
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
