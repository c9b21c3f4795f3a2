//! Classification of non-2xx responses into actionable failures

use crate::CrawlError;
use reqwest::Response;
use serde_json::Value;
use std::fmt;

const NO_MESSAGE: &str = "No error message provided.";
const NO_DETAILS: &str = "No additional error details provided.";

/// Category of a failed API call, derived from the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 402
    PaymentRequired,
    /// 408
    Timeout,
    /// 409
    Conflict,
    /// 500
    Internal,
    /// Any other status
    Unexpected,
}

impl ErrorCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            402 => Self::PaymentRequired,
            408 => Self::Timeout,
            409 => Self::Conflict,
            500 => Self::Internal,
            _ => Self::Unexpected,
        }
    }
}

/// A classified API failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub category: ErrorCategory,
    /// What the client was trying to do, e.g. "check crawl status"
    pub action: String,
    /// The server's `error` field
    pub message: String,
    /// The server's `details` field
    pub details: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (action, message, details) = (&self.action, &self.message, &self.details);
        match self.category {
            ErrorCategory::PaymentRequired => write!(
                f,
                "Payment Required: Failed to {action}. {message} - {details}"
            ),
            ErrorCategory::Timeout => write!(
                f,
                "Request Timeout: Failed to {action} as the request timed out. {message} - {details}"
            ),
            ErrorCategory::Conflict => write!(
                f,
                "Conflict: Failed to {action} due to a conflict. {message} - {details}"
            ),
            ErrorCategory::Internal => write!(
                f,
                "Internal Server Error: Failed to {action}. {message} - {details}"
            ),
            ErrorCategory::Unexpected => write!(
                f,
                "Unexpected error during {action}: Status code {}. {message} - {details}",
                self.status
            ),
        }
    }
}

impl std::error::Error for ApiError {}

/// Builds a classified failure from a status code and a raw response body
///
/// Bodies that are not JSON objects are tolerated; the missing fields fall
/// back to their placeholders.
pub fn classify(status: u16, body: &[u8], action: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let field = |name: &str, fallback: &str| -> String {
        match parsed.as_ref().and_then(|v| v.get(name)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => fallback.to_string(),
            Some(other) => other.to_string(),
        }
    };

    ApiError {
        status,
        category: ErrorCategory::from_status(status),
        action: action.to_string(),
        message: field("error", NO_MESSAGE),
        details: field("details", NO_DETAILS),
    }
}

/// Consumes a non-2xx response and turns it into a [`CrawlError::Api`]
pub async fn error_from_response(response: Response, action: &str) -> CrawlError {
    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(body) => {
            let error = classify(status, &body, action);
            tracing::debug!("{}", error);
            CrawlError::Api(error)
        }
        Err(e) => CrawlError::Http(e),
    }
}
