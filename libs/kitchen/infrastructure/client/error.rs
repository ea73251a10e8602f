//! Error classifier
//!
//! Maps any raw request failure onto a small, fixed taxonomy the UI can show
//! and the executor can act on. Pure: no logging, no side effects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NetworkError,
    Timeout,
    Unauthorized,
    DeviceDisabled,
    DeviceNotFound,
    InvalidCode,
    InvalidStatus,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "network_error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::DeviceDisabled => "device_disabled",
            ErrorCode::DeviceNotFound => "device_not_found",
            ErrorCode::InvalidCode => "invalid_code",
            ErrorCode::InvalidStatus => "invalid_status",
            ErrorCode::ServerError => "server_error",
        }
    }

    /// Whether a failure with this code is worth retrying
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorCode::NetworkError | ErrorCode::Timeout | ErrorCode::ServerError)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Unable to reach the server. Check the network connection.",
            ErrorCode::Timeout => "The server took too long to respond.",
            ErrorCode::Unauthorized => "This device is not authorized. Please pair it again.",
            ErrorCode::DeviceDisabled => "This device has been disabled by an administrator.",
            ErrorCode::DeviceNotFound => "This device is not registered.",
            ErrorCode::InvalidCode => "The pairing code is invalid or expired.",
            ErrorCode::InvalidStatus => "That status change is not allowed.",
            ErrorCode::ServerError => "The server encountered an error. Retrying shortly.",
        }
    }

    /// Map a backend `error_code` string, if it is one we know
    pub fn from_backend(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "invalid_code" => Some(ErrorCode::InvalidCode),
            "invalid_status" => Some(ErrorCode::InvalidStatus),
            "device_disabled" => Some(ErrorCode::DeviceDisabled),
            "device_not_found" => Some(ErrorCode::DeviceNotFound),
            "unauthorized" => Some(ErrorCode::Unauthorized),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure as observed by the HTTP layer, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// No response was received
    Transport { timed_out: bool, message: String },
    /// Non-success status without a decodable envelope
    Http { status: u16, body: String },
    /// Envelope with `success: false`
    Application {
        status: u16,
        error_code: Option<String>,
        message: Option<String>,
    },
    /// Response arrived but could not be decoded
    Decode { status: u16, message: String },
}

impl From<reqwest::Error> for RequestFailure {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RequestFailure::Http {
                status: status.as_u16(),
                body: e.to_string(),
            },
            None if e.is_decode() => RequestFailure::Decode {
                status: 0,
                message: e.to_string(),
            },
            None => RequestFailure::Transport {
                timed_out: e.is_timeout(),
                message: e.to_string(),
            },
        }
    }
}

/// Classified failure handed to callers
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code} (status {status}): {message}")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub retryable: bool,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, status: u16) -> Self {
        Self {
            code,
            status,
            retryable: code.retryable(),
            message: code.user_message().to_string(),
        }
    }

    fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }
}

fn classify_status(status: u16) -> ClassifiedError {
    match status {
        401 => ClassifiedError::new(ErrorCode::Unauthorized, status),
        403 => ClassifiedError::new(ErrorCode::DeviceDisabled, status),
        404 => ClassifiedError::new(ErrorCode::DeviceNotFound, status),
        s if s >= 500 => ClassifiedError::new(ErrorCode::ServerError, status),
        _ => ClassifiedError::new(ErrorCode::NetworkError, status).non_retryable(),
    }
}

pub fn classify_failure(failure: &RequestFailure) -> ClassifiedError {
    match failure {
        RequestFailure::Transport { timed_out: true, .. } => ClassifiedError::new(ErrorCode::Timeout, 0),
        RequestFailure::Transport { .. } => ClassifiedError::new(ErrorCode::NetworkError, 0),
        RequestFailure::Http { status, .. } => classify_status(*status),
        RequestFailure::Application { status, error_code, .. } => error_code
            .as_deref()
            .and_then(ErrorCode::from_backend)
            .map(|code| ClassifiedError::new(code, *status))
            .unwrap_or_else(|| classify_status(*status)),
        RequestFailure::Decode { status, .. } => {
            ClassifiedError::new(ErrorCode::NetworkError, *status).non_retryable()
        }
    }
}
