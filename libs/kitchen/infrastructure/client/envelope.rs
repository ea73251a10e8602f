//! Response envelope validation
//!
//! Every endpoint answers `{success, data?, message?, error_code?}`. The raw
//! shape is checked once here and turned into a tagged [`ApiResponse`].

use super::error::RequestFailure;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// `data`, or null when the endpoint returns none
    Success(Value),
    Failure {
        error_code: Option<String>,
        message: Option<String>,
    },
}

impl ApiResponse {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEnvelope = serde_json::from_str(body)?;
        Ok(if raw.success {
            ApiResponse::Success(raw.data.unwrap_or(Value::Null))
        } else {
            ApiResponse::Failure {
                error_code: raw.error_code,
                message: raw.message,
            }
        })
    }

    /// Convert into the payload or an application failure
    pub fn into_result(self, status: u16) -> Result<Value, RequestFailure> {
        match self {
            ApiResponse::Success(data) => Ok(data),
            ApiResponse::Failure { error_code, message } => Err(RequestFailure::Application {
                status,
                error_code,
                message,
            }),
        }
    }
}

/// Validate a response body for the given status
///
/// Non-success statuses with a readable envelope become application
/// failures so their `error_code` is honoured; otherwise plain HTTP failures.
pub fn validate_body(status: u16, body: &str) -> Result<Value, RequestFailure> {
    let success_status = (200..300).contains(&status);

    match ApiResponse::parse(body) {
        Ok(ApiResponse::Success(_)) if !success_status => Err(RequestFailure::Http {
            status,
            body: body.to_string(),
        }),
        Ok(response) => response.into_result(status),
        Err(_) if !success_status => Err(RequestFailure::Http {
            status,
            body: body.to_string(),
        }),
        Err(e) => Err(RequestFailure::Decode {
            status,
            message: e.to_string(),
        }),
    }
}
