//! Response classification shared by every NFHub operation.
//!
//! # Design
//! A response in the success range is handed back as an `ApiResponse`, its
//! body decoded or left raw according to the call's `ResponseMode`. Anything
//! else becomes `ApiError::Rejected`, with the message taken from, in order:
//! the body's `message` field, the body's `errors` list joined by CR-LF, or
//! the whole response serialized as JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::StatusPolicy;
use crate::error::{ApiError, MessageOrigin};
use crate::http::{HttpResponse, ResponseMode};

/// Separator placed between entries of an `errors` list.
pub const ERRORS_SEPARATOR: &str = "\r\n";

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Decoded JSON. An empty body decodes to `Value::Null`.
    Json(Value),
    /// Undecoded bytes, e.g. a PDF or an XML document.
    Raw(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Raw(bytes) => Some(bytes),
        }
    }
}

/// A response that passed classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Deserialize a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        match &self.body {
            ResponseBody::Json(value) => {
                serde_json::from_value(value.clone()).map_err(|e| ApiError::Deserialization(e.to_string()))
            }
            ResponseBody::Raw(_) => Err(ApiError::Deserialization(
                "response body was not decoded as JSON".to_string(),
            )),
        }
    }

    /// Raw body bytes of a binary download.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.body.as_bytes()
    }
}

/// Serialized form of a rejected response, used when the body explains
/// nothing on its own.
#[derive(Serialize)]
struct RawDiagnostic<'a> {
    status: u16,
    headers: &'a [(String, String)],
    body: Value,
}

/// Apply the classification policy to a transport response.
pub fn classify(
    response: HttpResponse,
    mode: ResponseMode,
    policy: StatusPolicy,
) -> Result<ApiResponse, ApiError> {
    if policy.is_success(response.status) {
        let body = match mode {
            ResponseMode::Json => ResponseBody::Json(decode_json(&response.body)?),
            ResponseMode::Raw => ResponseBody::Raw(response.body),
        };
        return Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
        });
    }
    Err(rejection(&response))
}

fn decode_json(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Build the `Rejected` error for a response outside the success range.
///
/// Error bodies are inspected as JSON regardless of the call's response mode.
fn rejection(response: &HttpResponse) -> ApiError {
    let decoded = serde_json::from_slice::<Value>(&response.body).ok();

    if let Some(message) = decoded.as_ref().and_then(|body| body.get("message")).and_then(text_of) {
        return ApiError::Rejected {
            status: response.status,
            origin: MessageOrigin::Message,
            message,
        };
    }

    if let Some(errors) = decoded.as_ref().and_then(|body| body.get("errors")).and_then(Value::as_array) {
        let message = errors
            .iter()
            .map(|entry| text_of(entry).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(ERRORS_SEPARATOR);
        return ApiError::Rejected {
            status: response.status,
            origin: MessageOrigin::Errors,
            message,
        };
    }

    let diagnostic = RawDiagnostic {
        status: response.status,
        headers: &response.headers,
        body: decoded.unwrap_or_else(|| Value::String(String::from_utf8_lossy(&response.body).into_owned())),
    };
    ApiError::Rejected {
        status: response.status,
        origin: MessageOrigin::RawResponse,
        message: serde_json::to_string(&diagnostic).unwrap_or_else(|_| format!("HTTP {}", response.status)),
    }
}

/// Strings verbatim, other non-null values as compact JSON.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
