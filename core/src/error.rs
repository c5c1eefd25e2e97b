//! Error types for the NFHub client.
//!
//! # Design
//! Every operation returns `Result<ApiResponse, ApiError>`. Server-side
//! failures land in `Rejected`, which records which part of the response
//! body the message came from. Local failures (validation, configuration,
//! serialization, transport) get their own variants so callers can tell
//! "the API said no" from "the request never made it".

/// Which part of a failed response produced the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// The body's `message` field.
    Message,
    /// The body's `errors` list, joined by CR-LF.
    Errors,
    /// Neither field was present; the message is the serialized response.
    RawResponse,
}

/// Errors returned by `NfeClient` and `NfeApi` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered with a status outside the success range.
    #[error("{message}")]
    Rejected {
        status: u16,
        origin: MessageOrigin,
        message: String,
    },

    /// Input rejected locally; no request was dispatched.
    #[error("{0}")]
    Validation(String),

    /// The client configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A successful response declared as JSON could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The transport could not complete the exchange.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// HTTP status of a rejected call.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
