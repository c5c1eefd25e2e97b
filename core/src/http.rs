//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The core
//! builds `HttpRequest` values and classifies `HttpResponse` values; a
//! [`Transport`](crate::transport::Transport) performs the actual I/O.
//!
//! Everything a single call needs to know about how its exchange behaves
//! (JSON vs multipart body, JSON vs raw response) lives on the request
//! itself. Nothing is toggled on the client between calls.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// How the response body of a call is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Decode the body as JSON.
    #[default]
    Json,
    /// Hand the body back untouched (PDF and XML downloads).
    Raw,
}

/// A file attached to a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// An XML document, as expected by the invoice import endpoint.
    pub fn xml(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(filename, "application/xml", bytes)
    }
}

/// Value of a single multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File(UploadFile),
}

/// A named multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub content: PartContent,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Text(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, file: UploadFile) -> Self {
        Self {
            name: name.into(),
            content: PartContent::File(file),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON document.
    Json(String),
    /// `multipart/form-data` fields, in order.
    Multipart(Vec<FormPart>),
}

/// An HTTP request described as plain data.
///
/// Built by `NfeClient::build_*` methods. `path` is the full URL without
/// the query string; `query` keeps the caller's ordering.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub response_mode: ResponseMode,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data, as returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
