//! Executing `HttpRequest`s.
//!
//! # Design
//! `Transport` is the seam between the pure request/response core and the
//! network. `UreqTransport` is the blocking implementation shipped with the
//! crate; anything else (an async client, a recording fake in tests) only
//! has to turn an `HttpRequest` into an `HttpResponse`. Non-2xx statuses are
//! data, not errors: classification belongs to `NfeClient::parse_response`.

use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, PartContent, RequestBody};

/// Executes a single HTTP exchange.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .new_agent();
        Self {
            agent,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let result = match (req.method, &req.body) {
            (HttpMethod::Get, _) => decorate(self.agent.get(&req.path), req).call(),
            (HttpMethod::Delete, _) => decorate(self.agent.delete(&req.path), req).call(),
            (HttpMethod::Post, None) => decorate(self.agent.post(&req.path), req).send_empty(),
            (HttpMethod::Post, Some(RequestBody::Json(body))) => {
                decorate(self.agent.post(&req.path), req).send(body.as_bytes())
            }
            (HttpMethod::Post, Some(RequestBody::Multipart(parts))) => {
                let boundary = format!("nfhub-{}", Uuid::new_v4().simple());
                let body = encode_multipart(&boundary, parts);
                decorate(self.agent.post(&req.path), req)
                    .content_type(format!("multipart/form-data; boundary={boundary}"))
                    .send(&body[..])
            }
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_bytes)
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

/// Copy headers and query parameters, in order, onto a ureq request.
fn decorate<B>(mut builder: ureq::RequestBuilder<B>, req: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (name, value) in &req.query {
        builder = builder.query(name.as_str(), value.as_str());
    }
    builder
}

/// Encode form parts as a `multipart/form-data` body.
pub(crate) fn encode_multipart(boundary: &str, parts: &[FormPart]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let name = quoted(&part.name);
        match &part.content {
            PartContent::Text(value) => {
                out.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            PartContent::File(file) => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        quoted(&file.filename),
                        single_line(&file.content_type)
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&file.bytes);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn quoted(value: &str) -> String {
    single_line(&value.replace('"', "%22"))
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
