//! Synchronous client for the NFHub NFe API.
//!
//! # Overview
//! Issues, corrects, cancels and retrieves Brazilian electronic invoices
//! (NFe) and manages fiscal series through NFHub's REST API. Every call is
//! scoped to a tenant by its CNPJ, sent as the `company-cnpj` header.
//!
//! # Design
//! - `NfeClient` builds `HttpRequest` values and classifies `HttpResponse`
//!   values without touching the network (host-does-IO pattern).
//! - Per-call behavior (binary download, multipart upload) is part of the
//!   request, never state on the client.
//! - All operations share one classification policy: success-range responses
//!   come back as `ApiResponse`; anything else is `ApiError::Rejected` with the
//!   server's `message`, its `errors` joined by CR-LF, or the serialized
//!   response.
//! - `NfeApi` wires a client to a `Transport` (`UreqTransport` by default) for
//!   one-call operations.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod transport;
pub mod types;

pub use api::NfeApi;
pub use client::{NfeClient, EMPTY_IMPORT_MESSAGE, TENANT_HEADER};
pub use config::{ClientConfig, StatusPolicy};
pub use error::{ApiError, MessageOrigin};
pub use http::{FormPart, HttpMethod, HttpRequest, HttpResponse, PartContent, RequestBody, ResponseMode, UploadFile};
pub use response::{ApiResponse, ResponseBody};
pub use transport::{Transport, UreqTransport};
pub use types::{CertificateUpload, QueryParams, SeriesFilter};
