//! Typed inputs for operations whose payload shape is fixed by the client.
//!
//! Invoice, correction, cancellation, disablement and series payloads are
//! owned by the API and accepted as any `Serialize` value instead.

use crate::http::{FormPart, UploadFile};

/// Extra query parameters, sent in order after any the client adds itself.
pub type QueryParams = Vec<(String, String)>;

/// A digital certificate (A1, PKCS#12) and its password.
#[derive(Debug, Clone)]
pub struct CertificateUpload {
    pub certificate: UploadFile,
    pub password: String,
}

impl CertificateUpload {
    pub fn pkcs12(filename: impl Into<String>, bytes: Vec<u8>, password: impl Into<String>) -> Self {
        Self {
            certificate: UploadFile::new(filename, "application/x-pkcs12", bytes),
            password: password.into(),
        }
    }

    pub(crate) fn into_parts(self) -> Vec<FormPart> {
        vec![
            FormPart::file("certificate", self.certificate),
            FormPart::text("password", self.password),
        ]
    }
}

/// Filters for listing a company's fiscal series. `None` and `Some(0)` send no filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesFilter {
    /// Series type code, sent as `type`.
    pub kind: Option<u32>,
    /// Series number, sent as `serie`.
    pub serie: Option<u32>,
}
