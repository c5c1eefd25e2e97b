//! One-call facade over `NfeClient` and a `Transport`.
//!
//! Every method builds the request, executes it and classifies the response.
//! The tenant CNPJ never reaches the logs.

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::client::NfeClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, UploadFile};
use crate::response::ApiResponse;
use crate::transport::{Transport, UreqTransport};
use crate::types::{CertificateUpload, QueryParams, SeriesFilter};

/// NFHub NFe API bound to a transport.
#[derive(Clone)]
pub struct NfeApi<T> {
    client: NfeClient,
    transport: T,
}

impl NfeApi<UreqTransport> {
    /// Facade over the blocking `ureq` transport.
    pub fn connect(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::new(NfeClient::with_config(config), transport)
    }
}

impl<T: Transport> NfeApi<T> {
    pub fn new(client: NfeClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &NfeClient {
        &self.client
    }

    pub fn register_certificate(
        &self,
        cnpj: &str,
        upload: CertificateUpload,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("register_certificate", self.client.build_register_certificate(cnpj, upload, query))
    }

    pub fn calculate_invoice<P: Serialize>(
        &self,
        cnpj: &str,
        invoice: &P,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("calculate_invoice", self.client.build_calculate_invoice(cnpj, invoice, query)?)
    }

    pub fn issue_invoice<P: Serialize>(&self, cnpj: &str, invoice: &P, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("issue_invoice", self.client.build_issue_invoice(cnpj, invoice, query)?)
    }

    pub fn get_invoice(&self, cnpj: &str, id: u64, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("get_invoice", self.client.build_get_invoice(cnpj, id, query))
    }

    pub fn invoice_danfe(&self, cnpj: &str, id: u64, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("invoice_danfe", self.client.build_invoice_danfe(cnpj, id, query))
    }

    pub fn invoice_xml(&self, cnpj: &str, id: u64, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("invoice_xml", self.client.build_invoice_xml(cnpj, id, query))
    }

    pub fn correct_invoice<P: Serialize>(
        &self,
        cnpj: &str,
        id: u64,
        correction: &P,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("correct_invoice", self.client.build_correct_invoice(cnpj, id, correction, query)?)
    }

    pub fn correction_pdf(&self, cnpj: &str, id: u64, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("correction_pdf", self.client.build_correction_pdf(cnpj, id, query))
    }

    pub fn cancel_invoice<P: Serialize>(
        &self,
        cnpj: &str,
        id: u64,
        cancellation: &P,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("cancel_invoice", self.client.build_cancel_invoice(cnpj, id, cancellation, query)?)
    }

    pub fn cancellation_pdf(&self, cnpj: &str, id: u64, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("cancellation_pdf", self.client.build_cancellation_pdf(cnpj, id, query))
    }

    pub fn import_xmls(&self, cnpj: &str, xmls: Vec<UploadFile>, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("import_xmls", self.client.build_import_xmls(cnpj, xmls, query)?)
    }

    pub fn pdf_from_xml(&self, cnpj: &str, xml_base64: &str, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("pdf_from_xml", self.client.build_pdf_from_xml(cnpj, xml_base64, query)?)
    }

    pub fn pre_danfe<P: Serialize>(&self, cnpj: &str, invoice: &P, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("pre_danfe", self.client.build_pre_danfe(cnpj, invoice, query)?)
    }

    pub fn disable_range<P: Serialize>(&self, cnpj: &str, range: &P, query: QueryParams) -> Result<ApiResponse, ApiError> {
        self.send("disable_range", self.client.build_disable_range(cnpj, range, query)?)
    }

    pub fn save_series<P: Serialize>(
        &self,
        cnpj: &str,
        company_id: u64,
        series: &P,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("save_series", self.client.build_save_series(cnpj, company_id, series, query)?)
    }

    pub fn list_series(
        &self,
        cnpj: &str,
        company_id: u64,
        filter: SeriesFilter,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("list_series", self.client.build_list_series(cnpj, company_id, filter, query))
    }

    pub fn delete_series(
        &self,
        cnpj: &str,
        company_id: u64,
        serie_id: u64,
        query: QueryParams,
    ) -> Result<ApiResponse, ApiError> {
        self.send("delete_series", self.client.build_delete_series(cnpj, company_id, serie_id, query))
    }

    fn send(&self, operation: &'static str, req: HttpRequest) -> Result<ApiResponse, ApiError> {
        let span = debug_span!("nfhub", operation, method = req.method.as_str(), path = %req.path);
        let _enter = span.enter();

        let response = self.transport.execute(&req).inspect_err(|e| warn!(error = %e, "transport failed"))?;
        match self.client.parse_response(req.response_mode, response) {
            Ok(resp) => {
                debug!(status = resp.status, "request succeeded");
                Ok(resp)
            }
            Err(e) => {
                warn!(status = ?e.status(), error = %e, "request rejected");
                Err(e)
            }
        }
    }
}
