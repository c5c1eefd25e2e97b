//! Stateless HTTP request builder and response classifier for the NFHub NFe API.
//!
//! # Design
//! `NfeClient` holds only its `ClientConfig` and carries no mutable state
//! between calls. Each operation has a `build_*` method producing an
//! `HttpRequest`; every response goes through the single `parse_response`,
//! since the API reports success and failure the same way on all endpoints.
//! The caller (or `NfeApi`) executes the HTTP round-trip in between.
//!
//! Binary downloads and multipart uploads are expressed on the request
//! (`ResponseMode::Raw`, `RequestBody::Multipart`), so one client can serve
//! any mix of calls.

use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseMode, UploadFile};
use crate::response::{classify, ApiResponse};
use crate::types::{CertificateUpload, QueryParams, SeriesFilter};

/// Header carrying the tenant's CNPJ on every request.
pub const TENANT_HEADER: &str = "company-cnpj";

/// Message of the validation error raised for an empty import batch.
pub const EMPTY_IMPORT_MESSAGE: &str = "at least one XML file must be sent";

/// Synchronous, stateless client for the NFHub NFe API.
#[derive(Debug, Clone)]
pub struct NfeClient {
    config: ClientConfig,
}

impl NfeClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(ClientConfig::new(base_url))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -- certificates --------------------------------------------------------

    pub fn build_register_certificate(
        &self,
        cnpj: &str,
        upload: CertificateUpload,
        query: QueryParams,
    ) -> HttpRequest {
        let mut req = self.request(HttpMethod::Post, "/certificates".to_string(), cnpj, query);
        req.body = Some(RequestBody::Multipart(upload.into_parts()));
        req
    }

    // -- invoices ------------------------------------------------------------

    pub fn build_calculate_invoice<T: Serialize>(
        &self,
        cnpj: &str,
        invoice: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/invoices/calculate".to_string(), cnpj, invoice, query)
    }

    pub fn build_issue_invoice<T: Serialize>(
        &self,
        cnpj: &str,
        invoice: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/invoices".to_string(), cnpj, invoice, query)
    }

    pub fn build_get_invoice(&self, cnpj: &str, id: u64, query: QueryParams) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/invoices/{id}"), cnpj, query)
    }

    pub fn build_invoice_danfe(&self, cnpj: &str, id: u64, query: QueryParams) -> HttpRequest {
        self.download(format!("/invoices/{id}/danfe"), cnpj, query)
    }

    pub fn build_invoice_xml(&self, cnpj: &str, id: u64, query: QueryParams) -> HttpRequest {
        self.download(format!("/invoices/{id}/xml"), cnpj, query)
    }

    /// Submit a correction letter (CCE) for an issued invoice.
    pub fn build_correct_invoice<T: Serialize>(
        &self,
        cnpj: &str,
        id: u64,
        correction: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, format!("/invoices/{id}/cce"), cnpj, correction, query)
    }

    pub fn build_correction_pdf(&self, cnpj: &str, id: u64, query: QueryParams) -> HttpRequest {
        self.download(format!("/invoices/{id}/cce/pdf"), cnpj, query)
    }

    pub fn build_cancel_invoice<T: Serialize>(
        &self,
        cnpj: &str,
        id: u64,
        cancellation: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, format!("/invoices/{id}/cancel"), cnpj, cancellation, query)
    }

    pub fn build_cancellation_pdf(&self, cnpj: &str, id: u64, query: QueryParams) -> HttpRequest {
        self.download(format!("/invoices/{id}/cancel/pdf"), cnpj, query)
    }

    /// Import previously issued invoices from their XML files.
    ///
    /// Fails with `ApiError::Validation` when `xmls` is empty.
    pub fn build_import_xmls(
        &self,
        cnpj: &str,
        xmls: Vec<UploadFile>,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        if xmls.is_empty() {
            return Err(ApiError::Validation(EMPTY_IMPORT_MESSAGE.to_string()));
        }
        let parts = xmls
            .into_iter()
            .enumerate()
            .map(|(i, file)| FormPart::file(format!("xmls[{i}]"), file))
            .collect();
        let mut req = self.request(HttpMethod::Post, "/invoices/import".to_string(), cnpj, query);
        req.body = Some(RequestBody::Multipart(parts));
        Ok(req)
    }

    /// Render a DANFE PDF from a base64-encoded XML document.
    pub fn build_pdf_from_xml(
        &self,
        cnpj: &str,
        xml_base64: &str,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        let payload = serde_json::json!({ "xml": xml_base64 });
        let mut req = self.json_request(HttpMethod::Post, "/tools/printSefaz".to_string(), cnpj, &payload, query)?;
        req.response_mode = ResponseMode::Raw;
        Ok(req)
    }

    /// Render a preview DANFE from invoice data that has not been issued yet.
    pub fn build_pre_danfe<T: Serialize>(
        &self,
        cnpj: &str,
        invoice: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        let mut req = self.json_request(HttpMethod::Post, "/invoices/preDanfe".to_string(), cnpj, invoice, query)?;
        req.response_mode = ResponseMode::Raw;
        Ok(req)
    }

    /// Invalidate an unused number range of a fiscal series.
    pub fn build_disable_range<T: Serialize>(
        &self,
        cnpj: &str,
        range: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/invoices/disablement".to_string(), cnpj, range, query)
    }

    // -- fiscal series -------------------------------------------------------

    pub fn build_save_series<T: Serialize>(
        &self,
        cnpj: &str,
        company_id: u64,
        series: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, format!("/companies/{company_id}/series"), cnpj, series, query)
    }

    /// List a company's fiscal series.
    ///
    /// Any `serie` entry in `query` is dropped, as is any `type` entry when
    /// `filter.kind` is set; the explicit filters are then appended, so each
    /// is sent at most once. A filter value of `0` counts as unset.
    pub fn build_list_series(
        &self,
        cnpj: &str,
        company_id: u64,
        filter: SeriesFilter,
        mut query: QueryParams,
    ) -> HttpRequest {
        let kind = filter.kind.filter(|&k| k != 0);
        let serie = filter.serie.filter(|&s| s != 0);
        query.retain(|(name, _)| name != "serie" && !(kind.is_some() && name == "type"));
        if let Some(kind) = kind {
            query.push(("type".to_string(), kind.to_string()));
        }
        if let Some(serie) = serie {
            query.push(("serie".to_string(), serie.to_string()));
        }
        self.request(HttpMethod::Get, format!("/companies/{company_id}/series"), cnpj, query)
    }

    pub fn build_delete_series(&self, cnpj: &str, company_id: u64, serie_id: u64, query: QueryParams) -> HttpRequest {
        self.request(
            HttpMethod::Delete,
            format!("/companies/{company_id}/series/{serie_id}"),
            cnpj,
            query,
        )
    }

    // -- responses -----------------------------------------------------------

    /// Classify the response to a request built by this client.
    ///
    /// `mode` is the `response_mode` of the request that produced it.
    pub fn parse_response(&self, mode: ResponseMode, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        classify(response, mode, self.config.status_policy)
    }

    // -- helpers -------------------------------------------------------------

    fn request(&self, method: HttpMethod, path: String, cnpj: &str, query: QueryParams) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.config.base_url),
            query,
            headers: vec![(TENANT_HEADER.to_string(), cnpj.to_string())],
            body: None,
            response_mode: ResponseMode::Json,
        }
    }

    fn download(&self, path: String, cnpj: &str, query: QueryParams) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, path, cnpj, query);
        req.response_mode = ResponseMode::Raw;
        req
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: String,
        cnpj: &str,
        payload: &T,
        query: QueryParams,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(method, path, cnpj, query);
        req.headers.push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(RequestBody::Json(body));
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusPolicy;
    use crate::error::MessageOrigin;
    use crate::http::PartContent;
    use crate::response::ResponseBody;

    const CNPJ: &str = "12345678000195";

    fn client() -> NfeClient {
        NfeClient::new("http://localhost:3000")
    }

    fn json_body(req: &HttpRequest) -> serde_json::Value {
        match req.body.as_ref() {
            Some(RequestBody::Json(body)) => serde_json::from_str(body).unwrap(),
            other => panic!("expected a JSON body, got {other:?}"),
        }
    }

    fn values<'a>(query: &'a [(String, String)], name: &str) -> Vec<&'a str> {
        query.iter().filter(|(k, _)| k == name).map(|(_, v)| v.as_str()).collect()
    }

    #[test]
    fn every_request_carries_the_tenant_header() {
        let c = client();
        let invoice = serde_json::json!({ "natureza_operacao": "Venda" });
        let requests = vec![
            c.build_get_invoice(CNPJ, 1, vec![]),
            c.build_invoice_danfe(CNPJ, 1, vec![]),
            c.build_issue_invoice(CNPJ, &invoice, vec![]).unwrap(),
            c.build_list_series(CNPJ, 3, SeriesFilter::default(), vec![]),
            c.build_delete_series(CNPJ, 3, 9, vec![]),
        ];
        for req in requests {
            assert_eq!(req.headers[0], (TENANT_HEADER.to_string(), CNPJ.to_string()), "{}", req.path);
        }
    }

    #[test]
    fn build_issue_invoice_produces_correct_request() {
        let invoice = serde_json::json!({ "serie": 1, "itens": [{ "codigo": "A1", "valor": 10.5 }] });
        let req = client().build_issue_invoice(CNPJ, &invoice, vec![]).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/invoices");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.response_mode, ResponseMode::Json);
        assert_eq!(json_body(&req), invoice);
    }

    #[test]
    fn build_get_invoice_keeps_query_order() {
        let query = vec![
            ("include".to_string(), "items".to_string()),
            ("include".to_string(), "events".to_string()),
        ];
        let req = client().build_get_invoice(CNPJ, 42, query.clone());
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/invoices/42");
        assert_eq!(req.query, query);
        assert!(req.body.is_none());
    }

    #[test]
    fn downloads_use_raw_mode() {
        let c = client();
        let cases = [
            (c.build_invoice_danfe(CNPJ, 5, vec![]), "/invoices/5/danfe"),
            (c.build_invoice_xml(CNPJ, 5, vec![]), "/invoices/5/xml"),
            (c.build_correction_pdf(CNPJ, 5, vec![]), "/invoices/5/cce/pdf"),
            (c.build_cancellation_pdf(CNPJ, 5, vec![]), "/invoices/5/cancel/pdf"),
        ];
        for (req, path) in cases {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(req.path, format!("http://localhost:3000{path}"));
            assert_eq!(req.response_mode, ResponseMode::Raw, "{path}");
        }
    }

    #[test]
    fn build_pdf_from_xml_wraps_content() {
        let req = client().build_pdf_from_xml(CNPJ, "PG5mZT4=", vec![]).unwrap();
        assert_eq!(req.path, "http://localhost:3000/tools/printSefaz");
        assert_eq!(req.response_mode, ResponseMode::Raw);
        assert_eq!(json_body(&req), serde_json::json!({ "xml": "PG5mZT4=" }));
    }

    #[test]
    fn build_pre_danfe_is_raw_post() {
        let req = client()
            .build_pre_danfe(CNPJ, &serde_json::json!({ "numero": 10 }), vec![])
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/invoices/preDanfe");
        assert_eq!(req.response_mode, ResponseMode::Raw);
    }

    #[test]
    fn build_register_certificate_is_multipart() {
        let upload = CertificateUpload::pkcs12("cert.pfx", vec![0x30, 0x82], "secret");
        let req = client().build_register_certificate(CNPJ, upload, vec![]);
        assert_eq!(req.path, "http://localhost:3000/certificates");
        assert!(req.header("content-type").is_none());
        let Some(RequestBody::Multipart(parts)) = req.body else {
            panic!("expected multipart body");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "certificate");
        assert!(matches!(&parts[0].content, PartContent::File(f) if f.bytes == vec![0x30, 0x82]));
        assert_eq!(parts[1], FormPart::text("password", "secret"));
    }

    #[test]
    fn build_import_xmls_numbers_parts() {
        let files = vec![
            UploadFile::xml("a.xml", b"<nfe/>".to_vec()),
            UploadFile::xml("b.xml", b"<nfe/>".to_vec()),
        ];
        let req = client().build_import_xmls(CNPJ, files, vec![]).unwrap();
        assert_eq!(req.path, "http://localhost:3000/invoices/import");
        let Some(RequestBody::Multipart(parts)) = req.body else {
            panic!("expected multipart body");
        };
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["xmls[0]", "xmls[1]"]);
    }

    #[test]
    fn build_import_xmls_rejects_empty_batch() {
        let err = client().build_import_xmls(CNPJ, Vec::new(), vec![]).unwrap_err();
        assert!(matches!(&err, ApiError::Validation(_)));
        assert_eq!(err.to_string(), EMPTY_IMPORT_MESSAGE);
    }

    #[test]
    fn build_correct_and_cancel_paths() {
        let c = client();
        let cce = c
            .build_correct_invoice(CNPJ, 8, &serde_json::json!({ "correcao": "Endereco" }), vec![])
            .unwrap();
        assert_eq!(cce.path, "http://localhost:3000/invoices/8/cce");
        let cancel = c
            .build_cancel_invoice(CNPJ, 8, &serde_json::json!({ "justificativa": "Erro de digitacao" }), vec![])
            .unwrap();
        assert_eq!(cancel.path, "http://localhost:3000/invoices/8/cancel");
        assert_eq!(json_body(&cancel)["justificativa"], "Erro de digitacao");
    }

    #[test]
    fn build_disable_range_and_calculate() {
        let c = client();
        let range = serde_json::json!({ "serie": 1, "numero_inicial": 10, "numero_final": 20 });
        let req = c.build_disable_range(CNPJ, &range, vec![]).unwrap();
        assert_eq!(req.path, "http://localhost:3000/invoices/disablement");
        assert_eq!(json_body(&req), range);
        let req = c.build_calculate_invoice(CNPJ, &range, vec![]).unwrap();
        assert_eq!(req.path, "http://localhost:3000/invoices/calculate");
    }

    #[test]
    fn series_paths() {
        let c = client();
        let save = c
            .build_save_series(CNPJ, 3, &serde_json::json!({ "serie": 2 }), vec![])
            .unwrap();
        assert_eq!(save.method, HttpMethod::Post);
        assert_eq!(save.path, "http://localhost:3000/companies/3/series");
        let delete = c.build_delete_series(CNPJ, 3, 17, vec![]);
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.path, "http://localhost:3000/companies/3/series/17");
    }

    #[test]
    fn list_series_replaces_caller_serie_filters() {
        let query = vec![
            ("serie".to_string(), "1".to_string()),
            ("page".to_string(), "2".to_string()),
            ("serie".to_string(), "4".to_string()),
        ];
        let filter = SeriesFilter { kind: None, serie: Some(7) };
        let req = client().build_list_series(CNPJ, 3, filter, query);
        assert_eq!(values(&req.query, "serie"), ["7"]);
        assert_eq!(values(&req.query, "page"), ["2"]);
    }

    #[test]
    fn list_series_drops_serie_even_without_explicit_value() {
        let query = vec![("serie".to_string(), "1".to_string()), ("type".to_string(), "55".to_string())];
        let req = client().build_list_series(CNPJ, 3, SeriesFilter::default(), query);
        assert!(values(&req.query, "serie").is_empty());
        assert_eq!(values(&req.query, "type"), ["55"]);
    }

    #[test]
    fn list_series_explicit_type_wins() {
        let query = vec![("type".to_string(), "65".to_string())];
        let filter = SeriesFilter { kind: Some(55), serie: Some(1) };
        let req = client().build_list_series(CNPJ, 3, filter, query);
        assert_eq!(
            req.query,
            vec![("type".to_string(), "55".to_string()), ("serie".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn list_series_zero_filters_are_not_sent() {
        let query = vec![("type".to_string(), "65".to_string()), ("serie".to_string(), "3".to_string())];
        let filter = SeriesFilter { kind: Some(0), serie: Some(0) };
        let req = client().build_list_series(CNPJ, 3, filter, query);
        assert_eq!(req.query, vec![("type".to_string(), "65".to_string())]);
    }

    #[test]
    fn parse_response_uses_configured_policy() {
        let response = HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: br#"{"message":"not found"}"#.to_vec(),
        };
        let err = client().parse_response(ResponseMode::Json, response.clone()).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 404, origin: MessageOrigin::Message, .. }));

        let lenient = NfeClient::with_config(
            ClientConfig::new("http://localhost:3000").status_policy(StatusPolicy::AcceptAll),
        );
        let resp = lenient.parse_response(ResponseMode::Json, response).unwrap();
        assert_eq!(resp.body, ResponseBody::Json(serde_json::json!({ "message": "not found" })));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = NfeClient::new("http://localhost:3000/");
        let req = client.build_get_invoice(CNPJ, 1, vec![]);
        assert_eq!(req.path, "http://localhost:3000/invoices/1");
    }
}
