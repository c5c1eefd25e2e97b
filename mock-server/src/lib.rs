//! In-memory stand-in for the NFHub NFe API.
//!
//! Mirrors the endpoints the client talks to closely enough to exercise
//! every response shape it has to classify: JSON successes, binary
//! downloads, `{"message": ...}` and `{"errors": [...]}` failures, and a
//! plain-text 404 that carries neither.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const TENANT_HEADER: &str = "company-cnpj";

/// Body served for every PDF download.
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj <<>> endobj\n%%EOF\n";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: u64,
    #[serde(skip)]
    pub cnpj: String,
    pub status: String,
    pub total: f64,
    pub corrections: Vec<String>,
    pub data: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub id: u64,
    pub company_id: u64,
    #[serde(rename = "type")]
    pub kind: u32,
    pub serie: u32,
    pub data: Value,
}

#[derive(Default)]
pub struct Store {
    invoices: HashMap<u64, Invoice>,
    series: HashMap<u64, Series>,
    next_invoice_id: u64,
    next_series_id: u64,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/certificates", post(register_certificate))
        .route("/invoices", post(issue_invoice))
        .route("/invoices/calculate", post(calculate_invoice))
        .route("/invoices/import", post(import_xmls))
        .route("/invoices/preDanfe", post(pre_danfe))
        .route("/invoices/disablement", post(disable_range))
        .route("/invoices/{id}", get(get_invoice))
        .route("/invoices/{id}/danfe", get(invoice_danfe))
        .route("/invoices/{id}/xml", get(invoice_xml))
        .route("/invoices/{id}/cce", post(correct_invoice))
        .route("/invoices/{id}/cce/pdf", get(correction_pdf))
        .route("/invoices/{id}/cancel", post(cancel_invoice))
        .route("/invoices/{id}/cancel/pdf", get(cancellation_pdf))
        .route("/tools/printSefaz", post(pdf_from_xml))
        .route("/companies/{company_id}/series", get(list_series).post(save_series))
        .route("/companies/{company_id}/series/{serie_id}", delete(delete_series))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Failures and extractors
// ---------------------------------------------------------------------------

/// Error bodies in the shapes the real API uses.
#[derive(Debug)]
pub enum Failure {
    Message(StatusCode, String),
    Errors(StatusCode, Vec<String>),
    Plain(StatusCode, &'static str),
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        match self {
            Failure::Message(status, message) => (status, Json(json!({ "message": message }))).into_response(),
            Failure::Errors(status, errors) => (status, Json(json!({ "errors": errors }))).into_response(),
            Failure::Plain(status, text) => (status, text).into_response(),
        }
    }
}

/// The calling company's CNPJ, taken from the tenant header.
pub struct Tenant(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Tenant(v.to_string()))
            .ok_or_else(|| Failure::Message(StatusCode::UNAUTHORIZED, format!("{TENANT_HEADER} header is required")))
    }
}

fn not_found(id: u64) -> Failure {
    Failure::Message(StatusCode::NOT_FOUND, format!("invoice {id} not found"))
}

fn owned_invoice(store: &Store, cnpj: &str, id: u64) -> Result<Invoice, Failure> {
    store
        .invoices
        .get(&id)
        .filter(|inv| inv.cnpj == cnpj)
        .cloned()
        .ok_or_else(|| not_found(id))
}

fn pdf() -> Response {
    ([(header::CONTENT_TYPE, "application/pdf")], FAKE_PDF).into_response()
}

struct Upload {
    name: String,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, Failure> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Failure::Message(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Failure::Message(StatusCode::BAD_REQUEST, e.to_string()))?;
        uploads.push(Upload {
            name,
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

/// Sum of `quantidade * valor_unitario` over `itens`, or the validation errors.
fn invoice_total(data: &Value) -> Result<f64, Vec<String>> {
    let items = match data.get("itens").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => return Err(vec!["itens must contain at least one item".to_string()]),
    };
    let mut errors = Vec::new();
    let mut total = 0.0;
    for (i, item) in items.iter().enumerate() {
        match (
            item.get("quantidade").and_then(Value::as_f64),
            item.get("valor_unitario").and_then(Value::as_f64),
        ) {
            (Some(qty), Some(price)) => total += qty * price,
            _ => errors.push(format!("itens[{i}] needs quantidade and valor_unitario")),
        }
    }
    if errors.is_empty() {
        Ok(total)
    } else {
        Err(errors)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn register_certificate(_tenant: Tenant, multipart: Multipart) -> Result<(StatusCode, Json<Value>), Failure> {
    let uploads = read_uploads(multipart).await?;
    let certificate = uploads.iter().find(|u| u.name == "certificate" && u.file_name.is_some());
    let password = uploads.iter().find(|u| u.name == "password");
    let mut errors = Vec::new();
    if certificate.map_or(true, |c| c.bytes.is_empty()) {
        errors.push("certificate file is required".to_string());
    }
    if password.map_or(true, |p| p.bytes.is_empty()) {
        errors.push("password is required".to_string());
    }
    if !errors.is_empty() {
        return Err(Failure::Errors(StatusCode::UNPROCESSABLE_ENTITY, errors));
    }
    tracing::info!("certificate registered");
    Ok((StatusCode::CREATED, Json(json!({ "status": "active" }))))
}

async fn calculate_invoice(_tenant: Tenant, Json(data): Json<Value>) -> Result<Json<Value>, Failure> {
    let total = invoice_total(&data).map_err(|e| Failure::Errors(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    Ok(Json(json!({ "total": total })))
}

async fn issue_invoice(
    State(db): State<Db>,
    Tenant(cnpj): Tenant,
    Json(data): Json<Value>,
) -> Result<(StatusCode, Json<Invoice>), Failure> {
    let total = invoice_total(&data).map_err(|e| Failure::Errors(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let mut store = db.write().await;
    store.next_invoice_id += 1;
    let invoice = Invoice {
        id: store.next_invoice_id,
        cnpj,
        status: "autorizada".to_string(),
        total,
        corrections: Vec::new(),
        data,
    };
    store.invoices.insert(invoice.id, invoice.clone());
    tracing::info!(id = invoice.id, "invoice issued");
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn get_invoice(State(db): State<Db>, Tenant(cnpj): Tenant, Path(id): Path<u64>) -> Result<Json<Invoice>, Failure> {
    owned_invoice(&*db.read().await, &cnpj, id).map(Json)
}

async fn invoice_danfe(State(db): State<Db>, Tenant(cnpj): Tenant, Path(id): Path<u64>) -> Result<Response, Failure> {
    owned_invoice(&*db.read().await, &cnpj, id)?;
    Ok(pdf())
}

async fn invoice_xml(State(db): State<Db>, Tenant(cnpj): Tenant, Path(id): Path<u64>) -> Result<Response, Failure> {
    let invoice = owned_invoice(&*db.read().await, &cnpj, id)?;
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><nfeProc><NFe><infNFe Id=\"NFe{}\"><total>{:.2}</total></infNFe></NFe></nfeProc>",
        invoice.id, invoice.total
    );
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}

async fn correct_invoice(
    State(db): State<Db>,
    Tenant(cnpj): Tenant,
    Path(id): Path<u64>,
    Json(data): Json<Value>,
) -> Result<Json<Value>, Failure> {
    let Some(text) = data.get("correcao").and_then(Value::as_str).filter(|t| !t.is_empty()) else {
        return Err(Failure::Errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec!["correcao is required".to_string()],
        ));
    };
    let mut store = db.write().await;
    owned_invoice(&store, &cnpj, id)?;
    let invoice = store.invoices.get_mut(&id).ok_or_else(|| not_found(id))?;
    if invoice.status == "cancelada" {
        return Err(Failure::Message(StatusCode::BAD_REQUEST, "invoice is cancelled".to_string()));
    }
    invoice.corrections.push(text.to_string());
    Ok(Json(json!({ "sequence": invoice.corrections.len() })))
}

async fn correction_pdf(State(db): State<Db>, Tenant(cnpj): Tenant, Path(id): Path<u64>) -> Result<Response, Failure> {
    let invoice = owned_invoice(&*db.read().await, &cnpj, id)?;
    if invoice.corrections.is_empty() {
        return Err(Failure::Message(StatusCode::NOT_FOUND, "invoice has no correction letter".to_string()));
    }
    Ok(pdf())
}

async fn cancel_invoice(
    State(db): State<Db>,
    Tenant(cnpj): Tenant,
    Path(id): Path<u64>,
    Json(data): Json<Value>,
) -> Result<Json<Invoice>, Failure> {
    let justification = data.get("justificativa").and_then(Value::as_str).unwrap_or_default();
    if justification.chars().count() < 15 {
        return Err(Failure::Errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec!["justificativa must have at least 15 characters".to_string()],
        ));
    }
    let mut store = db.write().await;
    owned_invoice(&store, &cnpj, id)?;
    let invoice = store.invoices.get_mut(&id).ok_or_else(|| not_found(id))?;
    if invoice.status == "cancelada" {
        return Err(Failure::Message(StatusCode::BAD_REQUEST, "invoice is already cancelled".to_string()));
    }
    invoice.status = "cancelada".to_string();
    Ok(Json(invoice.clone()))
}

async fn cancellation_pdf(State(db): State<Db>, Tenant(cnpj): Tenant, Path(id): Path<u64>) -> Result<Response, Failure> {
    let invoice = owned_invoice(&*db.read().await, &cnpj, id)?;
    if invoice.status != "cancelada" {
        return Err(Failure::Message(StatusCode::NOT_FOUND, "invoice is not cancelled".to_string()));
    }
    Ok(pdf())
}

async fn import_xmls(_tenant: Tenant, multipart: Multipart) -> Result<Json<Value>, Failure> {
    let uploads = read_uploads(multipart).await?;
    let files: Vec<&str> = uploads
        .iter()
        .filter(|u| u.name.starts_with("xmls[") && !u.bytes.is_empty())
        .filter_map(|u| u.file_name.as_deref())
        .collect();
    if files.is_empty() {
        return Err(Failure::Message(
            StatusCode::UNPROCESSABLE_ENTITY,
            "no XML file received".to_string(),
        ));
    }
    Ok(Json(json!({ "imported": files.len(), "files": files })))
}

async fn pdf_from_xml(_tenant: Tenant, Json(data): Json<Value>) -> Result<Response, Failure> {
    match data.get("xml").and_then(Value::as_str) {
        Some(xml) if !xml.is_empty() => Ok(pdf()),
        _ => Err(Failure::Errors(StatusCode::UNPROCESSABLE_ENTITY, vec!["xml is required".to_string()])),
    }
}

async fn pre_danfe(_tenant: Tenant, Json(data): Json<Value>) -> Result<Response, Failure> {
    invoice_total(&data).map_err(|e| Failure::Errors(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    Ok(pdf())
}

async fn disable_range(_tenant: Tenant, Json(data): Json<Value>) -> Result<Json<Value>, Failure> {
    let first = data.get("numero_inicial").and_then(Value::as_u64);
    let last = data.get("numero_final").and_then(Value::as_u64);
    match (first, last) {
        (Some(first), Some(last)) if first <= last => Ok(Json(json!({
            "status": "homologada",
            "numero_inicial": first,
            "numero_final": last,
        }))),
        (Some(_), Some(_)) => Err(Failure::Message(
            StatusCode::UNPROCESSABLE_ENTITY,
            "numero_inicial must not exceed numero_final".to_string(),
        )),
        _ => Err(Failure::Errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec!["numero_inicial is required".to_string(), "numero_final is required".to_string()],
        )),
    }
}

async fn save_series(
    State(db): State<Db>,
    _tenant: Tenant,
    Path(company_id): Path<u64>,
    Json(data): Json<Value>,
) -> Result<Json<Series>, Failure> {
    let kind = data.get("type").and_then(Value::as_u64);
    let serie = data.get("serie").and_then(Value::as_u64);
    let (Some(kind), Some(serie)) = (kind, serie) else {
        return Err(Failure::Errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec!["type is required".to_string(), "serie is required".to_string()],
        ));
    };
    let (kind, serie) = (kind as u32, serie as u32);

    let mut store = db.write().await;
    let existing = store
        .series
        .values()
        .find(|s| s.company_id == company_id && s.kind == kind && s.serie == serie)
        .map(|s| s.id);
    let id = match existing {
        Some(id) => id,
        None => {
            store.next_series_id += 1;
            store.next_series_id
        }
    };
    let series = Series {
        id,
        company_id,
        kind,
        serie,
        data,
    };
    store.series.insert(id, series.clone());
    Ok(Json(series))
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    #[serde(rename = "type")]
    pub kind: Option<u32>,
    pub serie: Option<u32>,
}

async fn list_series(
    State(db): State<Db>,
    _tenant: Tenant,
    Path(company_id): Path<u64>,
    Query(filter): Query<SeriesQuery>,
) -> Json<Vec<Series>> {
    let store = db.read().await;
    let mut series: Vec<Series> = store
        .series
        .values()
        .filter(|s| s.company_id == company_id)
        .filter(|s| filter.kind.map_or(true, |k| s.kind == k))
        .filter(|s| filter.serie.map_or(true, |n| s.serie == n))
        .cloned()
        .collect();
    series.sort_by_key(|s| s.id);
    Json(series)
}

async fn delete_series(
    State(db): State<Db>,
    _tenant: Tenant,
    Path((company_id, serie_id)): Path<(u64, u64)>,
) -> Result<StatusCode, Failure> {
    let mut store = db.write().await;
    let owned = store.series.get(&serie_id).is_some_and(|s| s.company_id == company_id);
    if !owned {
        return Err(Failure::Plain(StatusCode::NOT_FOUND, "series not found"));
    }
    store.series.remove(&serie_id);
    Ok(StatusCode::NO_CONTENT)
}
