//! API request handlers

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::attachments::{AttachmentStore, IncomingFile, UploadError, UploadedFile};
use crate::dispatcher::{DispatchResult, MailDispatcher};
use crate::error::{Result, ServiceError};
use crate::fetcher::{ExternalFetcher, FetchError};
use crate::templates::TemplateRenderer;
use crate::validator::{self, EmailRequest, ValidationError};

/// Multipart field carrying the uploaded file
pub const ATTACHMENT_FIELD: &str = "attachment";

/// Name reported by health and info
pub const SERVICE_NAME: &str = "Mail Service";

/// Every route the service answers, as listed by `/api/info`
pub const ENDPOINTS: [&str; 6] = [
    "POST /api/send-email",
    "POST /api/process-template",
    "GET /api/fetch-data?url=<URL>",
    "POST /api/upload-attachment",
    "GET /health",
    "GET /api/info",
];

/// Shared application state
pub struct AppState {
    pub dispatcher: MailDispatcher,
    pub fetcher: ExternalFetcher,
    pub attachments: AttachmentStore,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub message: &'static str,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

/// Body of `POST /api/process-template`
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub template: Option<String>,
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    #[serde(rename = "processedTemplate")]
    pub processed_template: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub file: UploadedFile,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

fn bad_body(rejection: JsonRejection) -> ServiceError {
    ServiceError::BadRequest(rejection.body_text())
}

/// POST /api/send-email
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<SendEmailResponse>> {
    let Json(request) = payload.map_err(bad_body)?;
    let email = validator::validate(request)?;

    match state.dispatcher.dispatch(email).await {
        DispatchResult::Sent { message_id } => Ok(Json(SendEmailResponse {
            message: "Email sent successfully",
            message_id,
        })),
        DispatchResult::Failed { reason } => {
            Err(ServiceError::dependency("Failed to send email", reason))
        }
    }
}

/// POST /api/process-template
pub async fn process_template(
    payload: std::result::Result<Json<TemplateRequest>, JsonRejection>,
) -> Result<Json<TemplateResponse>> {
    let Json(request) = payload.map_err(bad_body)?;

    let template = request
        .template
        .filter(|t| !t.is_empty())
        .ok_or(ValidationError::Required("Template"))?;
    let data = request.data.unwrap_or_default();

    let processed_template = TemplateRenderer::render(&template, &data)
        .map_err(|e| ServiceError::dependency("Template processing failed", e))?;

    debug!(
        variables = ?TemplateRenderer::extract_variables(&template).unwrap_or_default(),
        output_len = processed_template.len(),
        "Template rendered"
    );

    Ok(Json(TemplateResponse { processed_template }))
}

/// GET /api/fetch-data?url=
pub async fn fetch_data(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<FetchQuery>, QueryRejection>,
) -> Result<Json<FetchResponse>> {
    let Query(query) = query.map_err(|e| ServiceError::BadRequest(e.body_text()))?;

    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ValidationError::Required("URL parameter"))?;

    // Reject unusable targets before any network call
    let target = ExternalFetcher::parse_url(&url).map_err(|e| match e {
        FetchError::InvalidUrl(reason) => ValidationError::InvalidUrl(reason),
        other => ValidationError::InvalidUrl(other.to_string()),
    })?;

    let data = state
        .fetcher
        .fetch(target.as_str())
        .await
        .map_err(|e| ServiceError::dependency("External data fetch failed", e))?;

    Ok(Json(FetchResponse { data }))
}

/// POST /api/upload-attachment
pub async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| UploadError::Multipart(e.body_text()))?;
    let mut incoming = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        if field.name() != Some(ATTACHMENT_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if incoming.is_some() {
            return Err(UploadError::TooManyFiles.into());
        }

        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::Multipart(e.body_text()))?;

        incoming = Some(IncomingFile {
            original_name,
            content_type,
            data: data.to_vec(),
        });
    }

    let file = state
        .attachments
        .receive(incoming.ok_or(UploadError::NoFile)?)
        .await?;

    info!("File {} uploaded as {}", file.original_name, file.stored_name);

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        file,
    }))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: SERVICE_NAME,
    })
}

/// GET /api/info
pub async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS.to_vec(),
    })
}

/// Fallback for unknown paths and unsupported methods
pub async fn not_found() -> ServiceError {
    ServiceError::NotFound
}
