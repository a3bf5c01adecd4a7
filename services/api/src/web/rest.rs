//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use document_insights_core::{
    Analysis, Dashboard, DocumentRecord, OwnerId, PipelineError, QuotaStatus, StoredObject,
    UploadRequest,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Upload types accepted before a file reaches the pipeline.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/png",
    "image/jpeg",
];

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_handler,
        quota_handler,
        documents_handler,
    ),
    components(
        schemas(
            UploadResponse, FileResponse, DocumentResponse, QuotaResponse,
            DashboardResponse, DashboardDocumentResponse, DashboardSummaryResponse,
            ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Document Insights API", description = "Upload documents and get plain-language analyses.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme the protected paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            used: None,
            limit: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, error: impl Into<String>) -> HandlerError {
    (status, Json(ErrorResponse::new(error)))
}

/// The stored blob, as reported back to the uploader.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    id: String,
    name: String,
    original_filename: String,
    content_length: u64,
    content_type: String,
    url: String,
}

/// The created document record.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    id: String,
    file_name: String,
    original_filename: String,
    owner_id: String,
    storage_url: String,
    created_at: DateTime<Utc>,
}

/// The response payload sent after a successful upload.
///
/// `analysis` is null whenever no quota unit was consumed.
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    success: bool,
    file: FileResponse,
    document: DocumentResponse,
    #[schema(value_type = Option<Object>)]
    analysis: Option<Analysis>,
}

impl UploadResponse {
    fn new(stored: StoredObject, document: DocumentRecord, analysis: Option<Analysis>) -> Self {
        Self {
            success: true,
            file: FileResponse {
                id: stored.id.to_string(),
                name: stored.name,
                original_filename: document.original_filename.clone(),
                content_length: stored.size_bytes,
                content_type: stored.content_type,
                url: stored.url,
            },
            document: DocumentResponse {
                file_name: document.id.to_string(),
                id: document.id.to_string(),
                original_filename: document.original_filename,
                owner_id: document.owner_id.to_string(),
                storage_url: document.storage_url,
                created_at: document.created_at,
            },
            analysis,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuotaResponse {
    used: u64,
    limit: u64,
    remaining: u64,
}

impl From<QuotaStatus> for QuotaResponse {
    fn from(status: QuotaStatus) -> Self {
        Self {
            used: status.used,
            limit: status.limit,
            remaining: status.remaining,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDocumentResponse {
    id: String,
    name: String,
    uploaded_at: DateTime<Utc>,
    /// One of `urgent`, `actionRequired`, `informational`.
    category: String,
    category_label: String,
    risk_level: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummaryResponse {
    informational: usize,
    action_required: usize,
    urgent: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    total_analyzed: usize,
    documents: Vec<DashboardDocumentResponse>,
    summary: DashboardSummaryResponse,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            total_analyzed: dashboard.total_analyzed,
            documents: dashboard
                .documents
                .into_iter()
                .map(|entry| DashboardDocumentResponse {
                    id: entry.id.to_string(),
                    name: entry.name,
                    uploaded_at: entry.uploaded_at,
                    category: entry.category.as_str().to_string(),
                    category_label: entry.category_label.to_string(),
                    risk_level: entry.risk_level.map(|r| r.to_string()),
                })
                .collect(),
            summary: DashboardSummaryResponse {
                informational: dashboard.summary.informational,
                action_required: dashboard.summary.action_required,
                urgent: dashboard.summary.urgent,
            },
        }
    }
}

//=========================================================================================
// Multipart Handling
//=========================================================================================

struct UploadedFile {
    file_name: String,
    mime_type: String,
    bytes: Bytes,
}

fn multipart_rejection(e: MultipartError, max_bytes: usize) -> HandlerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        multipart_too_large(max_bytes)
    } else {
        reject(StatusCode::BAD_REQUEST, e.body_text())
    }
}

/// Reads the `file` part of the form and applies the upload allow-list.
async fn read_file_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedFile, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_rejection(e, max_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .map(|m| m.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(reject(
                StatusCode::BAD_REQUEST,
                "Invalid file type. Allowed: PDF, Word, Text, PNG, JPEG",
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_rejection(e, max_bytes))?;
        if bytes.len() > max_bytes {
            return Err(multipart_too_large(max_bytes));
        }
        if bytes.is_empty() {
            return Err(reject(StatusCode::BAD_REQUEST, "Uploaded file is empty"));
        }

        return Ok(UploadedFile {
            file_name,
            mime_type,
            bytes,
        });
    }

    Err(reject(StatusCode::BAD_REQUEST, "No file provided"))
}

fn multipart_too_large(max_bytes: usize) -> HandlerError {
    reject(
        StatusCode::BAD_REQUEST,
        format!(
            "File too large. Maximum size is {}MB.",
            max_bytes / (1024 * 1024)
        ),
    )
}

fn pipeline_rejection(e: PipelineError) -> HandlerError {
    match e {
        PipelineError::InvalidInput(message) => reject(StatusCode::BAD_REQUEST, message),
        PipelineError::QuotaExceeded { used, limit } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                used: Some(used),
                limit: Some(limit),
                ..ErrorResponse::new(format!(
                    "Analysis limit reached ({} of {} used)",
                    used, limit
                ))
            }),
        ),
        PipelineError::QuotaUnavailable(_)
        | PipelineError::StorageFailure(_)
        | PipelineError::PersistenceFailure(_) => {
            error!("Upload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to upload file").with_message(e.to_string())),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a document and, when possible, analyze it.
///
/// Accepts a multipart/form-data request with a `file` part. PDFs are analyzed;
/// other allowed types are stored only.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "The document to upload, in a part named `file`."),
    responses(
        (status = 201, description = "File stored; analysis is null when unavailable", body = UploadResponse),
        (status = 400, description = "Missing, empty, too large or disallowed file", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Analysis quota exhausted", body = ErrorResponse),
        (status = 500, description = "Storage or persistence failure", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(owner_id): Extension<OwnerId>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let max_bytes = app_state.config.max_upload_bytes;
    let upload = read_file_field(&mut multipart, max_bytes).await?;

    let result = app_state
        .pipeline
        .submit(UploadRequest {
            owner_id,
            bytes: upload.bytes,
            original_filename: upload.file_name,
            mime_type: upload.mime_type,
        })
        .await
        .map_err(pipeline_rejection)?;

    if let Some(diagnostic) = &result.diagnostic {
        warn!(
            document_id = %result.document.id,
            ?diagnostic,
            "Upload completed with analysis diagnostic"
        );
    }
    info!(
        document_id = %result.document.id,
        analyzed = result.analysis.is_some(),
        "Upload completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::new(result.stored, result.document, result.analysis)),
    ))
}

/// Report how many analyses the caller has used.
#[utoipa::path(
    get,
    path = "/api/quota",
    responses(
        (status = 200, description = "Current quota", body = QuotaResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Quota could not be read", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn quota_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(owner_id): Extension<OwnerId>,
) -> Result<Json<QuotaResponse>, HandlerError> {
    let status = app_state.quota.status(&owner_id).await.map_err(|e| {
        error!(owner = %owner_id, "Quota fetch error: {}", e);
        reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch quota")
    })?;
    Ok(Json(status.into()))
}

/// The caller's most recent analyzed documents, bucketed by urgency.
#[utoipa::path(
    get,
    path = "/api/documents",
    responses(
        (status = 200, description = "Dashboard of the 20 most recent analyzed documents", body = DashboardResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Documents could not be read", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn documents_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(owner_id): Extension<OwnerId>,
) -> Result<Json<DashboardResponse>, HandlerError> {
    let dashboard = app_state
        .dashboard
        .build_dashboard(&owner_id)
        .await
        .map_err(|e| {
            error!(owner = %owner_id, "Failed to fetch dashboard data: {}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch dashboard data",
            )
        })?;
    Ok(Json(dashboard.into()))
}
