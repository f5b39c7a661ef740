//! API handlers for the pdflock server
//!
//! Provides REST endpoints for:
//! - Full processing (watermark, metadata, encryption)
//! - Encryption only, with optional permission overrides
//! - Watermark only
//! - Liveness and readiness probes

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    Json,
};
use chrono::Utc;
use pdflock_core::error::Result as CoreResult;
use pdflock_core::validation::{decode_pdf_data_uri, encode_pdf_data_uri, validate_pdf_bytes};
use pdflock_core::{add_metadata, add_watermark, EncryptionRequest, PdfLockError};
use tracing::{error, info, warn};

use crate::error::ServerError;
use crate::models::{
    ApiResponse, EncryptPdfData, EncryptPdfRequest, HealthResponse, ProcessPdfData,
    ProcessPdfRequest, ReadyResponse, WatermarkPdfData, WatermarkPdfRequest,
};
use crate::request_id::request_id;
use crate::AppState;

const PROCESS_FAILED: &str = "Failed to process PDF";
const ENCRYPT_FAILED: &str = "Failed to encrypt PDF";
const WATERMARK_FAILED: &str = "Failed to add watermark";

const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Handler: GET /health
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.environment.clone(),
    })
}

/// Handler: GET /health/ready
///
/// Ready once the scratch directory for the encryption tool is usable.
pub async fn handle_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = matches!(
        tokio::time::timeout(READY_CHECK_TIMEOUT, tokio::fs::create_dir_all(&state.temp_dir)).await,
        Ok(Ok(()))
    );

    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        warn!(temp_dir = %state.temp_dir.display(), "Temp directory unavailable");
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    };

    (
        status,
        Json(ReadyResponse {
            status: label,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

/// Handler: POST /api/pdf/process
///
/// Optional watermark and metadata, then encryption with the contract's
/// derived password.
pub async fn handle_process_pdf(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ProcessPdfRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProcessPdfData>>, ServerError> {
    let start = Instant::now();
    let request_id = request_id(&headers);
    let Json(request) = payload?;

    let problems = request.problems(state.protector.max_pdf_size());
    if !problems.is_empty() {
        warn!(%request_id, ?problems, "Validation failed");
        return Err(ServerError::Validation(problems));
    }

    let contract_id = request.contract_id.unwrap_or_default();
    let contract_number = request.contract_number.unwrap_or_default();
    info!(
        %request_id,
        %contract_id,
        %contract_number,
        has_watermark = request.watermark_config.is_some(),
        "Processing PDF request"
    );

    let mut pdf = decode_pdf_data_uri(request.pdf_base64.as_deref().unwrap_or_default())
        .map_err(|e| failure(&request_id, PROCESS_FAILED, e))?;

    if let Some(config) = &request.watermark_config {
        let options = config
            .to_options()
            .map_err(|e| failure(&request_id, PROCESS_FAILED, e))?;
        pdf = blocking(&request_id, PROCESS_FAILED, move || add_watermark(&pdf, &options)).await?;
    }

    if let Some(metadata) = request.metadata.filter(|m| !m.is_empty()) {
        pdf = blocking(&request_id, PROCESS_FAILED, move || add_metadata(&pdf, &metadata)).await?;
    }

    let encryption = EncryptionRequest {
        contract_id,
        contract_number,
        pdf_bytes: pdf,
    };
    let (password, document) = state
        .protector
        .protect(&encryption, None)
        .await
        .map_err(|e| failure(&request_id, PROCESS_FAILED, e))?;

    let file_size = document.size_bytes();
    let processing_time = start.elapsed().as_millis() as u64;
    info!(
        %request_id,
        contract_id = %encryption.contract_id,
        file_size,
        processing_time_ms = processing_time,
        "PDF processed successfully"
    );

    Ok(Json(ApiResponse::ok(ProcessPdfData {
        encrypted_pdf_base64: encode_pdf_data_uri(&document.bytes),
        password: password.into_inner(),
        file_size,
        processing_time,
    })))
}

/// Handler: POST /api/pdf/encrypt
pub async fn handle_encrypt_pdf(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<EncryptPdfRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<EncryptPdfData>>, ServerError> {
    let request_id = request_id(&headers);
    let Json(request) = payload?;

    let problems = request.problems(state.protector.max_pdf_size());
    if !problems.is_empty() {
        warn!(%request_id, ?problems, "Validation failed");
        return Err(ServerError::Validation(problems));
    }

    let pdf = decode_pdf_data_uri(request.pdf_base64.as_deref().unwrap_or_default())
        .map_err(|e| failure(&request_id, ENCRYPT_FAILED, e))?;
    let encryption = EncryptionRequest {
        contract_id: request.contract_id.unwrap_or_default(),
        contract_number: request.contract_number.unwrap_or_default(),
        pdf_bytes: pdf,
    };
    info!(
        %request_id,
        contract_id = %encryption.contract_id,
        custom_permissions = request.permissions.is_some(),
        "Encrypting PDF"
    );

    let (password, document) = state
        .protector
        .protect(&encryption, request.permissions.as_ref())
        .await
        .map_err(|e| failure(&request_id, ENCRYPT_FAILED, e))?;

    info!(%request_id, file_size = document.size_bytes(), "PDF encrypted");

    Ok(Json(ApiResponse::ok(EncryptPdfData {
        encrypted_pdf_base64: encode_pdf_data_uri(&document.bytes),
        password: password.into_inner(),
        file_size: document.size_bytes(),
    })))
}

/// Handler: POST /api/pdf/watermark
pub async fn handle_watermark_pdf(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<WatermarkPdfRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<WatermarkPdfData>>, ServerError> {
    let request_id = request_id(&headers);
    let Json(request) = payload?;

    let max_pdf_size = state.protector.max_pdf_size();
    let problems = request.problems(max_pdf_size);
    if !problems.is_empty() {
        warn!(%request_id, ?problems, "Validation failed");
        return Err(ServerError::Validation(problems));
    }

    let pdf = decode_pdf_data_uri(request.pdf_base64.as_deref().unwrap_or_default())
        .and_then(|pdf| validate_pdf_bytes(&pdf, max_pdf_size).map(|()| pdf))
        .map_err(|e| failure(&request_id, WATERMARK_FAILED, e))?;
    let options = request
        .watermark_config
        .unwrap_or_default()
        .to_options()
        .map_err(|e| failure(&request_id, WATERMARK_FAILED, e))?;

    let watermarked =
        blocking(&request_id, WATERMARK_FAILED, move || add_watermark(&pdf, &options)).await?;

    info!(%request_id, file_size = watermarked.len(), "Watermark request completed");

    Ok(Json(ApiResponse::ok(WatermarkPdfData {
        file_size: watermarked.len(),
        watermarked_pdf_base64: encode_pdf_data_uri(&watermarked),
    })))
}

/// Fallback for unknown routes
pub async fn handle_not_found(method: Method, uri: Uri) -> ServerError {
    warn!(%method, path = %uri.path(), "Route not found");
    ServerError::NotFound
}

/// Log a core failure with its diagnostic detail and convert it for the
/// client.
fn failure(request_id: &str, context: &'static str, err: PdfLockError) -> ServerError {
    if !err.is_validation() {
        error!(%request_id, error = %err, detail = %err.detail(), "{}", context);
    }
    ServerError::processing(context, err)
}

/// Run CPU-bound lopdf work off the async workers.
async fn blocking<F>(request_id: &str, context: &'static str, work: F) -> Result<Vec<u8>, ServerError>
where
    F: FnOnce() -> CoreResult<Vec<u8>> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|e| failure(request_id, context, e)),
        Err(e) => Err(ServerError::Internal(format!("{}: worker task failed: {}", context, e))),
    }
}
