//! Axum route handlers for the Cover Letter API.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::letter::models::{CoverLetterPayload, NormalizedBody};
use crate::letter::pipeline::CompiledLetter;
use crate::state::AppState;
use crate::usage::record_delivery;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const TEX_CONTENT_TYPE: &str = "text/x-tex; charset=utf-8";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub body: NormalizedBody,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cover-letters/draft
///
/// Resolves the letter body (generating it if needed) without compiling.
pub async fn handle_draft(
    State(state): State<AppState>,
    Json(payload): Json<CoverLetterPayload>,
) -> Result<Json<DraftResponse>, AppError> {
    validate_payload(&payload)?;
    let request = payload.into_request();
    let body = state.pipeline.resolve_body(&request).await?;
    Ok(Json(DraftResponse { body }))
}

/// POST /api/v1/cover-letters/source
///
/// Returns the rendered LaTeX source instead of a compiled PDF.
pub async fn handle_source(
    State(state): State<AppState>,
    Json(payload): Json<CoverLetterPayload>,
) -> Result<Response, AppError> {
    validate_payload(&payload)?;
    let request = payload.into_request();
    let source = state.pipeline.render(&request).await?;
    Ok(([(header::CONTENT_TYPE, TEX_CONTENT_TYPE)], source.into_string()).into_response())
}

/// POST /api/v1/cover-letters/pdf
///
/// Full pipeline: resolve body → render → compile. Streams the PDF back.
pub async fn handle_pdf(
    State(state): State<AppState>,
    Json(payload): Json<CoverLetterPayload>,
) -> Result<Response, AppError> {
    deliver_pdf(&state, payload).await
}

/// POST /api/v1/cover-letters/pdf/upload
///
/// Multipart variant: a `payload` JSON field plus an optional `resume` file.
/// PDF resumes are converted to text; anything else is read as UTF-8.
pub async fn handle_pdf_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut payload: Option<CoverLetterPayload> = None;
    let mut resume_text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("payload") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable payload field: {e}")))?;
                payload = Some(serde_json::from_str(&text).map_err(|e| {
                    AppError::Validation(format!("payload is not a valid cover letter request: {e}"))
                })?);
            }
            Some("resume") => {
                let is_pdf = field.content_type() == Some(PDF_CONTENT_TYPE)
                    || field
                        .file_name()
                        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".pdf"));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable resume field: {e}")))?;
                resume_text = Some(resume_to_text(bytes.to_vec(), is_pdf).await?);
            }
            _ => {}
        }
    }

    let mut payload =
        payload.ok_or_else(|| AppError::Validation("Missing 'payload' field".to_string()))?;
    if let Some(text) = resume_text {
        payload.resume_text = Some(text);
    }
    deliver_pdf(&state, payload).await
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn deliver_pdf(state: &AppState, payload: CoverLetterPayload) -> Result<Response, AppError> {
    validate_payload(&payload)?;
    let user_id = payload.user_id;
    let request = payload.into_request();

    let letter = state.pipeline.compile(&request).await?;

    // Only a delivered PDF counts against the user.
    record_delivery(state.ledger.as_ref(), user_id).await;

    info!("Delivering {} ({} bytes)", letter.file_name, letter.pdf.len());
    Ok(pdf_response(letter))
}

fn pdf_response(letter: CompiledLetter) -> Response {
    (
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", letter.file_name),
            ),
        ],
        letter.pdf,
    )
        .into_response()
}

fn validate_payload(payload: &CoverLetterPayload) -> Result<(), AppError> {
    let required = [
        ("name", &payload.name),
        ("email", &payload.email),
        ("company", &payload.company),
        ("position", &payload.position),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }
    Ok(())
}

async fn resume_to_text(bytes: Vec<u8>, is_pdf: bool) -> Result<String, AppError> {
    if !is_pdf {
        return String::from_utf8(bytes)
            .map_err(|_| AppError::Validation("Resume file must be a PDF or UTF-8 text".to_string()));
    }

    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Resume extraction task failed: {e}")))?
        .map_err(|e| AppError::Validation(format!("Could not read text from resume PDF: {e}")))
}
