//! Note request workflow handlers

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use studyhub_common::{
    auth::Principal,
    db::models::{Note, NoteRequest},
    errors::{AppError, Result},
    files::Upload,
    workflow::{RequestStats, SubmissionPayload},
};

/// Multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// Body of a rejection
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(default, alias = "teacher_message")]
    #[validate(length(max = 2000))]
    pub teacher_message: Option<String>,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub request: NoteRequest,
}

#[derive(Serialize)]
pub struct ApproveResponse {
    pub message: &'static str,
    pub request: NoteRequest,
    pub note: Note,
}

#[derive(Serialize)]
pub struct RejectResponse {
    pub message: &'static str,
    pub request: NoteRequest,
}

#[derive(Serialize)]
pub struct RepublishResponse {
    pub message: &'static str,
    pub note: Note,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::InvalidFormat {
        message: err.body_text(),
    }
}

/// Split a multipart body into text fields and the uploaded file
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(SubmissionPayload, Option<Upload>)> {
    let mut payload = SubmissionPayload::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            upload = Some(Upload { file_name, bytes: bytes.to_vec() });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            payload.set_field(&name, value);
        }
    }

    Ok((payload, upload))
}

/// Submit a note or past paper for review
pub async fn submit(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let (payload, upload) = read_submission(multipart).await?;

    let request = state
        .workflow
        .submit_upload(state.files.as_ref(), &principal, &payload, upload)
        .await?;

    Ok((StatusCode::CREATED, Json(SubmitResponse {
        message: "Request submitted for review",
        request,
    })))
}

/// The caller's own requests
pub async fn list_mine(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<NoteRequest>>> {
    Ok(Json(state.workflow.list_mine(&principal).await?))
}

/// Status counts of the caller's requests
pub async fn stats(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<RequestStats>> {
    Ok(Json(state.workflow.stats(&principal).await?))
}

/// Recent requests of a student
pub async fn list_history(
    State(state): State<AppState>,
    principal: Principal,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<NoteRequest>>> {
    Ok(Json(state.workflow.list_history(&principal, student_id).await?))
}

/// Pending requests awaiting review in the caller's college
pub async fn list_pending(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<NoteRequest>>> {
    Ok(Json(state.workflow.list_pending(&principal).await?))
}

/// Reviewed requests in the caller's college
pub async fn list_reviewed(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<NoteRequest>>> {
    Ok(Json(state.workflow.list_reviewed(&principal).await?))
}

/// Approved requests in the caller's college with no published note
pub async fn list_unpublished(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<NoteRequest>>> {
    Ok(Json(state.workflow.list_unpublished(&principal).await?))
}

/// Approve a request and publish it to the library
pub async fn approve(
    State(state): State<AppState>,
    principal: Principal,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ApproveResponse>> {
    let outcome = state.workflow.approve(&principal, request_id).await?;

    Ok(Json(ApproveResponse {
        message: "Request approved and published to library",
        request: outcome.request,
        note: outcome.note,
    }))
}

/// Reject a request with a reason
pub async fn reject(
    State(state): State<AppState>,
    principal: Principal,
    Path(request_id): Path<Uuid>,
    body: std::result::Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<RejectResponse>> {
    // A missing or unreadable body means no reason was given
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable rejection body");
        AppError::validation("teacher_message", "Rejection reason is required")
    })?;

    body.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("teacher_message".to_string()),
    })?;

    let message = body.teacher_message.unwrap_or_default();
    let request = state.workflow.reject(&principal, request_id, &message).await?;

    Ok(Json(RejectResponse {
        message: "Request rejected",
        request,
    }))
}

/// Publish an approved request whose note is missing
pub async fn republish(
    State(state): State<AppState>,
    principal: Principal,
    Path(request_id): Path<Uuid>,
) -> Result<Json<RepublishResponse>> {
    let note = state.workflow.republish(&principal, request_id).await?;

    tracing::info!(
        request_id = %request_id,
        operator_id = %principal.id,
        "Publication reconciled"
    );

    Ok(Json(RepublishResponse {
        message: "Request published to library",
        note,
    }))
}
