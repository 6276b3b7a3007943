//! Request workflow engine
//!
//! Owns the note request state machine:
//!
//! ```text
//! pending ──approve──▶ approved (terminal, publishes a Note)
//!    └─────reject────▶ rejected (terminal)
//! ```
//!
//! Every transition requires a teacher or admin from the request's college.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{Principal, Role, REVIEWER_ROLES, STUDENT_ROLES};
use crate::db::models::{Note, NoteRequest, RequestStatus};
use crate::errors::{AppError, Result};
use crate::files::{FileIntake, FileRef, Upload};
use crate::metrics;
use crate::workflow::payload::SubmissionPayload;
use crate::workflow::projector;
use crate::workflow::store::{
    DuplicateKey, NewNoteRequest, RequestFilter, RequestStore, ReviewDecision,
};

/// Message recorded on every approved request
pub const APPROVAL_MESSAGE: &str = "Approved and published to library";

/// Most requests returned by a history lookup
pub const HISTORY_LIMIT: u64 = 50;

/// Per-status counts of a student's requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub total: u64,
}

/// Result of a successful approval
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub request: NoteRequest,
    pub note: Note,
}

/// Note request review workflow
#[derive(Clone)]
pub struct ReviewWorkflow {
    store: Arc<dyn RequestStore>,
}

impl ReviewWorkflow {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a pending request for an already stored file
    #[instrument(skip(self, principal, payload, file_ref), fields(student_id = %principal.id))]
    pub async fn submit(
        &self,
        principal: &Principal,
        payload: &SubmissionPayload,
        file_ref: Option<&FileRef>,
    ) -> Result<NoteRequest> {
        principal.require_role(STUDENT_ROLES)?;

        let file_ref = file_ref.ok_or_else(|| {
            metrics::record_submission("invalid");
            AppError::validation("file", "File required")
        })?;

        let submission = payload.normalize().inspect_err(|_| {
            metrics::record_submission("invalid");
        })?;

        let new_request = NewNoteRequest {
            submission,
            file_ref: file_ref.as_str().to_string(),
            requested_by: principal.id,
            college_id: principal.college_id,
        };

        let key = DuplicateKey::from(&new_request);
        if let Some(existing) = self.store.find_pending_duplicate(&key).await? {
            metrics::record_submission("duplicate");
            warn!(existing_id = %existing.id, title = %key.title, "Duplicate pending request");
            return Err(AppError::DuplicateRequest);
        }

        let request = self.store.insert_request(new_request).await.inspect_err(|err| {
            if matches!(err, AppError::DuplicateRequest) {
                metrics::record_submission("duplicate");
            }
        })?;

        metrics::record_submission("accepted");
        info!(
            request_id = %request.id,
            college_id = %request.college_id,
            title = %request.title,
            "Request submitted for review"
        );

        Ok(request)
    }

    /// Store an uploaded file and submit it, releasing the file if submission fails
    pub async fn submit_upload(
        &self,
        files: &dyn FileIntake,
        principal: &Principal,
        payload: &SubmissionPayload,
        upload: Option<Upload>,
    ) -> Result<NoteRequest> {
        principal.require_role(STUDENT_ROLES)?;

        let upload = upload.ok_or_else(|| {
            metrics::record_submission("invalid");
            AppError::validation("file", "File required")
        })?;

        let file_ref = files.store(upload).await?;

        match self.submit(principal, payload, Some(&file_ref)).await {
            Ok(request) => Ok(request),
            Err(err) => {
                files.delete(&file_ref).await;
                Err(err)
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Pending requests of the reviewer's college, newest first
    pub async fn list_pending(&self, principal: &Principal) -> Result<Vec<NoteRequest>> {
        principal.require_role(REVIEWER_ROLES)?;

        let filter = RequestFilter::college(principal.college_id)
            .with_statuses(&[RequestStatus::Pending]);
        self.store.list_requests(&filter).await
    }

    /// Reviewed requests of the reviewer's college, newest first
    pub async fn list_reviewed(&self, principal: &Principal) -> Result<Vec<NoteRequest>> {
        principal.require_role(REVIEWER_ROLES)?;

        let filter = RequestFilter::college(principal.college_id)
            .with_statuses(&[RequestStatus::Approved, RequestStatus::Rejected]);
        self.store.list_requests(&filter).await
    }

    /// The student's own requests across all colleges, newest first
    pub async fn list_mine(&self, principal: &Principal) -> Result<Vec<NoteRequest>> {
        principal.require_role(STUDENT_ROLES)?;

        self.store
            .list_requests(&RequestFilter::requester(principal.id))
            .await
    }

    /// Recent requests of one student
    pub async fn list_history(
        &self,
        principal: &Principal,
        student_id: Uuid,
    ) -> Result<Vec<NoteRequest>> {
        if principal.role == Role::Student && principal.id != student_id {
            return Err(AppError::Forbidden {
                message: "Students may only view their own request history".to_string(),
            });
        }

        let filter = RequestFilter::requester(student_id).with_limit(HISTORY_LIMIT);
        self.store.list_requests(&filter).await
    }

    /// Counts of the student's own requests by status
    pub async fn stats(&self, principal: &Principal) -> Result<RequestStats> {
        principal.require_role(STUDENT_ROLES)?;

        let mut stats = RequestStats::default();
        for (status, count) in self.store.count_by_status(principal.id).await? {
            match status {
                RequestStatus::Pending => stats.pending += count,
                RequestStatus::Approved => stats.approved += count,
                RequestStatus::Rejected => stats.rejected += count,
            }
        }
        stats.total = stats.pending + stats.approved + stats.rejected;

        Ok(stats)
    }

    // ========================================================================
    // Review transitions
    // ========================================================================

    /// Approve a pending request and publish it to the library
    #[instrument(skip(self, principal), fields(reviewer_id = %principal.id))]
    pub async fn approve(
        &self,
        principal: &Principal,
        request_id: Uuid,
    ) -> Result<ApprovalOutcome> {
        let request = self.load_for_review(principal, request_id).await?;
        request.ensure_pending()?;

        let decision = ReviewDecision {
            status: RequestStatus::Approved,
            reviewed_by: principal.id,
            teacher_message: APPROVAL_MESSAGE.to_string(),
        };
        let request = self.decide(request_id, &decision).await?;

        // The status write is committed; a failure here leaves the request
        // approved but unpublished until an operator republishes it.
        let note = match projector::publish(self.store.as_ref(), &request).await {
            Ok(note) => note,
            Err(err) => {
                metrics::record_publication(false);
                error!(
                    request_id = %request_id,
                    error = %err,
                    "Request approved but publication failed"
                );
                return Err(AppError::PublicationIncomplete {
                    request_id: request_id.to_string(),
                    message: err.to_string(),
                });
            }
        };
        metrics::record_publication(true);

        Ok(ApprovalOutcome { request, note })
    }

    /// Reject a pending request with a reason for the student
    #[instrument(skip(self, principal, teacher_message), fields(reviewer_id = %principal.id))]
    pub async fn reject(
        &self,
        principal: &Principal,
        request_id: Uuid,
        teacher_message: &str,
    ) -> Result<NoteRequest> {
        principal.require_role(REVIEWER_ROLES)?;

        let message = teacher_message.trim();
        if message.is_empty() {
            return Err(AppError::validation("teacher_message", "Rejection reason is required"));
        }

        let request = self.load_for_review(principal, request_id).await?;
        request.ensure_pending()?;

        let decision = ReviewDecision {
            status: RequestStatus::Rejected,
            reviewed_by: principal.id,
            teacher_message: message.to_string(),
        };
        self.decide(request_id, &decision).await
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Approved requests of the reviewer's college that never got a note
    pub async fn list_unpublished(&self, principal: &Principal) -> Result<Vec<NoteRequest>> {
        principal.require_role(REVIEWER_ROLES)?;
        self.store.list_unpublished(principal.college_id).await
    }

    /// Publish an approved request whose note is missing.
    ///
    /// Returns the existing note unchanged if one was already published.
    #[instrument(skip(self, principal), fields(reviewer_id = %principal.id))]
    pub async fn republish(&self, principal: &Principal, request_id: Uuid) -> Result<Note> {
        let request = self.load_for_review(principal, request_id).await?;

        if request.request_status() != Some(RequestStatus::Approved) {
            return Err(AppError::InvalidState {
                id: request.id.to_string(),
                status: request.status.clone(),
            });
        }

        let note = projector::publish(self.store.as_ref(), &request)
            .await
            .inspect_err(|_| metrics::record_publication(false))?;
        metrics::record_publication(true);

        info!(request_id = %request_id, note_id = %note.id, "Request republished");
        Ok(note)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Load a request a reviewer is allowed to act on
    async fn load_for_review(&self, principal: &Principal, request_id: Uuid) -> Result<NoteRequest> {
        principal.require_role(REVIEWER_ROLES)?;

        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound { id: request_id.to_string() })?;

        if let Err(err) = principal.require_college(request.college_id) {
            warn!(
                request_id = %request_id,
                request_college = %request.college_id,
                reviewer_college = %principal.college_id,
                "Cross-college review refused"
            );
            return Err(err);
        }

        Ok(request)
    }

    /// Apply a decision atomically; losing a race surfaces as InvalidState
    async fn decide(&self, request_id: Uuid, decision: &ReviewDecision) -> Result<NoteRequest> {
        match self.store.transition_pending(request_id, decision).await? {
            Some(request) => {
                metrics::record_review(decision.status);
                info!(
                    request_id = %request_id,
                    status = %decision.status,
                    reviewer_id = %decision.reviewed_by,
                    "Request reviewed"
                );
                Ok(request)
            }
            None => {
                let current = self
                    .store
                    .find_request(request_id)
                    .await?
                    .ok_or_else(|| AppError::RequestNotFound { id: request_id.to_string() })?;
                Err(AppError::InvalidState {
                    id: request_id.to_string(),
                    status: current.status,
                })
            }
        }
    }
}
