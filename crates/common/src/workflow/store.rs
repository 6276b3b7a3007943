//! Storage seam for the review workflow

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{ExamType, MaterialType, Note, NoteRequest, RequestStatus};
use crate::errors::Result;

/// Normalized descriptive fields of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSubmission {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub department: String,
    pub semester: i32,
    pub material_type: MaterialType,
    pub year: Option<i32>,
    pub exam_type: ExamType,
}

/// A request ready to be persisted as pending
#[derive(Debug, Clone)]
pub struct NewNoteRequest {
    pub submission: NoteSubmission,
    pub file_ref: String,
    pub requested_by: Uuid,
    pub college_id: Uuid,
}

/// Fields that identify an identical pending submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub title: String,
    pub subject: String,
    pub semester: i32,
    pub requested_by: Uuid,
}

impl From<&NewNoteRequest> for DuplicateKey {
    fn from(request: &NewNoteRequest) -> Self {
        Self {
            title: request.submission.title.clone(),
            subject: request.submission.subject.clone(),
            semester: request.submission.semester,
            requested_by: request.requested_by,
        }
    }
}

/// Terminal status plus reviewer, written together
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub status: RequestStatus,
    pub reviewed_by: Uuid,
    pub teacher_message: String,
}

/// Selection of requests; results are always newest first
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub college_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    pub statuses: Vec<RequestStatus>,
    pub limit: Option<u64>,
}

impl RequestFilter {
    pub fn college(college_id: Uuid) -> Self {
        Self { college_id: Some(college_id), ..Default::default() }
    }

    pub fn requester(requested_by: Uuid) -> Self {
        Self { requested_by: Some(requested_by), ..Default::default() }
    }

    pub fn with_statuses(mut self, statuses: &[RequestStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the filter against a single record
    pub fn matches(&self, request: &NoteRequest) -> bool {
        self.college_id.map_or(true, |id| request.college_id == id)
            && self.requested_by.map_or(true, |id| request.requested_by == id)
            && (self.statuses.is_empty()
                || request
                    .request_status()
                    .is_some_and(|status| self.statuses.contains(&status)))
    }
}

/// Note fields derived from an approved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub source_request_id: Uuid,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub department: String,
    pub semester: i32,
    pub material_type: String,
    pub year: Option<i32>,
    pub exam_type: String,
    pub file_ref: String,
    pub uploaded_by: Uuid,
    pub college_id: Uuid,
}

/// Durable record store used by the workflow
///
/// Implementations must make `insert_request` reject a second pending
/// request with the same [`DuplicateKey`] (`AppError::DuplicateRequest`),
/// and `transition_pending` must succeed for at most one caller per request.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: NewNoteRequest) -> Result<NoteRequest>;

    async fn find_request(&self, id: Uuid) -> Result<Option<NoteRequest>>;

    async fn find_pending_duplicate(&self, key: &DuplicateKey) -> Result<Option<NoteRequest>>;

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<NoteRequest>>;

    /// Apply a decision only if the request is still pending.
    ///
    /// Returns `None` when no pending row matched.
    async fn transition_pending(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<Option<NoteRequest>>;

    async fn count_by_status(&self, requested_by: Uuid) -> Result<Vec<(RequestStatus, u64)>>;

    async fn insert_note(&self, draft: NoteDraft) -> Result<Note>;

    async fn find_note_by_source(&self, request_id: Uuid) -> Result<Option<Note>>;

    /// Approved requests of a college that have no published note
    async fn list_unpublished(&self, college_id: Uuid) -> Result<Vec<NoteRequest>>;
}
