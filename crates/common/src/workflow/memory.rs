//! In-memory store and file intake for workflow tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::models::{Note, NoteRequest, RequestStatus};
use crate::errors::{AppError, Result};
use crate::files::{FileIntake, FileRef, Upload};
use crate::workflow::store::{
    DuplicateKey, NewNoteRequest, NoteDraft, RequestFilter, RequestStore, ReviewDecision,
};

/// Mirrors the Postgres constraints: pending uniqueness and conditional updates
#[derive(Default)]
pub struct MemoryStore {
    requests: Mutex<Vec<NoteRequest>>,
    notes: Mutex<Vec<Note>>,
    fail_note_inserts: AtomicBool,
    stale_duplicate_lookup: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_note_inserts(&self, fail: bool) {
        self.fail_note_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make the duplicate pre-check see nothing, as when two submissions
    /// race past it; the insert still enforces the pending key.
    pub fn stale_duplicate_lookup(&self, stale: bool) {
        self.stale_duplicate_lookup.store(stale, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.request_status() == Some(RequestStatus::Pending))
            .count()
    }

    pub fn note_count(&self) -> usize {
        self.notes.lock().unwrap().len()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub fn request(&self, id: Uuid) -> Option<NoteRequest> {
        self.requests.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    /// Insert a fully formed record, bypassing the workflow
    pub fn seed(&self, request: NoteRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

fn key_matches(request: &NoteRequest, key: &DuplicateKey) -> bool {
    request.request_status() == Some(RequestStatus::Pending)
        && request.title == key.title
        && request.subject == key.subject
        && request.semester == key.semester
        && request.requested_by == key.requested_by
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(&self, request: NewNoteRequest) -> Result<NoteRequest> {
        let key = DuplicateKey::from(&request);
        let mut requests = self.requests.lock().unwrap();
        if requests.iter().any(|r| key_matches(r, &key)) {
            return Err(AppError::DuplicateRequest);
        }

        let now = chrono::Utc::now().into();
        let s = request.submission;
        let model = NoteRequest {
            id: Uuid::now_v7(),
            title: s.title,
            description: s.description,
            subject: s.subject,
            department: s.department,
            semester: s.semester,
            material_type: s.material_type.as_str().to_string(),
            year: s.year,
            exam_type: s.exam_type.as_str().to_string(),
            file_ref: request.file_ref,
            requested_by: request.requested_by,
            college_id: request.college_id,
            status: RequestStatus::Pending.as_str().to_string(),
            reviewed_by: None,
            teacher_message: String::new(),
            created_at: now,
            updated_at: now,
        };
        requests.push(model.clone());
        Ok(model)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<NoteRequest>> {
        Ok(self.request(id))
    }

    async fn find_pending_duplicate(&self, key: &DuplicateKey) -> Result<Option<NoteRequest>> {
        if self.stale_duplicate_lookup.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let requests = self.requests.lock().unwrap();
        Ok(requests.iter().find(|r| key_matches(r, key)).cloned())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<NoteRequest>> {
        let requests = self.requests.lock().unwrap();
        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        Ok(requests
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transition_pending(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<Option<NoteRequest>> {
        let mut requests = self.requests.lock().unwrap();
        let Some(request) = requests
            .iter_mut()
            .find(|r| r.id == id && r.request_status() == Some(RequestStatus::Pending))
        else {
            return Ok(None);
        };

        request.status = decision.status.as_str().to_string();
        request.reviewed_by = Some(decision.reviewed_by);
        request.teacher_message = decision.teacher_message.clone();
        request.updated_at = chrono::Utc::now().into();
        Ok(Some(request.clone()))
    }

    async fn count_by_status(&self, requested_by: Uuid) -> Result<Vec<(RequestStatus, u64)>> {
        let requests = self.requests.lock().unwrap();
        let mut counts: Vec<(RequestStatus, u64)> = Vec::new();
        for request in requests.iter().filter(|r| r.requested_by == requested_by) {
            let Some(status) = request.request_status() else {
                continue;
            };
            match counts.iter_mut().find(|(s, _)| *s == status) {
                Some((_, n)) => *n += 1,
                None => counts.push((status, 1)),
            }
        }
        Ok(counts)
    }

    async fn insert_note(&self, draft: NoteDraft) -> Result<Note> {
        if self.fail_note_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(sea_orm::DbErr::Custom("notes unavailable".into())));
        }

        let mut notes = self.notes.lock().unwrap();
        if notes.iter().any(|n| n.source_request_id == draft.source_request_id) {
            return Err(AppError::Database(sea_orm::DbErr::Custom(
                "duplicate source_request_id".into(),
            )));
        }

        let now = chrono::Utc::now().into();
        let note = Note {
            id: Uuid::now_v7(),
            source_request_id: draft.source_request_id,
            title: draft.title,
            description: draft.description,
            subject: draft.subject,
            department: draft.department,
            semester: draft.semester,
            material_type: draft.material_type,
            year: draft.year,
            exam_type: draft.exam_type,
            file_ref: draft.file_ref,
            uploaded_by: draft.uploaded_by,
            college_id: draft.college_id,
            created_at: now,
            updated_at: now,
        };
        notes.push(note.clone());
        Ok(note)
    }

    async fn find_note_by_source(&self, request_id: Uuid) -> Result<Option<Note>> {
        let notes = self.notes.lock().unwrap();
        Ok(notes.iter().find(|n| n.source_request_id == request_id).cloned())
    }

    async fn list_unpublished(&self, college_id: Uuid) -> Result<Vec<NoteRequest>> {
        let published: Vec<Uuid> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.source_request_id)
            .collect();
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .rev()
            .filter(|r| {
                r.college_id == college_id
                    && r.request_status() == Some(RequestStatus::Approved)
                    && !published.contains(&r.id)
            })
            .cloned()
            .collect())
    }
}

/// File intake that remembers what it stored and released
#[derive(Default)]
pub struct MemoryFiles {
    pub stored: Mutex<Vec<FileRef>>,
    pub deleted: Mutex<Vec<FileRef>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FileIntake for MemoryFiles {
    async fn store(&self, upload: Upload) -> Result<FileRef> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::FileIntake { message: "disk full".into() });
        }
        let file_ref = FileRef::new(format!("/uploads/{}-{}", Uuid::new_v4(), upload.file_name));
        self.stored.lock().unwrap().push(file_ref.clone());
        Ok(file_ref)
    }

    async fn delete(&self, file_ref: &FileRef) {
        self.deleted.lock().unwrap().push(file_ref.clone());
    }
}

/// A pending request with plausible field values
pub fn fixture_request() -> NoteRequest {
    let now = chrono::Utc::now().into();
    NoteRequest {
        id: Uuid::new_v4(),
        title: "DBMS Unit1".into(),
        description: "Relational algebra".into(),
        subject: "DBMS".into(),
        department: "CSE".into(),
        semester: 3,
        material_type: "note".into(),
        year: None,
        exam_type: "other".into(),
        file_ref: "/uploads/dbms-unit1.pdf".into(),
        requested_by: Uuid::new_v4(),
        college_id: Uuid::new_v4(),
        status: RequestStatus::Pending.as_str().into(),
        reviewed_by: None,
        teacher_message: String::new(),
        created_at: now,
        updated_at: now,
    }
}
