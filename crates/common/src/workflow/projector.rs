//! Publication projector: approved request -> library note

use tracing::{info, warn};

use crate::db::models::{Note, NoteRequest, RequestStatus};
use crate::errors::{AppError, Result};
use crate::workflow::store::{NoteDraft, RequestStore};

/// Derive the note fields from a request
pub fn project(request: &NoteRequest) -> NoteDraft {
    NoteDraft {
        source_request_id: request.id,
        title: request.title.clone(),
        description: request.description.clone(),
        subject: request.subject.clone(),
        department: request.department.clone(),
        semester: request.semester,
        material_type: request.material_type.clone(),
        year: request.year,
        exam_type: request.exam_type.clone(),
        file_ref: request.file_ref.clone(),
        uploaded_by: request.requested_by,
        college_id: request.college_id,
    }
}

/// Persist the note for an approved request.
///
/// `source_request_id` is unique in storage, so an existing note for the
/// request is returned instead of inserting a second one.
pub async fn publish(store: &dyn RequestStore, request: &NoteRequest) -> Result<Note> {
    if request.request_status() != Some(RequestStatus::Approved) {
        return Err(AppError::InvalidState {
            id: request.id.to_string(),
            status: request.status.clone(),
        });
    }

    if let Some(existing) = store.find_note_by_source(request.id).await? {
        return Ok(existing);
    }

    match store.insert_note(project(request)).await {
        Ok(note) => {
            info!(
                request_id = %request.id,
                note_id = %note.id,
                college_id = %note.college_id,
                "Note published to library"
            );
            Ok(note)
        }
        Err(err) => {
            // A concurrent publisher may have won the unique key
            if let Ok(Some(existing)) = store.find_note_by_source(request.id).await {
                warn!(request_id = %request.id, "Note already published concurrently");
                return Ok(existing);
            }
            Err(err)
        }
    }
}
