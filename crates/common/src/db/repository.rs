//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling. Implements the workflow's
//! [`RequestStore`] seam on top of SeaORM.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{map_request_insert_error, Result};
use crate::workflow::store::{
    DuplicateKey, NewNoteRequest, NoteDraft, RequestFilter, RequestStore, ReviewDecision,
};
use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl RequestStore for Repository {
    // ========================================================================
    // Note Request Operations
    // ========================================================================

    async fn insert_request(&self, request: NewNoteRequest) -> Result<NoteRequest> {
        let now = chrono::Utc::now();
        let submission = request.submission;

        let model = NoteRequestActiveModel {
            id: Set(Uuid::now_v7()),
            title: Set(submission.title),
            description: Set(submission.description),
            subject: Set(submission.subject),
            department: Set(submission.department),
            semester: Set(submission.semester),
            material_type: Set(submission.material_type.as_str().to_string()),
            year: Set(submission.year),
            exam_type: Set(submission.exam_type.as_str().to_string()),
            file_ref: Set(request.file_ref),
            requested_by: Set(request.requested_by),
            college_id: Set(request.college_id),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            reviewed_by: Set(None),
            teacher_message: Set(String::new()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        model
            .insert(self.conn())
            .await
            .map_err(map_request_insert_error)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<NoteRequest>> {
        NoteRequestEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn find_pending_duplicate(&self, key: &DuplicateKey) -> Result<Option<NoteRequest>> {
        NoteRequestEntity::find()
            .filter(NoteRequestColumn::Title.eq(key.title.as_str()))
            .filter(NoteRequestColumn::Subject.eq(key.subject.as_str()))
            .filter(NoteRequestColumn::Semester.eq(key.semester))
            .filter(NoteRequestColumn::RequestedBy.eq(key.requested_by))
            .filter(NoteRequestColumn::Status.eq(RequestStatus::Pending.as_str()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<NoteRequest>> {
        let mut query = NoteRequestEntity::find();

        if let Some(college_id) = filter.college_id {
            query = query.filter(NoteRequestColumn::CollegeId.eq(college_id));
        }

        if let Some(requested_by) = filter.requested_by {
            query = query.filter(NoteRequestColumn::RequestedBy.eq(requested_by));
        }

        if !filter.statuses.is_empty() {
            query = query.filter(
                NoteRequestColumn::Status.is_in(filter.statuses.iter().map(|s| s.as_str())),
            );
        }

        query = query
            .order_by_desc(NoteRequestColumn::CreatedAt)
            .order_by_desc(NoteRequestColumn::Id);

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        query.all(self.conn()).await.map_err(Into::into)
    }

    async fn transition_pending(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
    ) -> Result<Option<NoteRequest>> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        // Conditional update: only one reviewer can move a row out of pending
        let updated = NoteRequestEntity::update_many()
            .col_expr(NoteRequestColumn::Status, Expr::value(decision.status.as_str()))
            .col_expr(NoteRequestColumn::ReviewedBy, Expr::value(Some(decision.reviewed_by)))
            .col_expr(
                NoteRequestColumn::TeacherMessage,
                Expr::value(decision.teacher_message.clone()),
            )
            .col_expr(NoteRequestColumn::UpdatedAt, Expr::value(now))
            .filter(NoteRequestColumn::Id.eq(id))
            .filter(NoteRequestColumn::Status.eq(RequestStatus::Pending.as_str()))
            .exec_with_returning(self.conn())
            .await?;

        Ok(updated.into_iter().next())
    }

    async fn count_by_status(&self, requested_by: Uuid) -> Result<Vec<(RequestStatus, u64)>> {
        let rows: Vec<(String, i64)> = NoteRequestEntity::find()
            .select_only()
            .column(NoteRequestColumn::Status)
            .column_as(Expr::col(NoteRequestColumn::Id).count(), "count")
            .filter(NoteRequestColumn::RequestedBy.eq(requested_by))
            .group_by(NoteRequestColumn::Status)
            .into_tuple()
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(status, count)| {
                let status = status.parse::<RequestStatus>().ok()?;
                Some((status, count.max(0) as u64))
            })
            .collect())
    }

    // ========================================================================
    // Note Operations
    // ========================================================================

    async fn insert_note(&self, draft: NoteDraft) -> Result<Note> {
        let now = chrono::Utc::now();

        let note = NoteActiveModel {
            id: Set(Uuid::now_v7()),
            source_request_id: Set(draft.source_request_id),
            title: Set(draft.title),
            description: Set(draft.description),
            subject: Set(draft.subject),
            department: Set(draft.department),
            semester: Set(draft.semester),
            material_type: Set(draft.material_type),
            year: Set(draft.year),
            exam_type: Set(draft.exam_type),
            file_ref: Set(draft.file_ref),
            uploaded_by: Set(draft.uploaded_by),
            college_id: Set(draft.college_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        note.insert(self.conn()).await.map_err(Into::into)
    }

    async fn find_note_by_source(&self, request_id: Uuid) -> Result<Option<Note>> {
        NoteEntity::find()
            .filter(NoteColumn::SourceRequestId.eq(request_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_unpublished(&self, college_id: Uuid) -> Result<Vec<NoteRequest>> {
        NoteRequestEntity::find()
            .join(JoinType::LeftJoin, NoteRequestRelation::Note.def())
            .filter(NoteRequestColumn::CollegeId.eq(college_id))
            .filter(NoteRequestColumn::Status.eq(RequestStatus::Approved.as_str()))
            .filter(NoteColumn::Id.is_null())
            .order_by_desc(NoteRequestColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}
