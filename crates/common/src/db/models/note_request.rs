//! Note request entity: a submission awaiting or having received review

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Review status of a note request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected admit no further transition
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown request status: {}", other),
            }),
        }
    }
}

/// Kind of study material
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    #[default]
    Note,
    Pastpaper,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Note => "note",
            MaterialType::Pastpaper => "pastpaper",
        }
    }
}

impl FromStr for MaterialType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(MaterialType::Note),
            "pastpaper" => Ok(MaterialType::Pastpaper),
            other => Err(AppError::validation(
                "material_type",
                format!("Material type must be 'note' or 'pastpaper', got '{}'", other),
            )),
        }
    }
}

/// Exam a past paper belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Midsem,
    Endsem,
    Quiz,
    #[default]
    Other,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midsem => "midsem",
            ExamType::Endsem => "endsem",
            ExamType::Quiz => "quiz",
            ExamType::Other => "other",
        }
    }
}

impl FromStr for ExamType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "midsem" => Ok(ExamType::Midsem),
            "endsem" => Ok(ExamType::Endsem),
            "quiz" => Ok(ExamType::Quiz),
            "other" => Ok(ExamType::Other),
            other => Err(AppError::validation(
                "exam_type",
                format!("Exam type must be midsem, endsem, quiz or other, got '{}'", other),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "note_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text")]
    pub subject: String,

    #[sea_orm(column_type = "Text")]
    pub department: String,

    pub semester: i32,

    #[sea_orm(column_type = "Text")]
    pub material_type: String,

    pub year: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub exam_type: String,

    #[sea_orm(column_type = "Text")]
    pub file_ref: String,

    pub requested_by: Uuid,

    /// Fixed at creation; scopes who may review the request
    pub college_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub reviewed_by: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub teacher_message: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the review status as an enum, `None` for an unrecognised value
    pub fn request_status(&self) -> Option<RequestStatus> {
        self.status.parse().ok()
    }

    /// Check if the request can no longer be reviewed.
    ///
    /// An unrecognised status counts as terminal.
    pub fn is_terminal(&self) -> bool {
        self.request_status().map_or(true, |status| status.is_terminal())
    }

    /// Fail with `InvalidState` once the request has been reviewed
    pub fn ensure_pending(&self) -> Result<(), AppError> {
        if self.is_terminal() {
            return Err(AppError::InvalidState {
                id: self.id.to_string(),
                status: self.status.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::note::Entity")]
    Note,
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Note.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memory::fixture_request;

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<RequestStatus>().ok(), Some(RequestStatus::Approved));
        assert!("Approved".parse::<RequestStatus>().is_err());
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_pending_request_is_reviewable() {
        let request = fixture_request();
        assert_eq!(request.request_status(), Some(RequestStatus::Pending));
        assert!(request.ensure_pending().is_ok());
    }

    #[test]
    fn test_unknown_status_is_never_reviewable() {
        let mut request = fixture_request();
        request.status = "archived".into();

        assert_eq!(request.request_status(), None);
        assert!(request.is_terminal());
        assert!(matches!(
            request.ensure_pending(),
            Err(AppError::InvalidState { status, .. }) if status == "archived"
        ));
    }
}
