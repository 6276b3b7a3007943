//! Published library entry projected from an approved request

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Request this note was published from
    #[sea_orm(unique)]
    pub source_request_id: Uuid,

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

    pub uploaded_by: Uuid,

    pub college_id: Uuid,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::note_request::Entity",
        from = "Column::SourceRequestId",
        to = "super::note_request::Column::Id"
    )]
    NoteRequest,
}

impl Related<super::note_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NoteRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
