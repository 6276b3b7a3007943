//! SeaORM entity models
//!
//! Database entities for StudyHub

mod note_request;
mod note;

pub use note_request::{
    Entity as NoteRequestEntity,
    Model as NoteRequest,
    ActiveModel as NoteRequestActiveModel,
    Column as NoteRequestColumn,
    Relation as NoteRequestRelation,
    RequestStatus,
    MaterialType,
    ExamType,
};

pub use note::{
    Entity as NoteEntity,
    Model as Note,
    ActiveModel as NoteActiveModel,
    Column as NoteColumn,
};
