//! Note request review workflow
//!
//! Submission with duplicate guarding, college-scoped review, and
//! publication of approved requests into the library.

pub mod engine;
pub mod payload;
pub mod projector;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use engine::{ApprovalOutcome, RequestStats, ReviewWorkflow, APPROVAL_MESSAGE, HISTORY_LIMIT};
pub use payload::SubmissionPayload;
pub use store::{NoteSubmission, RequestFilter, RequestStore};
