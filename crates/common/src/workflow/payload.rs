//! Submission payload and its normalization rules

use serde::Deserialize;
use validator::Validate;

use crate::db::models::{ExamType, MaterialType};
use crate::errors::{AppError, Result};
use crate::workflow::store::NoteSubmission;

/// Raw submission fields as received from a form or JSON body
///
/// Every field is optional text; [`SubmissionPayload::normalize`] applies
/// trimming, integer coercion and defaults.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[validate(length(max = 300))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub subject: Option<String>,

    #[validate(length(max = 200))]
    pub department: Option<String>,

    pub semester: Option<String>,

    #[serde(alias = "type", alias = "material_type")]
    pub material_type: Option<String>,

    pub year: Option<String>,

    #[serde(alias = "exam_type")]
    pub exam_type: Option<String>,
}

impl SubmissionPayload {
    /// Set a field by its form name; unknown names are ignored
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "subject" => &mut self.subject,
            "department" => &mut self.department,
            "semester" => &mut self.semester,
            "type" | "materialType" | "material_type" => &mut self.material_type,
            "year" => &mut self.year,
            "examType" | "exam_type" => &mut self.exam_type,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Trim, coerce and default the payload into a submission
    pub fn normalize(&self) -> Result<NoteSubmission> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: None,
        })?;

        let title = required_text(&self.title, "title")?;
        let subject = required_text(&self.subject, "subject")?;
        let department = required_text(&self.department, "department")?;
        let semester = match trimmed(&self.semester) {
            Some(raw) => positive_int(raw, "semester")?,
            None => return Err(AppError::MissingField { field: "semester".to_string() }),
        };

        let material_type = match trimmed(&self.material_type) {
            Some(raw) => raw.to_ascii_lowercase().parse::<MaterialType>()?,
            None => MaterialType::default(),
        };

        let exam_type = match trimmed(&self.exam_type) {
            Some(raw) => raw.to_ascii_lowercase().parse::<ExamType>()?,
            None => ExamType::default(),
        };

        let year = trimmed(&self.year)
            .map(|raw| positive_int(raw, "year"))
            .transpose()?
            .filter(|_| material_type == MaterialType::Pastpaper);

        Ok(NoteSubmission {
            title,
            description: trimmed(&self.description).unwrap_or_default().to_string(),
            subject,
            department,
            semester,
            material_type,
            year,
            exam_type,
        })
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required_text(value: &Option<String>, field: &str) -> Result<String> {
    trimmed(value)
        .map(str::to_string)
        .ok_or_else(|| AppError::MissingField { field: field.to_string() })
}

fn positive_int(raw: &str, field: &str) -> Result<i32> {
    match raw.parse::<i32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::validation(
            field,
            format!("{} must be a positive integer, got '{}'", field, raw),
        )),
    }
}
