use super::domain::{NoticeDetails, NoticeSubmission, NoticeType};

/// Validation errors raised before a submission reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} must be at least {min} characters (found {found})")]
    TooShort {
        field: &'static str,
        min: usize,
        found: usize,
    },
    #[error("{notice_type} notices require a newspaper")]
    MissingNewspaper { notice_type: NoticeType },
    #[error("page must be 1 or greater")]
    InvalidPage,
    #[error("page size must be between 1 and {max} (found {found})")]
    InvalidPageSize { max: usize, found: usize },
    #[error("{field} must be 1 or greater (found {found})")]
    NotPositive { field: &'static str, found: i64 },
    #[error("invalid query string: {0}")]
    MalformedQuery(String),
    #[error("{0}")]
    Transition(String),
    #[error("unrecognized {field} '{value}'")]
    Unrecognized { field: &'static str, value: String },
}

const DEFAULT_MIN_DESCRIPTION_CHARS: usize = 20;
const DEFAULT_MIN_PURPOSE_CHARS: usize = 10;

/// Length thresholds for free-text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakePolicy {
    pub min_description_chars: usize,
    pub min_purpose_chars: usize,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            min_description_chars: DEFAULT_MIN_DESCRIPTION_CHARS,
            min_purpose_chars: DEFAULT_MIN_PURPOSE_CHARS,
        }
    }
}

/// Submission after trimming and validation, ready to be stamped with a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeDraft {
    pub details: NoticeDetails,
    pub content: String,
    pub price: u64,
    pub newspaper: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    policy: IntakePolicy,
}

impl IntakeGuard {
    pub fn with_policy(policy: IntakePolicy) -> Self {
        Self { policy }
    }

    pub fn draft_from_submission(
        &self,
        submission: NoticeSubmission,
    ) -> Result<NoticeDraft, ValidationError> {
        let NoticeSubmission {
            details,
            price,
            newspaper,
        } = submission;

        let details = match details {
            NoticeDetails::ChangeOfName { old_name, new_name } => NoticeDetails::ChangeOfName {
                old_name: required("old_name", &old_name)?,
                new_name: required("new_name", &new_name)?,
            },
            NoticeDetails::LostDocument {
                doc_type,
                description,
            } => NoticeDetails::LostDocument {
                doc_type: required("doc_type", &doc_type)?,
                description: at_least(
                    "description",
                    &description,
                    self.policy.min_description_chars,
                )?,
            },
            NoticeDetails::CourtAffidavit { full_name, purpose } => NoticeDetails::CourtAffidavit {
                full_name: required("full_name", &full_name)?,
                purpose: at_least("purpose", &purpose, self.policy.min_purpose_chars)?,
            },
        };

        let notice_type = details.notice_type();
        let newspaper = newspaper
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        if notice_type == NoticeType::ChangeOfName && newspaper.is_none() {
            return Err(ValidationError::MissingNewspaper { notice_type });
        }

        let content = details.render_content();
        let price = price.unwrap_or_else(|| notice_type.default_price());

        Ok(NoticeDraft {
            details,
            content,
            price,
            newspaper,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(trimmed.to_string())
}

fn at_least(field: &'static str, value: &str, min: usize) -> Result<String, ValidationError> {
    let trimmed = required(field, value)?;
    let found = trimmed.chars().count();
    if found < min {
        return Err(ValidationError::TooShort { field, min, found });
    }
    Ok(trimmed)
}
