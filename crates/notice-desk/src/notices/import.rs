use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::info;

use super::access::CallerIdentity;
use super::domain::{ModerationDecision, NoticeDetails, NoticeSubmission, NoticeType, OwnerId};
use super::intake::ValidationError;
use super::lifecycle::{NoticeError, NoticeLifecycle};
use super::repository::NoticeRepository;

#[derive(Debug, thiserror::Error)]
pub enum NoticeImportError {
    #[error("failed to read notice export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid notice CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} could not be applied: {source}")]
    Row {
        row: usize,
        #[source]
        source: NoticeError,
    },
}

/// Counts of what an import pushed through the lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
    pub paid: usize,
}

/// Replays a CSV backlog through the regular submit, moderate, and pay operations.
///
/// Columns: `owner_id,type,old_name,new_name,doc_type,description,full_name,purpose,newspaper,price,decision,paid`.
/// Rows stop at the first failure; earlier rows stay applied.
pub struct NoticeImporter;

impl NoticeImporter {
    pub fn from_path<P, R>(
        path: P,
        lifecycle: &NoticeLifecycle<R>,
        moderator: &CallerIdentity,
    ) -> Result<ImportSummary, NoticeImportError>
    where
        P: AsRef<Path>,
        R: NoticeRepository + 'static,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, lifecycle, moderator)
    }

    pub fn from_reader<I, R>(
        reader: I,
        lifecycle: &NoticeLifecycle<R>,
        moderator: &CallerIdentity,
    ) -> Result<ImportSummary, NoticeImportError>
    where
        I: Read,
        R: NoticeRepository + 'static,
    {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut summary = ImportSummary::default();

        for (index, record) in csv_reader.deserialize::<NoticeRow>().enumerate() {
            let row_number = index + 2;
            let row = record?;
            apply_row(row, lifecycle, moderator, &mut summary).map_err(|source| {
                NoticeImportError::Row {
                    row: row_number,
                    source,
                }
            })?;
        }

        info!(
            submitted = summary.submitted,
            approved = summary.approved,
            rejected = summary.rejected,
            paid = summary.paid,
            "notice import finished"
        );
        Ok(summary)
    }
}

fn apply_row<R>(
    row: NoticeRow,
    lifecycle: &NoticeLifecycle<R>,
    moderator: &CallerIdentity,
    summary: &mut ImportSummary,
) -> Result<(), NoticeError>
where
    R: NoticeRepository + 'static,
{
    let decision = row
        .decision
        .as_deref()
        .map(|label| {
            ModerationDecision::from_label(label).ok_or_else(|| ValidationError::Unrecognized {
                field: "decision",
                value: label.to_string(),
            })
        })
        .transpose()?;
    let paid = row.paid_flag()?;
    let owner = OwnerId(row.owner_id.clone());
    let submission = row.into_submission()?;

    let notice = lifecycle.submit(owner, submission)?;
    summary.submitted += 1;

    if let Some(decision) = decision {
        lifecycle.moderate(moderator, &notice.id, decision)?;
        match decision {
            ModerationDecision::Approve => summary.approved += 1,
            ModerationDecision::Reject => summary.rejected += 1,
        }
    }

    if paid {
        lifecycle.confirm_payment(&notice.reference_id)?;
        summary.paid += 1;
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct NoticeRow {
    owner_id: String,
    #[serde(rename = "type")]
    notice_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    old_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    new_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    doc_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    full_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    purpose: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    newspaper: Option<String>,
    #[serde(default)]
    price: Option<u64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    decision: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    paid: Option<String>,
}

impl NoticeRow {
    fn paid_flag(&self) -> Result<bool, ValidationError> {
        match self.paid.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("false" | "no" | "0") => Ok(false),
            Some("true" | "yes" | "1") => Ok(true),
            Some(other) => Err(ValidationError::Unrecognized {
                field: "paid",
                value: other.to_string(),
            }),
        }
    }

    /// Missing columns become empty strings so intake reports the exact field.
    fn into_submission(self) -> Result<NoticeSubmission, ValidationError> {
        let notice_type =
            NoticeType::from_slug(&self.notice_type).ok_or(ValidationError::Unrecognized {
                field: "type",
                value: self.notice_type.clone(),
            })?;

        let details = match notice_type {
            NoticeType::ChangeOfName => NoticeDetails::ChangeOfName {
                old_name: self.old_name.unwrap_or_default(),
                new_name: self.new_name.unwrap_or_default(),
            },
            NoticeType::LostDocument => NoticeDetails::LostDocument {
                doc_type: self.doc_type.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            },
            NoticeType::CourtAffidavit => NoticeDetails::CourtAffidavit {
                full_name: self.full_name.unwrap_or_default(),
                purpose: self.purpose.unwrap_or_default(),
            },
        };

        Ok(NoticeSubmission {
            details,
            price: self.price,
            newspaper: self.newspaper,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
