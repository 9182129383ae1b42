use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage identity for a notice. Never shown to the public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoticeId(pub Uuid);

impl NoticeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoticeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Public handle printed on receipts and used for status lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub String);

impl ReferenceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the submitting user as supplied by the access layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeType {
    ChangeOfName,
    LostDocument,
    CourtAffidavit,
}

impl NoticeType {
    pub const ALL: [NoticeType; 3] = [
        NoticeType::ChangeOfName,
        NoticeType::LostDocument,
        NoticeType::CourtAffidavit,
    ];

    pub const fn slug(self) -> &'static str {
        match self {
            NoticeType::ChangeOfName => "change-of-name",
            NoticeType::LostDocument => "lost-document",
            NoticeType::CourtAffidavit => "court-affidavit",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug().eq_ignore_ascii_case(value))
    }

    /// Tariff applied when the submitter does not quote a price.
    pub const fn default_price(self) -> u64 {
        match self {
            NoticeType::ChangeOfName => 15_000,
            NoticeType::LostDocument => 12_000,
            NoticeType::CourtAffidavit => 10_000,
        }
    }
}

impl fmt::Display for NoticeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Type-specific attributes captured at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum NoticeDetails {
    ChangeOfName { old_name: String, new_name: String },
    LostDocument { doc_type: String, description: String },
    CourtAffidavit { full_name: String, purpose: String },
}

impl NoticeDetails {
    pub fn notice_type(&self) -> NoticeType {
        match self {
            NoticeDetails::ChangeOfName { .. } => NoticeType::ChangeOfName,
            NoticeDetails::LostDocument { .. } => NoticeType::LostDocument,
            NoticeDetails::CourtAffidavit { .. } => NoticeType::CourtAffidavit,
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        match self {
            NoticeDetails::CourtAffidavit { full_name, .. } => Some(full_name),
            _ => None,
        }
    }

    pub fn old_name(&self) -> Option<&str> {
        match self {
            NoticeDetails::ChangeOfName { old_name, .. } => Some(old_name),
            _ => None,
        }
    }

    pub fn new_name(&self) -> Option<&str> {
        match self {
            NoticeDetails::ChangeOfName { new_name, .. } => Some(new_name),
            _ => None,
        }
    }

    /// Plain-text body printed in the newspaper.
    pub fn render_content(&self) -> String {
        match self {
            NoticeDetails::ChangeOfName { old_name, new_name } => format!(
                "I, formerly known and addressed as {old_name}, now wish to be known and \
                 addressed as {new_name}. All former documents remain valid."
            ),
            NoticeDetails::LostDocument {
                doc_type,
                description,
            } => format!(
                "I hereby notify the general public of the loss of my {doc_type}. {description}"
            ),
            NoticeDetails::CourtAffidavit { full_name, purpose } => format!(
                "I, {full_name}, do solemnly affirm the purpose of this affidavit is to {purpose}."
            ),
        }
    }
}

/// Moderation status. Closed set so filters never depend on string casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeStatus {
    Pending,
    Approved,
    Rejected,
}

impl NoticeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            NoticeStatus::Pending => "pending",
            NoticeStatus::Approved => "approved",
            NoticeStatus::Rejected => "rejected",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for NoticeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub const fn target_status(self) -> NoticeStatus {
        match self {
            ModerationDecision::Approve => NoticeStatus::Approved,
            ModerationDecision::Reject => NoticeStatus::Rejected,
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Some(Self::Approve),
            "reject" | "rejected" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Inbound submission payload. The owner comes from the caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoticeSubmission {
    pub details: NoticeDetails,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub newspaper: Option<String>,
}

/// Payment collaborator event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfirmed {
    pub reference_id: ReferenceId,
    #[serde(default)]
    pub transaction_ref: Option<String>,
}

/// Stored notice record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: NoticeId,
    pub reference_id: ReferenceId,
    pub owner_id: OwnerId,
    pub details: NoticeDetails,
    pub content: String,
    pub status: NoticeStatus,
    pub paid: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub price: u64,
    pub newspaper: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notice {
    pub fn notice_type(&self) -> NoticeType {
        self.details.notice_type()
    }

    /// Approved and paid, regardless of the scheduled date.
    pub fn is_confirmed(&self) -> bool {
        self.status == NoticeStatus::Approved && self.paid
    }

    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.is_confirmed() && self.publish_at.is_some_and(|at| at <= now)
    }

    /// Apply a partial update in place. Either every change lands or none does.
    ///
    /// Returns whether any field changed.
    pub fn apply(&mut self, patch: &NoticePatch) -> Result<bool, TransitionError> {
        if let Some(target) = patch.status {
            if self.status != NoticeStatus::Pending && self.status != target {
                return Err(TransitionError::AlreadyDecided {
                    current: self.status,
                    requested: target,
                });
            }
        }

        let mut changed = false;

        if let Some(target) = patch.status {
            if self.status != target {
                self.status = target;
                changed = true;
            }
        }

        if patch.mark_paid && !self.paid {
            self.paid = true;
            changed = true;
        }

        if let Some(at) = patch.schedule_if_unset {
            if self.publish_at.is_none() {
                self.publish_at = Some(at);
                changed = true;
            }
        }

        if changed {
            self.updated_at = patch.at;
        }

        Ok(changed)
    }

    pub fn public_view(&self) -> PublicNoticeView {
        PublicNoticeView {
            reference_id: self.reference_id.clone(),
            notice_type: self.notice_type(),
            details: self.details.clone(),
            content: self.content.clone(),
            status: self.status,
            paid: self.paid,
            publish_at: self.publish_at,
            newspaper: self.newspaper.clone(),
            created_at: self.created_at,
        }
    }
}

/// Monotonic partial update: status may only leave `pending`, `paid` may only
/// become true, and `publish_at` is only written when still unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticePatch {
    pub status: Option<NoticeStatus>,
    pub mark_paid: bool,
    pub schedule_if_unset: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

impl NoticePatch {
    pub fn moderation(
        decision: ModerationDecision,
        schedule: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(decision.target_status()),
            mark_paid: false,
            schedule_if_unset: match decision {
                ModerationDecision::Approve => schedule,
                ModerationDecision::Reject => None,
            },
            at,
        }
    }

    pub fn payment(schedule: DateTime<Utc>, at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            mark_paid: true,
            schedule_if_unset: Some(schedule),
            at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("notice is already {current}; cannot move to {requested}")]
    AlreadyDecided {
        current: NoticeStatus,
        requested: NoticeStatus,
    },
}

/// Notice as exposed to anonymous readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicNoticeView {
    pub reference_id: ReferenceId,
    pub notice_type: NoticeType,
    pub details: NoticeDetails,
    pub content: String,
    pub status: NoticeStatus,
    pub paid: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub newspaper: Option<String>,
    pub created_at: DateTime<Utc>,
}
