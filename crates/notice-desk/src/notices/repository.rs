use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Notice, NoticeId, NoticePatch, NoticeStatus, NoticeType, OwnerId, ReferenceId,
    TransitionError,
};
use super::intake::ValidationError;

/// Storage abstraction so the lifecycle and query engine can be exercised in isolation.
///
/// `insert` must reject a colliding reference atomically with
/// [`RepositoryError::DuplicateReference`], and `update` must apply the patch as a
/// single read-modify-write against one record.
pub trait NoticeRepository: Send + Sync {
    fn exists(&self, reference: &ReferenceId) -> Result<bool, RepositoryError>;
    fn insert(&self, notice: Notice) -> Result<NoticeId, RepositoryError>;
    fn find_by_id(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError>;
    fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> Result<Option<Notice>, RepositoryError>;
    fn update(&self, id: &NoticeId, patch: &NoticePatch) -> Result<Notice, RepositoryError>;
    fn query(
        &self,
        filter: &NoticeFilter,
        sort: &NoticeSort,
        skip: usize,
        limit: usize,
    ) -> Result<QueryResult, RepositoryError>;
    fn count(&self, filter: &NoticeFilter) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("reference {0} already exists")]
    DuplicateReference(ReferenceId),
    #[error("notice {0} already exists")]
    DuplicateId(NoticeId),
    #[error("notice not found")]
    NotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Page of matching records plus the pre-pagination total.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub items: Vec<Notice>,
    pub total: usize,
}

/// Conjunctive predicate over notices. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeFilter {
    pub owner: Option<OwnerId>,
    pub status: Option<NoticeStatus>,
    pub paid: Option<bool>,
    pub notice_type: Option<NoticeType>,
    pub published_as_of: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl NoticeFilter {
    pub fn matches(&self, notice: &Notice) -> bool {
        if let Some(owner) = &self.owner {
            if &notice.owner_id != owner {
                return false;
            }
        }
        if let Some(status) = self.status {
            if notice.status != status {
                return false;
            }
        }
        if let Some(paid) = self.paid {
            if notice.paid != paid {
                return false;
            }
        }
        if let Some(kind) = self.notice_type {
            if notice.notice_type() != kind {
                return false;
            }
        }
        if let Some(cutoff) = self.published_as_of {
            match notice.publish_at {
                Some(at) if at <= cutoff => {}
                _ => return false,
            }
        }
        match self.search.as_deref() {
            Some(term) => matches_search(notice, term),
            None => true,
        }
    }
}

/// Case-insensitive substring match across the searchable fields; a hit on any field qualifies.
pub fn matches_search(notice: &Notice, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    let fields = [
        notice.details.full_name(),
        notice.details.old_name(),
        notice.details.new_name(),
        Some(notice.reference_id.as_str()),
        Some(notice.notice_type().slug()),
        notice.newspaper.as_deref(),
    ];

    fields
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    PublishAt,
    CreatedAt,
    Price,
}

impl SortField {
    /// Resolve a caller-supplied field name against the allow-list.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "publishAt" | "publish_at" => Some(Self::PublishAt),
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "price" => Some(Self::Price),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Self::Ascending,
            _ => Self::Descending,
        }
    }
}

/// Primary key plus a descending tie-break on the record identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl NoticeSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn newest_first() -> Self {
        Self::new(SortField::CreatedAt, SortDirection::Descending)
    }

    pub fn compare(&self, left: &Notice, right: &Notice) -> Ordering {
        // Missing schedules order before any date, as a document store orders nulls.
        let primary = match self.field {
            SortField::PublishAt => left.publish_at.cmp(&right.publish_at),
            SortField::CreatedAt => left.created_at.cmp(&right.created_at),
            SortField::Price => left.price.cmp(&right.price),
        };
        let primary = match self.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| right.id.cmp(&left.id))
    }
}

impl Default for NoticeSort {
    fn default() -> Self {
        Self::new(SortField::PublishAt, SortDirection::Descending)
    }
}

/// Validated 1-indexed page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(page: usize, page_size: usize, max_page_size: usize) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage);
        }
        if page_size == 0 || page_size > max_page_size {
            return Err(ValidationError::InvalidPageSize {
                max: max_page_size,
                found: page_size,
            });
        }
        Ok(Self { page, page_size })
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of results as handed back to callers.
#[derive(Debug, Clone, Serialize)]
pub struct NoticePage<T> {
    pub data: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

impl<T> NoticePage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> NoticePage<U> {
        NoticePage {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}
