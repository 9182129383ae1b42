use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::access::{require_moderator, AccessError, CallerIdentity};
use super::clock::Clock;
use super::domain::{Notice, NoticeStatus};
use super::intake::ValidationError;
use super::lifecycle::NoticeError;
use super::repository::{
    NoticeFilter, NoticePage, NoticeRepository, NoticeSort, Pagination, SortDirection, SortField,
};

/// Narrowing applied to the public audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicScope {
    /// Scheduled date has arrived.
    Published,
    /// Approved and paid, past or future date.
    #[default]
    Confirmed,
}

impl PublicScope {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "published" => Ok(Self::Published),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(ValidationError::Unrecognized {
                field: "scope",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Owner,
    Moderator,
    Public(PublicScope),
}

impl Audience {
    fn default_sort_field(self) -> SortField {
        match self {
            Audience::Public(_) => SortField::PublishAt,
            Audience::Owner | Audience::Moderator => SortField::CreatedAt,
        }
    }
}

/// Caller-controlled part of a query. The audience predicate is layered on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub filter: NoticeFilter,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl QueryRequest {
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            filter: NoticeFilter::default(),
            sort_by: None,
            order: None,
            page,
            page_size,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.filter.search = Some(term.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self.order = Some(order.into());
        self
    }
}

/// Answers which notices are visible, in what order, to whom.
///
/// Visibility is evaluated against the clock at query time; nothing flips a
/// notice to "published" in the background.
pub struct PublicationQueryEngine<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    max_page_size: usize,
}

impl<R> PublicationQueryEngine<R>
where
    R: NoticeRepository + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>, max_page_size: usize) -> Self {
        Self {
            repository,
            clock,
            max_page_size,
        }
    }

    pub fn query(
        &self,
        caller: Option<&CallerIdentity>,
        audience: Audience,
        request: QueryRequest,
    ) -> Result<NoticePage<Notice>, NoticeError> {
        let QueryRequest {
            filter,
            sort_by,
            order,
            page,
            page_size,
        } = request;

        let window = Pagination::new(page, page_size, self.max_page_size)?;
        let filter = self.scoped_filter(caller, audience, filter)?;
        let sort = resolve_sort(audience, sort_by.as_deref(), order.as_deref());

        let result = self
            .repository
            .query(&filter, &sort, window.skip(), window.page_size)?;

        Ok(NoticePage {
            data: result.items,
            page: window.page,
            limit: window.page_size,
            total: result.total,
        })
    }

    /// Base predicate for the audience; always overrides caller-supplied fields.
    fn scoped_filter(
        &self,
        caller: Option<&CallerIdentity>,
        audience: Audience,
        mut filter: NoticeFilter,
    ) -> Result<NoticeFilter, NoticeError> {
        match audience {
            Audience::Owner => {
                let caller = caller.ok_or(AccessError::Unauthenticated)?;
                filter.owner = Some(caller.user_id.clone());
            }
            Audience::Moderator => {
                let caller = caller.ok_or(AccessError::Unauthenticated)?;
                require_moderator(caller)?;
            }
            Audience::Public(scope) => {
                filter.owner = None;
                filter.status = Some(NoticeStatus::Approved);
                filter.paid = Some(true);
                filter.published_as_of = match scope {
                    PublicScope::Published => Some(self.clock.now()),
                    PublicScope::Confirmed => None,
                };
            }
        }

        filter.search = filter
            .search
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        Ok(filter)
    }
}

/// Unknown fields fall back to `publishAt`; a missing field uses the audience default.
fn resolve_sort(audience: Audience, sort_by: Option<&str>, order: Option<&str>) -> NoticeSort {
    let field = match sort_by {
        Some(requested) => SortField::parse(requested).unwrap_or(SortField::PublishAt),
        None => audience.default_sort_field(),
    };
    let direction = order.map(SortDirection::parse).unwrap_or_default();
    NoticeSort::new(field, direction)
}
