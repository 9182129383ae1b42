use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::access::{AccessError, CallerIdentity, Role};
use super::domain::{
    ModerationDecision, NoticeId, NoticeStatus, NoticeSubmission, NoticeType, OwnerId,
    PaymentConfirmed, PublicNoticeView, ReferenceId,
};
use super::intake::ValidationError;
use super::lifecycle::{NoticeError, NoticeLifecycle};
use super::query::{Audience, PublicScope, PublicationQueryEngine, QueryRequest};
use super::repository::{NoticeFilter, NoticeRepository, RepositoryError};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

const OWNER_PAGE_SIZE: usize = 20;
const MODERATOR_PAGE_SIZE: usize = 50;
const PUBLIC_PAGE_SIZE: usize = 30;

/// Shared state behind the notice endpoints.
pub struct NoticeApi<R> {
    pub lifecycle: NoticeLifecycle<R>,
    pub queries: PublicationQueryEngine<R>,
    webhook_token: Option<String>,
}

impl<R> NoticeApi<R>
where
    R: NoticeRepository + 'static,
{
    pub fn new(lifecycle: NoticeLifecycle<R>, queries: PublicationQueryEngine<R>) -> Self {
        Self {
            lifecycle,
            queries,
            webhook_token: None,
        }
    }

    pub fn with_webhook_token(mut self, token: Option<String>) -> Self {
        self.webhook_token = token.filter(|value| !value.is_empty());
        self
    }

    fn verify_webhook(&self, headers: &HeaderMap) -> Result<(), AccessError> {
        let Some(expected) = self.webhook_token.as_deref() else {
            return Ok(());
        };
        let provided = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AccessError::Malformed("webhook token missing".to_string()))?;

        if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(AccessError::Malformed("webhook token mismatch".to_string()))
        }
    }
}

/// Router builder exposing submission, moderation, payment, and listing endpoints.
pub fn notice_router<R>(api: Arc<NoticeApi<R>>) -> Router
where
    R: NoticeRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/notices",
            post(submit_handler::<R>).get(moderator_list_handler::<R>),
        )
        .route("/api/v1/notices/mine", get(owner_list_handler::<R>))
        .route("/api/v1/notices/published", get(published_handler::<R>))
        .route("/api/v1/notices/stats", get(stats_handler::<R>))
        .route(
            "/api/v1/notices/status/:reference",
            get(status_handler::<R>),
        )
        .route(
            "/api/v1/notices/mark-paid/:reference",
            patch(mark_paid_handler::<R>),
        )
        .route("/api/v1/notices/:id/approve", put(approve_handler::<R>))
        .route("/api/v1/notices/:id/reject", put(reject_handler::<R>))
        .route("/api/v1/payments/confirmed", post(payment_handler::<R>))
        .with_state(api)
}

/// Identity asserted by the upstream access layer. No id header means anonymous.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Option<CallerIdentity>, AccessError> {
    let Some(raw_id) = headers.get(CALLER_ID_HEADER) else {
        return Ok(None);
    };
    let user_id = raw_id
        .to_str()
        .map_err(|_| AccessError::Malformed("caller id is not valid text".to_string()))?
        .trim();
    if user_id.is_empty() {
        return Err(AccessError::Malformed("caller id is blank".to_string()));
    }

    let role = match headers.get(CALLER_ROLE_HEADER) {
        Some(raw_role) => {
            let label = raw_role
                .to_str()
                .map_err(|_| AccessError::Malformed("caller role is not valid text".to_string()))?;
            Role::parse(label)
                .ok_or_else(|| AccessError::Malformed(format!("unknown role '{label}'")))?
        }
        None => Role::Owner,
    };

    Ok(Some(CallerIdentity {
        user_id: OwnerId(user_id.to_string()),
        role,
    }))
}

fn require_caller(headers: &HeaderMap) -> Result<CallerIdentity, NoticeError> {
    caller_from_headers(headers)?.ok_or_else(|| AccessError::Unauthenticated.into())
}

/// Query-string parameters shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub paid: Option<bool>,
    #[serde(rename = "type")]
    pub notice_type: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub scope: Option<String>,
}

impl ListParams {
    /// Unwraps the extractor result so malformed query strings surface as
    /// validation errors with the usual JSON body.
    fn extract(params: Result<Query<Self>, QueryRejection>) -> Result<Self, ValidationError> {
        params
            .map(|Query(params)| params)
            .map_err(|rejection| ValidationError::MalformedQuery(rejection.body_text()))
    }

    fn into_request(self, default_page_size: usize) -> Result<QueryRequest, ValidationError> {
        let status = self
            .status
            .map(|label| {
                NoticeStatus::from_label(&label).ok_or(ValidationError::Unrecognized {
                    field: "status",
                    value: label,
                })
            })
            .transpose()?;
        let notice_type = self
            .notice_type
            .map(|slug| {
                NoticeType::from_slug(&slug).ok_or(ValidationError::Unrecognized {
                    field: "type",
                    value: slug,
                })
            })
            .transpose()?;

        Ok(QueryRequest {
            filter: NoticeFilter {
                status,
                paid: self.paid,
                notice_type,
                search: self.search,
                ..NoticeFilter::default()
            },
            sort_by: self.sort_by,
            order: self.order,
            page: positive("page", self.page, 1)?,
            page_size: positive("limit", self.limit, default_page_size)?,
        })
    }
}

fn positive(
    field: &'static str,
    value: Option<i64>,
    default: usize,
) -> Result<usize, ValidationError> {
    match value {
        None => Ok(default),
        Some(found) if found < 1 => Err(ValidationError::NotPositive { field, found }),
        Some(found) => Ok(usize::try_from(found).unwrap_or(usize::MAX)),
    }
}

pub(crate) async fn submit_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    Json(submission): Json<NoticeSubmission>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let caller = require_caller(&headers)?;
    let notice = api.lifecycle.submit(caller.user_id, submission)?;
    Ok((StatusCode::CREATED, Json(notice)).into_response())
}

pub(crate) async fn owner_list_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let caller = require_caller(&headers)?;
    let request = ListParams::extract(params)?.into_request(OWNER_PAGE_SIZE)?;
    let page = api.queries.query(Some(&caller), Audience::Owner, request)?;
    Ok(Json(page).into_response())
}

pub(crate) async fn moderator_list_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let caller = require_caller(&headers)?;
    let request = ListParams::extract(params)?.into_request(MODERATOR_PAGE_SIZE)?;
    let page = api
        .queries
        .query(Some(&caller), Audience::Moderator, request)?;
    Ok(Json(page).into_response())
}

pub(crate) async fn published_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let mut params = ListParams::extract(params)?;
    let scope = params
        .scope
        .take()
        .map(|value| PublicScope::parse(&value))
        .transpose()?
        .unwrap_or_default();
    let request = params.into_request(PUBLIC_PAGE_SIZE)?;
    let page = api.queries.query(None, Audience::Public(scope), request)?;
    let page = page.map(|notice| notice.public_view());
    Ok(Json(page).into_response())
}

pub(crate) async fn status_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    Path(reference): Path<String>,
) -> Result<Json<PublicNoticeView>, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let notice = api.lifecycle.get_by_reference(&ReferenceId(reference))?;
    Ok(Json(notice.public_view()))
}

pub(crate) async fn stats_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let stats = api.lifecycle.stats()?;
    Ok(Json(stats).into_response())
}

pub(crate) async fn approve_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    moderate(&api, &headers, &id, ModerationDecision::Approve)
}

pub(crate) async fn reject_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    moderate(&api, &headers, &id, ModerationDecision::Reject)
}

fn moderate<R>(
    api: &NoticeApi<R>,
    headers: &HeaderMap,
    raw_id: &str,
    decision: ModerationDecision,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let caller = require_caller(headers)?;
    let id = Uuid::parse_str(raw_id.trim())
        .map(NoticeId)
        .map_err(|_| ValidationError::Unrecognized {
            field: "id",
            value: raw_id.to_string(),
        })?;

    let notice = api.lifecycle.moderate(&caller, &id, decision)?;
    let message = match decision {
        ModerationDecision::Approve => "Notice approved",
        ModerationDecision::Reject => "Notice rejected",
    };
    Ok(Json(json!({ "message": message, "notice": notice })).into_response())
}

pub(crate) async fn payment_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    Json(event): Json<PaymentConfirmed>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    api.verify_webhook(&headers)?;
    let outcome = api.lifecycle.confirm_payment(&event.reference_id)?;
    if let Some(transaction) = event.transaction_ref.as_deref() {
        tracing::debug!(reference = %event.reference_id, transaction, "payment event received");
    }

    Ok(Json(json!({
        "success": true,
        "changed": outcome.changed,
        "notice": outcome.notice.public_view(),
    }))
    .into_response())
}

pub(crate) async fn mark_paid_handler<R>(
    State(api): State<Arc<NoticeApi<R>>>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Response, NoticeError>
where
    R: NoticeRepository + 'static,
{
    let caller = require_caller(&headers)?;
    let outcome = api.lifecycle.mark_paid(&caller, &ReferenceId(reference))?;
    Ok(Json(json!({
        "message": "Notice marked as paid",
        "changed": outcome.changed,
        "notice": outcome.notice,
    }))
    .into_response())
}

impl IntoResponse for NoticeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NoticeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NoticeError::Authorization(AccessError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            NoticeError::Authorization(_) => StatusCode::FORBIDDEN,
            NoticeError::NotFound(_) => StatusCode::NOT_FOUND,
            NoticeError::AllocationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            NoticeError::Storage(
                RepositoryError::DuplicateReference(_) | RepositoryError::DuplicateId(_),
            ) => StatusCode::CONFLICT,
            NoticeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "notice request failed");
        }

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
