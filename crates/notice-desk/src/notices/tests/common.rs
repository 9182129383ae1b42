use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::notices::access::CallerIdentity;
use crate::notices::clock::ManualClock;
use crate::notices::domain::{
    ModerationDecision, Notice, NoticeDetails, NoticeId, NoticePatch, NoticeStatus,
    NoticeSubmission, OwnerId, ReferenceId,
};
use crate::notices::lifecycle::NoticeLifecycle;
use crate::notices::memory::InMemoryNoticeRepository;
use crate::notices::policy::PublicationPolicy;
use crate::notices::query::PublicationQueryEngine;
use crate::notices::reference::{ReferenceAllocator, ScriptedReferenceGenerator};
use crate::notices::repository::{
    NoticeFilter, NoticeRepository, NoticeSort, QueryResult, RepositoryError,
};
use crate::notices::router::{NoticeApi, CALLER_ID_HEADER, CALLER_ROLE_HEADER};

pub(crate) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// Pending change-of-name notice with a caller-chosen reference.
pub(crate) fn stored_notice(reference: &str, owner: &str) -> Notice {
    let details = NoticeDetails::ChangeOfName {
        old_name: "Jane Doe".to_string(),
        new_name: "Jane Smith".to_string(),
    };
    Notice {
        id: NoticeId::new(),
        reference_id: ReferenceId(reference.to_string()),
        owner_id: OwnerId(owner.to_string()),
        content: details.render_content(),
        details,
        status: NoticeStatus::Pending,
        paid: false,
        publish_at: None,
        price: 15_000,
        newspaper: Some("Punch".to_string()),
        created_at: start(),
        updated_at: start(),
    }
}

pub(crate) fn moderator() -> CallerIdentity {
    CallerIdentity::moderator("moderator-1")
}

pub(crate) fn owner(id: &str) -> CallerIdentity {
    CallerIdentity::owner(id)
}

pub(crate) fn change_of_name(old_name: &str, new_name: &str) -> NoticeSubmission {
    NoticeSubmission {
        details: NoticeDetails::ChangeOfName {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        },
        price: None,
        newspaper: Some("Punch".to_string()),
    }
}

pub(crate) fn lost_document(doc_type: &str) -> NoticeSubmission {
    NoticeSubmission {
        details: NoticeDetails::LostDocument {
            doc_type: doc_type.to_string(),
            description: "Misplaced along Herbert Macaulay Way on Friday".to_string(),
        },
        price: None,
        newspaper: None,
    }
}

pub(crate) fn court_affidavit(full_name: &str) -> NoticeSubmission {
    NoticeSubmission {
        details: NoticeDetails::CourtAffidavit {
            full_name: full_name.to_string(),
            purpose: "correct the date of birth on record".to_string(),
        },
        price: Some(9_000),
        newspaper: Some("Vanguard".to_string()),
    }
}

pub(crate) struct Harness {
    pub(crate) repository: Arc<InMemoryNoticeRepository>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) lifecycle: NoticeLifecycle<InMemoryNoticeRepository>,
    pub(crate) engine: PublicationQueryEngine<InMemoryNoticeRepository>,
}

impl Harness {
    /// Submit, then optionally approve and pay, returning the stored notice.
    pub(crate) fn seed(
        &self,
        owner_id: &str,
        submission: NoticeSubmission,
        approve: bool,
        pay: bool,
    ) -> Notice {
        let notice = self
            .lifecycle
            .submit(OwnerId(owner_id.to_string()), submission)
            .expect("submission accepted");
        if approve {
            self.lifecycle
                .moderate(&moderator(), &notice.id, ModerationDecision::Approve)
                .expect("approval succeeds");
        }
        if pay {
            self.lifecycle
                .confirm_payment(&notice.reference_id)
                .expect("payment succeeds");
        }
        self.lifecycle.get(&notice.id).expect("notice stored")
    }
}

pub(crate) fn harness() -> Harness {
    harness_with_allocator(ReferenceAllocator::random())
}

pub(crate) fn harness_with_references(references: &[&str]) -> Harness {
    let generator = ScriptedReferenceGenerator::new(references.iter().copied());
    harness_with_allocator(ReferenceAllocator::new(Box::new(generator)))
}

fn harness_with_allocator(allocator: ReferenceAllocator) -> Harness {
    let repository = Arc::new(InMemoryNoticeRepository::default());
    let clock = Arc::new(ManualClock::new(start()));
    let policy = PublicationPolicy::default();
    let engine =
        PublicationQueryEngine::new(repository.clone(), clock.clone(), policy.max_page_size);
    let lifecycle =
        NoticeLifecycle::with_parts(repository.clone(), allocator, clock.clone(), policy);

    Harness {
        repository,
        clock,
        lifecycle,
        engine,
    }
}

pub(crate) fn build_lifecycle() -> (NoticeLifecycle<InMemoryNoticeRepository>, Arc<ManualClock>) {
    let Harness {
        lifecycle, clock, ..
    } = harness();
    (lifecycle, clock)
}

pub(crate) fn build_api(
    webhook_token: Option<&str>,
) -> (Arc<NoticeApi<InMemoryNoticeRepository>>, Arc<ManualClock>) {
    let Harness {
        lifecycle,
        engine,
        clock,
        ..
    } = harness();
    let api = NoticeApi::new(lifecycle, engine).with_webhook_token(webhook_token.map(str::to_string));
    (Arc::new(api), clock)
}

/// Request carrying the caller identity headers.
pub(crate) fn request_as(
    caller: &CallerIdentity,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CALLER_ID_HEADER, caller.user_id.0.as_str())
        .header(CALLER_ROLE_HEADER, caller.role.as_str());
    with_body(builder, body)
}

pub(crate) fn anonymous_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    with_body(Request::builder().method(method).uri(uri), body)
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}

pub(crate) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}

/// Every insert collides, as if another writer always wins the reference.
pub(crate) struct ConflictRepository;

impl NoticeRepository for ConflictRepository {
    fn exists(&self, _reference: &ReferenceId) -> Result<bool, RepositoryError> {
        Ok(false)
    }

    fn insert(&self, notice: Notice) -> Result<NoticeId, RepositoryError> {
        Err(RepositoryError::DuplicateReference(notice.reference_id))
    }

    fn find_by_id(&self, _id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        Ok(None)
    }

    fn find_by_reference(
        &self,
        _reference: &ReferenceId,
    ) -> Result<Option<Notice>, RepositoryError> {
        Ok(None)
    }

    fn update(&self, _id: &NoticeId, _patch: &NoticePatch) -> Result<Notice, RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn query(
        &self,
        _filter: &NoticeFilter,
        _sort: &NoticeSort,
        _skip: usize,
        _limit: usize,
    ) -> Result<QueryResult, RepositoryError> {
        Ok(QueryResult::default())
    }

    fn count(&self, _filter: &NoticeFilter) -> Result<usize, RepositoryError> {
        Ok(0)
    }
}

pub(crate) struct UnavailableRepository;

impl UnavailableRepository {
    fn down<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl NoticeRepository for UnavailableRepository {
    fn exists(&self, _reference: &ReferenceId) -> Result<bool, RepositoryError> {
        Self::down()
    }

    fn insert(&self, _notice: Notice) -> Result<NoticeId, RepositoryError> {
        Self::down()
    }

    fn find_by_id(&self, _id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        Self::down()
    }

    fn find_by_reference(
        &self,
        _reference: &ReferenceId,
    ) -> Result<Option<Notice>, RepositoryError> {
        Self::down()
    }

    fn update(&self, _id: &NoticeId, _patch: &NoticePatch) -> Result<Notice, RepositoryError> {
        Self::down()
    }

    fn query(
        &self,
        _filter: &NoticeFilter,
        _sort: &NoticeSort,
        _skip: usize,
        _limit: usize,
    ) -> Result<QueryResult, RepositoryError> {
        Self::down()
    }

    fn count(&self, _filter: &NoticeFilter) -> Result<usize, RepositoryError> {
        Self::down()
    }
}
