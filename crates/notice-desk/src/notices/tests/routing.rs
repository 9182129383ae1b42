use super::common::*;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::notices::lifecycle::NoticeLifecycle;
use crate::notices::policy::PublicationPolicy;
use crate::notices::query::PublicationQueryEngine;
use crate::notices::router::{
    caller_from_headers, notice_router, submit_handler, NoticeApi, CALLER_ID_HEADER,
    CALLER_ROLE_HEADER, WEBHOOK_TOKEN_HEADER,
};
use crate::notices::{AccessError, Role, SystemClock};

fn change_of_name_body() -> Value {
    json!({
        "details": {
            "type": "change-of-name",
            "old_name": "Jane Doe",
            "new_name": "Jane Smith"
        },
        "newspaper": "Punch"
    })
}

fn as_datetime(value: &Value) -> DateTime<Utc> {
    serde_json::from_value(value.clone()).expect("timestamp")
}

async fn submit_as(
    router: axum::Router,
    owner_id: &str,
    body: Value,
) -> Value {
    let response = router
        .oneshot(request_as(&owner(owner_id), "POST", "/api/v1/notices", Some(body)))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::CREATED);
    read_json_body(response).await
}

#[tokio::test]
async fn submit_returns_created_with_reference() {
    let (api, _clock) = build_api(None);
    let body = submit_as(notice_router(api), "owner-1", change_of_name_body()).await;

    assert!(body["reference_id"]
        .as_str()
        .expect("reference present")
        .starts_with("REF-"));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["paid"], false);
    assert_eq!(body["owner_id"], "owner-1");
    assert_eq!(body["price"], 15_000);
    assert!(body["publish_at"].is_null());
}

#[tokio::test]
async fn submit_without_identity_is_unauthorized() {
    let (api, _clock) = build_api(None);
    let response = notice_router(api)
        .oneshot(anonymous_request(
            "POST",
            "/api/v1/notices",
            Some(change_of_name_body()),
        ))
        .await
        .expect("router responds");

    assert_status(&response, StatusCode::UNAUTHORIZED);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn submit_rejects_unknown_fields_and_short_text() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);

    let mut extra = change_of_name_body();
    extra["status"] = json!("approved");
    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "POST", "/api/v1/notices", Some(extra)))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let short = json!({
        "details": {
            "type": "lost-document",
            "doc_type": "Passport",
            "description": "gone"
        }
    });
    let response = router
        .oneshot(request_as(&owner("owner-1"), "POST", "/api/v1/notices", Some(short)))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("description"));
}

#[tokio::test]
async fn submit_rejects_unknown_fields_inside_details() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);

    let mut body = change_of_name_body();
    body["details"]["status"] = json!("approved");
    body["details"]["paid"] = json!(true);
    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "POST", "/api/v1/notices", Some(body)))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(request_as(&moderator(), "GET", "/api/v1/notices/stats", None))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(response).await["total"], 0);
}

#[tokio::test]
async fn submit_handler_maps_exhausted_allocation_to_unavailable() {
    let repository = Arc::new(ConflictRepository);
    let api = Arc::new(NoticeApi::new(
        NoticeLifecycle::new(repository.clone(), PublicationPolicy::default()),
        PublicationQueryEngine::new(repository, Arc::new(SystemClock), 100),
    ));

    let response = submit_handler::<ConflictRepository>(
        State(api),
        owner_headers("owner-1"),
        axum::Json(change_of_name("Jane Doe", "Jane Smith")),
    )
    .await
    .into_response();

    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn submit_handler_maps_storage_failure_to_internal_error() {
    let repository = Arc::new(UnavailableRepository);
    let api = Arc::new(NoticeApi::new(
        NoticeLifecycle::new(repository.clone(), PublicationPolicy::default()),
        PublicationQueryEngine::new(repository, Arc::new(SystemClock), 100),
    ));

    let response = submit_handler::<UnavailableRepository>(
        State(api),
        owner_headers("owner-1"),
        axum::Json(lost_document("Passport")),
    )
    .await
    .into_response();

    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
}

fn owner_headers(owner_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CALLER_ID_HEADER, owner_id.parse().expect("header value"));
    headers
}

#[tokio::test]
async fn moderation_requires_moderator_role() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);
    let created = submit_as(router.clone(), "owner-1", change_of_name_body()).await;
    let id = created["id"].as_str().expect("id").to_string();
    let uri = format!("/api/v1/notices/{id}/approve");

    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "PUT", &uri, None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request_as(&moderator(), "PUT", &uri, None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Notice approved");
    assert_eq!(body["notice"]["status"], "approved");
    assert_eq!(
        as_datetime(&body["notice"]["publish_at"]),
        start() + Duration::days(5)
    );
}

#[tokio::test]
async fn conflicting_decision_is_unprocessable() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);
    let created = submit_as(router.clone(), "owner-1", change_of_name_body()).await;
    let id = created["id"].as_str().expect("id").to_string();

    let response = router
        .clone()
        .oneshot(request_as(
            &moderator(),
            "PUT",
            &format!("/api/v1/notices/{id}/reject"),
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);

    let response = router
        .oneshot(request_as(
            &moderator(),
            "PUT",
            &format!("/api/v1/notices/{id}/approve"),
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn moderation_reports_bad_and_unknown_ids() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);

    let response = router
        .clone()
        .oneshot(request_as(
            &moderator(),
            "PUT",
            "/api/v1/notices/not-a-uuid/approve",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(request_as(
            &moderator(),
            "PUT",
            &format!("/api/v1/notices/{}/approve", uuid::Uuid::new_v4()),
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_webhook_checks_shared_token() {
    let (api, _clock) = build_api(Some("hook-secret"));
    let router = notice_router(api);
    let created = submit_as(router.clone(), "owner-1", change_of_name_body()).await;
    let payload = json!({ "reference_id": created["reference_id"], "transaction_ref": "TX-1" });

    let response = router
        .clone()
        .oneshot(anonymous_request(
            "POST",
            "/api/v1/payments/confirmed",
            Some(payload.clone()),
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::FORBIDDEN);

    let mut wrong = anonymous_request("POST", "/api/v1/payments/confirmed", Some(payload.clone()));
    wrong
        .headers_mut()
        .insert(WEBHOOK_TOKEN_HEADER, "guess".parse().expect("header value"));
    let response = router.clone().oneshot(wrong).await.expect("router responds");
    assert_status(&response, StatusCode::FORBIDDEN);

    let mut signed = anonymous_request("POST", "/api/v1/payments/confirmed", Some(payload));
    signed
        .headers_mut()
        .insert(WEBHOOK_TOKEN_HEADER, "hook-secret".parse().expect("header value"));
    let response = router.oneshot(signed).await.expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["changed"], true);
    assert_eq!(body["notice"]["paid"], true);
    assert!(body["notice"].get("owner_id").is_none());
}

#[tokio::test]
async fn payment_for_unknown_reference_is_not_found() {
    let (api, _clock) = build_api(None);
    let response = notice_router(api)
        .oneshot(anonymous_request(
            "POST",
            "/api/v1/payments/confirmed",
            Some(json!({ "reference_id": "REF-ZZZZ9999" })),
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn published_listing_hides_owner_and_respects_scope() {
    let (api, clock) = build_api(None);
    let created = api
        .lifecycle
        .submit(
            crate::notices::OwnerId("owner-1".to_string()),
            change_of_name("Jane Doe", "Jane Smith"),
        )
        .expect("submitted");
    api.lifecycle
        .moderate(
            &moderator(),
            &created.id,
            crate::notices::ModerationDecision::Approve,
        )
        .expect("approved");
    api.lifecycle
        .confirm_payment(&created.reference_id)
        .expect("paid");
    let router = notice_router(api);

    let response = router
        .clone()
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/published?search=smith",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 30);
    assert_eq!(body["data"][0]["reference_id"], created.reference_id.as_str());
    assert!(body["data"][0].get("owner_id").is_none());
    assert!(body["data"][0].get("id").is_none());

    let response = router
        .clone()
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/published?scope=published",
            None,
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(response).await["total"], 0);

    clock.advance(Duration::days(5));
    let response = router
        .clone()
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/published?scope=published",
            None,
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(response).await["total"], 1);

    let response = router
        .clone()
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/published?scope=someday",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/published?limit=1000",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn owner_listing_and_status_lookup() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);
    let created = submit_as(router.clone(), "owner-1", change_of_name_body()).await;
    submit_as(router.clone(), "owner-2", change_of_name_body()).await;

    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "GET", "/api/v1/notices/mine", None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["data"][0]["owner_id"], "owner-1");

    let response = router
        .clone()
        .oneshot(request_as(
            &owner("owner-1"),
            "GET",
            "/api/v1/notices/mine?search=nobody",
            None,
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(response).await["total"], 0);

    let reference = created["reference_id"].as_str().expect("reference");
    let response = router
        .clone()
        .oneshot(anonymous_request(
            "GET",
            &format!("/api/v1/notices/status/{reference}"),
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["notice_type"], "change-of-name");

    let response = router
        .oneshot(anonymous_request(
            "GET",
            "/api/v1/notices/status/REF-NOPE0000",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moderator_listing_filters_and_validates() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);
    submit_as(router.clone(), "owner-1", change_of_name_body()).await;

    let response = router
        .clone()
        .oneshot(request_as(
            &moderator(),
            "GET",
            "/api/v1/notices?status=pending&type=change-of-name",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 50);

    let response = router
        .clone()
        .oneshot(request_as(
            &moderator(),
            "GET",
            "/api/v1/notices?status=archived",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "GET", "/api/v1/notices", None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request_as(&moderator(), "GET", "/api/v1/notices/stats", None))
        .await
        .expect("router responds");
    let body = read_json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["pending"], 1);
}

#[tokio::test]
async fn listings_reject_non_positive_and_malformed_paging() {
    let (api, _clock) = build_api(None);
    let router = notice_router(api);

    let cases = [
        ("/api/v1/notices/published?page=-1", None, "page"),
        ("/api/v1/notices/published?limit=-5", None, "limit"),
        ("/api/v1/notices/mine?page=-1", Some(owner("owner-1")), "page"),
        ("/api/v1/notices/mine?limit=-5", Some(owner("owner-1")), "limit"),
        ("/api/v1/notices?page=-1", Some(moderator()), "page"),
        ("/api/v1/notices?limit=-5", Some(moderator()), "limit"),
        ("/api/v1/notices/published?page=0", None, "page"),
        ("/api/v1/notices/published?page=first", None, "query"),
        ("/api/v1/notices?paid=maybe", Some(moderator()), "query"),
    ];

    for (uri, caller, field) in cases {
        let request = match &caller {
            Some(identity) => request_as(identity, "GET", uri, None),
            None => anonymous_request("GET", uri, None),
        };
        let response = router.clone().oneshot(request).await.expect("router responds");
        assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json_body(response).await;
        let message = body["error"].as_str().expect("json error body");
        assert!(message.contains(field), "{uri}: unexpected message {message}");
    }
}

#[tokio::test]
async fn manual_payment_converges_with_webhook() {
    let (api, clock) = build_api(None);
    let router = notice_router(api);
    let created = submit_as(router.clone(), "owner-1", change_of_name_body()).await;
    let reference = created["reference_id"].as_str().expect("reference").to_string();
    let mark_paid = format!("/api/v1/notices/mark-paid/{reference}");

    let response = router
        .clone()
        .oneshot(request_as(&owner("owner-1"), "PATCH", &mark_paid, None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(anonymous_request(
            "POST",
            "/api/v1/payments/confirmed",
            Some(json!({ "reference_id": reference })),
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let webhook = read_json_body(response).await;
    let scheduled = as_datetime(&webhook["notice"]["publish_at"]);

    clock.advance(Duration::days(1));
    let response = router
        .clone()
        .oneshot(request_as(&moderator(), "PATCH", &mark_paid, None))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::OK);
    let manual = read_json_body(response).await;
    assert_eq!(manual["changed"], false);
    assert_eq!(manual["notice"]["paid"], true);
    assert_eq!(manual["notice"]["status"], "pending");
    assert_eq!(as_datetime(&manual["notice"]["publish_at"]), scheduled);

    let response = router
        .oneshot(request_as(
            &moderator(),
            "PATCH",
            "/api/v1/notices/mark-paid/REF-NOPE0000",
            None,
        ))
        .await
        .expect("router responds");
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[test]
fn caller_headers_are_parsed_and_validated() {
    let mut headers = HeaderMap::new();
    assert_eq!(caller_from_headers(&headers), Ok(None));

    headers.insert(CALLER_ID_HEADER, " admin-7 ".parse().expect("header value"));
    headers.insert(CALLER_ROLE_HEADER, "admin".parse().expect("header value"));
    let caller = caller_from_headers(&headers)
        .expect("valid headers")
        .expect("identity present");
    assert_eq!(caller.user_id.0, "admin-7");
    assert_eq!(caller.role, Role::Moderator);

    headers.insert(CALLER_ROLE_HEADER, "superuser".parse().expect("header value"));
    assert!(matches!(
        caller_from_headers(&headers),
        Err(AccessError::Malformed(_))
    ));
}
