// Integration tests for RequestExecutor against a mock backend.

use crate::helpers::{
    NEW_ACCESS, NEW_REFRESH, OLD_ACCESS, OLD_REFRESH, REFRESH_PATH, bearer, executor_for, executor_with_config,
    expired, mount_refresh, signed_in_store,
};

use ledger_core::auth::{LogoutReason, MemoryTokenStore, SessionState, TokenPair, TokenStore};
use ledger_core::config::ApiConfig;
use ledger_core::error::ErrorKind;
use ledger_core::http::{Payload, RequestDescriptor};

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: The end-to-end refresh path for an ordinary screen load.
///
/// **WHY THIS MATTERS**: This is what every screen does after the access
/// token lapses. The caller must get the 200 payload without ever seeing
/// the 401, and later calls must use the new pair.
#[tokio::test]
async fn given_expired_token_when_get_accounts_then_refreshes_replays_and_returns_payload() {
    // GIVEN: a backend that rejects the old token and accepts the new one
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1", "name": "Cash" }])))
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    // WHEN
    let payload = executor.call(&RequestDescriptor::get("/accounts")).await.unwrap();

    // THEN
    assert_eq!(payload, Payload::Json(json!([{ "id": "1", "name": "Cash" }])));
    assert_eq!(store.get(), Some(TokenPair::new(NEW_ACCESS, NEW_REFRESH)));
    assert_eq!(executor.session().state(), SessionState::LoggedIn);
}

/// **VALUE**: A replay that is still "expired" ends the call.
///
/// **BUG THIS CATCHES**: An unbounded refresh/replay loop when the backend
/// clock is skewed and rejects every freshly minted token.
#[tokio::test]
async fn given_replay_also_expired_when_called_then_fails_after_exactly_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(expired())
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;
    let executor = executor_for(&server, signed_in_store());

    let error = executor.call(&RequestDescriptor::get("projects")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthExpired);
    assert_eq!(error.status_code(), Some(401));
}

#[tokio::test]
async fn given_forbidden_response_when_called_then_surfaces_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/9"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Only administrators can delete users",
            "code": "TOKEN_EXPIRED"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 0).await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    let error = executor.call(&RequestDescriptor::delete("users/9")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthForbidden);
    assert_eq!(error.message, "Only administrators can delete users");
    assert_eq!(store.get(), Some(TokenPair::new(OLD_ACCESS, OLD_REFRESH)), "403 keeps the session");
}

#[tokio::test]
async fn given_validation_failure_when_posting_then_details_reach_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tax-codes"))
        .and(body_json(json!({ "code": "", "rate": -1 })))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Invalid tax code",
            "code": "VALIDATION_FAILED",
            "details": { "code": "required", "rate": "must be >= 0" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());

    let error = executor
        .call(&RequestDescriptor::post("tax-codes", json!({ "code": "", "rate": -1 })))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.code.as_deref(), Some("VALIDATION_FAILED"));
    assert_eq!(error.details, Some(json!({ "code": "required", "rate": "must be >= 0" })));
}

/// **VALUE**: No token means no request at all.
#[tokio::test]
async fn given_no_token_when_authenticated_call_then_auth_invalid_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let executor = executor_for(&server, Arc::new(MemoryTokenStore::new()));

    let error = executor.call(&RequestDescriptor::get("payments")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthInvalid);
}

#[tokio::test]
async fn given_public_descriptor_when_called_then_no_authorization_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, Arc::new(MemoryTokenStore::new()));

    executor.call(&RequestDescriptor::get("health").public()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

/// **VALUE**: A plain 401 ends the session instead of refreshing.
///
/// **WHY THIS MATTERS**: A revoked user must be sent back to the login
/// screen. Refreshing would just fail again with a second request.
#[tokio::test]
async fn given_plain_unauthorized_when_called_then_no_refresh_and_session_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "User disabled" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 0).await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());
    let states = executor.session().subscribe();

    let error = executor.call(&RequestDescriptor::get("categories")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthInvalid);
    assert!(store.get().is_none());
    assert_eq!(
        *states.borrow(),
        SessionState::LoggedOut {
            reason: LogoutReason::Unauthorized
        }
    );
}

/// **VALUE**: A rejected refresh token clears the session and fails the call.
#[tokio::test]
async fn given_refresh_rejected_when_called_then_auth_invalid_and_tokens_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Refresh token revoked",
            "code": "INVALID_TOKEN"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    let error = executor.call(&RequestDescriptor::get("accounts")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthInvalid);
    assert_eq!(error.message, "Refresh token revoked");
    assert!(store.get().is_none());
    assert_eq!(
        executor.session().state(),
        SessionState::LoggedOut {
            reason: LogoutReason::RefreshRejected
        }
    );
}

#[tokio::test]
async fn given_refresh_server_error_when_called_then_server_error_and_tokens_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    let error = executor.call(&RequestDescriptor::get("accounts")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ServerError);
    assert!(store.get().is_none());
}

/// **VALUE**: Timeouts are terminal and never replayed.
///
/// **BUG THIS CATCHES**: Automatic retry of a POST that may already have
/// been booked by the server, creating a duplicate payment.
#[tokio::test]
async fn given_slow_backend_when_post_times_out_then_network_failure_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;
    let config = ApiConfig {
        timeout_secs: 1,
        ..ApiConfig::with_base_url(server.uri())
    };
    let executor = executor_with_config(config, signed_in_store());

    let error = executor
        .call(&RequestDescriptor::post("payments", json!({ "amount": "120.00" })))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NetworkFailure);
    assert!(error.status.is_none());
}

#[tokio::test]
async fn given_unreachable_backend_when_called_then_network_failure() {
    let executor = executor_with_config(ApiConfig::with_base_url("http://127.0.0.1:1/api"), signed_in_store());

    let error = executor.call(&RequestDescriptor::get("accounts")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NetworkFailure);
}

#[tokio::test]
async fn given_pdf_response_when_called_then_blob_payload() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3".to_vec();
    Mock::given(method("GET"))
        .and(path("/invoices/17/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf.clone(), "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());

    let payload = executor.call(&RequestDescriptor::get("invoices/17/pdf")).await.unwrap();

    let blob = payload.into_blob().expect("PDF should come back as a blob");
    assert_eq!(blob.content_type, "application/pdf");
    assert_eq!(blob.bytes, pdf);
}

#[tokio::test]
async fn given_no_content_response_when_called_then_empty_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/projects/3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());

    let payload = executor
        .call(&RequestDescriptor::patch("projects/3", json!({ "archived": true })))
        .await
        .unwrap();

    assert_eq!(payload, Payload::Empty);
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PaymentPage {
    total_count: u32,
}

#[tokio::test]
async fn given_query_pairs_when_call_json_then_typed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments"))
        .and(query_param("page", "2"))
        .and(query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalCount": 41 })))
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());
    let descriptor = RequestDescriptor::get("payments")
        .with_query("page", "2")
        .with_query("status", "open");

    let page: PaymentPage = executor.call_json(&descriptor).await.unwrap();

    assert_eq!(page, PaymentPage { total_count: 41 });
}

#[tokio::test]
async fn given_refresh_without_rotation_when_replayed_then_old_refresh_token_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": NEW_ACCESS })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    executor.call(&RequestDescriptor::get("accounts")).await.unwrap();

    assert_eq!(store.get(), Some(TokenPair::new(NEW_ACCESS, OLD_REFRESH)));
}
