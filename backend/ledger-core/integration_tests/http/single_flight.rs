// Concurrency tests: many calls failing with an expired token at once.

use crate::helpers::{
    NEW_ACCESS, NEW_REFRESH, OLD_ACCESS, OLD_REFRESH, REFRESH_PATH, bearer, executor_for, executor_with_config, expired,
    mount_refresh, signed_in_store, token_response,
};

use ledger_core::auth::{LogoutReason, SessionState, TokenPair, TokenStore};
use ledger_core::config::ApiConfig;
use ledger_core::error::ErrorKind;
use ledger_core::http::RequestDescriptor;

use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCREENS: usize = 12;

const NEWER_ACCESS: &str = "newer-access";
const NEWER_REFRESH: &str = "newer-refresh";

/// Refresh endpoint for the old refresh token that answers after `delay`.
async fn mount_slow_refresh(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": OLD_REFRESH })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response(NEW_ACCESS, NEW_REFRESH))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// **VALUE**: Every screen wakes up after a long idle period and fails at once;
/// exactly one refresh exchange goes out.
///
/// **WHY THIS MATTERS**: Rotating refresh tokens are single-use. A second
/// exchange with the same refresh token is treated as replay and revokes the
/// whole session server-side.
///
/// **BUG THIS CATCHES**: Each failed call running its own refresh.
#[tokio::test]
async fn given_concurrent_expired_calls_when_executed_then_refresh_runs_once() {
    // GIVEN: a slow refresh endpoint so every 401 lands while it is pending
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(SCREENS as u64)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response(NEW_ACCESS, NEW_REFRESH))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(SCREENS as u64)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());
    let descriptor = RequestDescriptor::get("accounts");

    // WHEN
    let results = join_all((0..SCREENS).map(|_| executor.call(&descriptor))).await;

    // THEN
    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(store.get(), Some(TokenPair::new(NEW_ACCESS, NEW_REFRESH)));
}

/// **VALUE**: A 401 that arrives after the refresh already finished reuses
/// the new pair instead of refreshing again.
///
/// **BUG THIS CATCHES**: A slow request sent with the old token triggering a
/// second exchange with an already-rotated refresh token.
#[tokio::test]
async fn given_late_expiry_after_refresh_completed_when_executed_then_no_second_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/aging"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired().set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;
    Mock::given(method("GET"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());
    let slow = RequestDescriptor::get("reports/aging");
    let fast = RequestDescriptor::get("users/me");

    let (slow_result, fast_result) = tokio::join!(executor.call(&slow), executor.call(&fast));

    assert!(slow_result.is_ok(), "{slow_result:?}");
    assert!(fast_result.is_ok(), "{fast_result:?}");
}

/// **VALUE**: A failed shared refresh reaches every waiting call identically.
#[tokio::test]
async fn given_concurrent_calls_when_refresh_rejected_then_all_fail_with_same_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments"))
        .respond_with(expired())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Session revoked" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());
    let descriptor = RequestDescriptor::get("payments");

    let results = join_all((0..SCREENS).map(|_| executor.call(&descriptor))).await;

    for result in &results {
        let error = result.as_ref().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AuthInvalid);
        assert_eq!(error.message, "Session revoked");
    }
    assert!(store.get().is_none());
}

#[tokio::test]
async fn given_concurrent_direct_refreshes_when_awaited_then_one_exchange_and_same_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_response(NEW_ACCESS, NEW_REFRESH))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let executor = executor_for(&server, signed_in_store());
    let gateway = executor.gateway();

    let pairs = join_all((0..5).map(|_| gateway.refresh())).await;

    for pair in pairs {
        assert_eq!(pair.unwrap(), TokenPair::new(NEW_ACCESS, NEW_REFRESH));
    }
}

/// **VALUE**: A screen that closes while its call waits on a refresh does not
/// take the session down with it.
///
/// **WHY THIS MATTERS**: The backend rotates the refresh token as soon as it
/// sees the request. If the exchange stops with its caller, the new pair is
/// lost and the old refresh token is already dead.
///
/// **BUG THIS CATCHES**: The exchange only making progress while a caller
/// polls it, and an abandoned exchange staying parked where the next expiry
/// joins it and fails.
#[tokio::test]
async fn given_caller_dropped_mid_refresh_when_next_call_made_then_exchange_finished_and_session_kept() {
    // GIVEN: a 1s client timeout and a refresh that takes 300ms
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_slow_refresh(&server, Duration::from_millis(300)).await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    let config = ApiConfig {
        timeout_secs: 1,
        ..ApiConfig::with_base_url(server.uri())
    };
    let store = signed_in_store();
    let executor = executor_with_config(config, store.clone());
    let descriptor = RequestDescriptor::get("accounts");

    // WHEN: the first call is abandoned while the refresh is pending
    let abandoned = tokio::time::timeout(Duration::from_millis(100), executor.call(&descriptor)).await;
    assert!(abandoned.is_err(), "call should still be waiting on the refresh");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // THEN: the exchange finished on its own and the next call uses its pair
    assert_eq!(store.get(), Some(TokenPair::new(NEW_ACCESS, NEW_REFRESH)));
    let payload = executor.call(&descriptor).await.unwrap();
    assert_eq!(payload.as_json(), Some(&json!([])));
    assert_eq!(executor.session().state(), SessionState::LoggedIn);
}

/// **VALUE**: Each expiry window gets its own exchange.
///
/// **BUG THIS CATCHES**: A settled exchange staying cached, so the second
/// expiry replays the first pair instead of refreshing again.
#[tokio::test]
async fn given_two_expiry_windows_when_called_in_each_then_two_exchanges_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
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
    Mock::given(method("GET"))
        .and(path("/categories"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .and(header("authorization", bearer(NEWER_ACCESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": NEW_REFRESH })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(NEWER_ACCESS, NEWER_REFRESH)))
        .expect(1)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    executor.call(&RequestDescriptor::get("accounts")).await.unwrap();
    executor.call(&RequestDescriptor::get("categories")).await.unwrap();

    assert_eq!(store.get(), Some(TokenPair::new(NEWER_ACCESS, NEWER_REFRESH)));
}

/// **VALUE**: Logging out while a refresh is pending stays logged out.
///
/// **BUG THIS CATCHES**: The late exchange writing its pair back into the
/// cleared store and flipping the session to logged in again.
#[tokio::test]
async fn given_logout_during_refresh_when_exchange_settles_then_session_stays_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments"))
        .and(header("authorization", bearer(OLD_ACCESS)))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_slow_refresh(&server, Duration::from_millis(300)).await;
    Mock::given(method("GET"))
        .and(header("authorization", bearer(NEW_ACCESS)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());
    let descriptor = RequestDescriptor::get("payments");

    let (result, ()) = tokio::join!(executor.call(&descriptor), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        executor.gateway().logout();
    });

    assert_eq!(result.unwrap_err().kind(), ErrorKind::AuthInvalid);
    assert!(store.get().is_none());
    assert_eq!(
        executor.session().state(),
        SessionState::LoggedOut {
            reason: LogoutReason::UserRequested
        }
    );
}
