use crate::helpers::{NEW_ACCESS, NEW_REFRESH, executor_for, signed_in_store, token_response};

use ledger_core::auth::{Credentials, FileTokenStore, LogoutReason, MemoryTokenStore, SessionState, TokenPair, TokenStore};
use ledger_core::config::ApiConfig;
use ledger_core::error::ErrorKind;
use ledger_core::http::{RequestDescriptor, RequestExecutor};

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn given_valid_credentials_when_login_then_pair_stored_and_session_logged_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "username": "maria", "password": "correct horse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(NEW_ACCESS, NEW_REFRESH)))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    let executor = executor_for(&server, store.clone());
    let mut states = executor.session().subscribe();

    let pair = executor
        .gateway()
        .login(&Credentials::new("maria", "correct horse"))
        .await
        .unwrap();

    assert_eq!(pair, TokenPair::new(NEW_ACCESS, NEW_REFRESH));
    assert_eq!(store.get(), Some(pair));
    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), SessionState::LoggedIn);
}

#[tokio::test]
async fn given_wrong_password_when_login_then_auth_invalid_and_nothing_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid username or password"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    let executor = executor_for(&server, store.clone());

    let error = executor
        .gateway()
        .login(&Credentials::new("maria", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthInvalid);
    assert_eq!(error.message, "Invalid username or password");
    assert!(store.get().is_none());
}

#[tokio::test]
async fn given_login_response_without_refresh_token_when_login_then_unknown_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": NEW_ACCESS })))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    let executor = executor_for(&server, store.clone());

    let error = executor
        .gateway()
        .login(&Credentials::new("maria", "pw"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unknown);
    assert!(store.get().is_none());
}

#[tokio::test]
async fn given_signed_in_session_when_logout_then_store_cleared_and_reason_published() {
    let server = MockServer::start().await;
    let store = signed_in_store();
    let executor = executor_for(&server, store.clone());

    executor.gateway().logout();

    assert!(store.get().is_none());
    assert_eq!(
        executor.session().state(),
        SessionState::LoggedOut {
            reason: LogoutReason::UserRequested
        }
    );
}

#[tokio::test]
async fn given_empty_store_when_refresh_then_auth_invalid_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let executor = executor_for(&server, Arc::new(MemoryTokenStore::new()));

    let error = executor.gateway().refresh().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthInvalid);
    assert_eq!(
        executor.session().state(),
        SessionState::LoggedOut {
            reason: LogoutReason::RefreshRejected
        }
    );
}

/// **VALUE**: Login, restart, and the persisted token is used on the next call.
#[tokio::test]
async fn given_file_store_when_logged_in_and_reopened_then_next_session_uses_saved_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(NEW_ACCESS, NEW_REFRESH)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", format!("Bearer {NEW_ACCESS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "maria" })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig::with_base_url(server.uri());

    let first_run = RequestExecutor::new(&config, Arc::new(FileTokenStore::open_in(dir.path()).unwrap())).unwrap();
    first_run
        .gateway()
        .login(&Credentials::new("maria", "pw"))
        .await
        .unwrap();
    drop(first_run);

    let second_run = RequestExecutor::new(&config, Arc::new(FileTokenStore::open_in(dir.path()).unwrap())).unwrap();
    let me = second_run.call(&RequestDescriptor::get("users/me")).await.unwrap();

    assert_eq!(second_run.session().state(), SessionState::LoggedIn);
    assert_eq!(me.as_json(), Some(&json!({ "username": "maria" })));
}
