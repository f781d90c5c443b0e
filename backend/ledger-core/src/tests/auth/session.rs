use crate::auth::session::{LogoutReason, Session, SessionState};
use crate::auth::token_store::{MemoryTokenStore, TokenPair, TokenStore};

use std::sync::Arc;

#[test]
fn given_empty_store_when_session_created_then_logged_out_initially() {
    let session = Session::new(Arc::new(MemoryTokenStore::new()));

    assert_eq!(
        session.state(),
        SessionState::LoggedOut {
            reason: LogoutReason::Initial
        }
    );
}

#[test]
fn given_persisted_pair_when_session_created_then_logged_in() {
    let store = MemoryTokenStore::with_pair(TokenPair::new("a", "r"));

    let session = Session::new(Arc::new(store));

    assert_eq!(session.state(), SessionState::LoggedIn);
}

/// **VALUE**: The shell learns about a terminated session.
///
/// **WHY THIS MATTERS**: The UI swaps to the login screen by watching this
/// channel; a missed transition leaves a dead session on screen.
#[tokio::test]
async fn given_subscriber_when_signed_out_then_sees_reason_and_store_is_cleared() {
    let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a", "r")));
    let session = Session::new(store.clone());
    let mut states = session.subscribe();

    session.sign_out(LogoutReason::RefreshRejected);

    states.changed().await.unwrap();
    assert_eq!(
        *states.borrow_and_update(),
        SessionState::LoggedOut {
            reason: LogoutReason::RefreshRejected
        }
    );
    assert!(store.get().is_none());
}

#[tokio::test]
async fn given_logged_in_session_when_pair_replaced_then_no_spurious_transition() {
    let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
    let session = Session::new(store.clone());
    let states = session.subscribe();

    session.sign_in(TokenPair::new("a2", "r2"));

    assert!(!states.has_changed().unwrap(), "refresh must not re-announce login");
    assert_eq!(store.get(), Some(TokenPair::new("a2", "r2")));
}

/// **VALUE**: A refreshed pair never lands after the user logged out.
///
/// **BUG THIS CATCHES**: A slow refresh writing tokens back into a cleared
/// store and flipping the UI back to logged in.
#[test]
fn given_logout_after_epoch_taken_when_renewed_then_pair_is_discarded() {
    let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
    let session = Session::new(store.clone());
    let epoch = session.epoch();

    session.sign_out(LogoutReason::UserRequested);
    let renewed = session.renew(epoch, TokenPair::new("a2", "r2"));

    assert!(!renewed);
    assert!(store.get().is_none());
    assert_eq!(
        session.state(),
        SessionState::LoggedOut {
            reason: LogoutReason::UserRequested
        }
    );
}

#[test]
fn given_unchanged_epoch_when_renewed_then_pair_is_stored() {
    let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
    let session = Session::new(store.clone());
    let epoch = session.epoch();

    assert!(session.renew(epoch, TokenPair::new("a2", "r2")));
    assert_eq!(store.get(), Some(TokenPair::new("a2", "r2")));
    assert_eq!(session.epoch(), epoch, "a refresh is not a new session");
}

#[test]
fn given_new_login_after_epoch_taken_when_expired_then_new_session_survives() {
    let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
    let session = Session::new(store.clone());
    let epoch = session.epoch();

    session.sign_in(TokenPair::new("fresh", "login"));
    let expired = session.expire(epoch, LogoutReason::RefreshRejected);

    assert!(!expired);
    assert_eq!(store.get(), Some(TokenPair::new("fresh", "login")));
    assert_eq!(session.state(), SessionState::LoggedIn);
}
