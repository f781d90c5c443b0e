//! Signed-in state shared between the request layer and the UI.
//!
//! The session owns the [`TokenStore`] handle. The executor and gateway only
//! reach tokens through it, and every transition is published on a watch
//! channel so the shell can swap to the login screen when a session dies.
//!
//! Every login and logout starts a new epoch. A token refresh records the
//! epoch it started in and only lands if that epoch is still current, so a
//! slow exchange cannot resurrect a session the user already left.

use crate::auth::token_store::{TokenPair, TokenStore};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogoutReason {
    /// No credentials were present when the session was created.
    Initial,
    UserRequested,
    /// The backend refused the refresh token, or the exchange failed.
    RefreshRejected,
    /// An authenticated call was answered with a non-expiry 401.
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    LoggedIn,
    LoggedOut { reason: LogoutReason },
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    state_tx: Arc<watch::Sender<SessionState>>,
    /// Held across every store write so epoch checks and writes are atomic.
    epoch: Arc<Mutex<u64>>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let initial = match store.get() {
            Some(_) => SessionState::LoggedIn,
            None => SessionState::LoggedOut {
                reason: LogoutReason::Initial,
            },
        };
        let (state_tx, _) = watch::channel(initial);

        Self {
            store,
            state_tx: Arc::new(state_tx),
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    /// Fresh snapshot of the stored pair.
    pub fn tokens(&self) -> Option<TokenPair> {
        self.store.get()
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    /// Install the pair of a fresh login. Starts a new epoch.
    pub fn sign_in(&self, pair: TokenPair) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.install(pair);
    }

    /// Drop credentials and publish the logged-out transition. Starts a new epoch.
    pub fn sign_out(&self, reason: LogoutReason) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.terminate(reason);
    }

    /// Install a refreshed pair if no login or logout happened since `epoch`.
    pub(crate) fn renew(&self, epoch: u64, pair: TokenPair) -> bool {
        let current = self.lock_epoch();
        if *current != epoch {
            return false;
        }
        self.install(pair);
        true
    }

    /// End the session for `reason` unless it already moved past `epoch`.
    pub(crate) fn expire(&self, epoch: u64, reason: LogoutReason) -> bool {
        let mut current = self.lock_epoch();
        if *current != epoch {
            return false;
        }
        *current += 1;
        self.terminate(reason);
        true
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, pair: TokenPair) {
        self.store.set(pair);
        let changed = self.state_tx.send_if_modified(|state| {
            let was_logged_out = *state != SessionState::LoggedIn;
            *state = SessionState::LoggedIn;
            was_logged_out
        });
        if changed {
            info!("Session signed in");
        }
    }

    fn terminate(&self, reason: LogoutReason) {
        self.store.clear();
        match reason {
            LogoutReason::UserRequested | LogoutReason::Initial => info!("Session signed out ({reason:?})"),
            LogoutReason::RefreshRejected | LogoutReason::Unauthorized => {
                warn!("Session terminated ({reason:?})")
            }
        }
        self.state_tx.send_replace(SessionState::LoggedOut { reason });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("state", &self.state()).finish()
    }
}
