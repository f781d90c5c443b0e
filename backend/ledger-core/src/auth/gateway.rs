//! Token exchanges with the backend's auth endpoints.
//!
//! # Single flight
//!
//! After a long idle period every open screen fails with an expired token
//! at about the same moment. Only one refresh exchange may go out: the
//! first caller spawns it on the runtime, and every caller that arrives
//! while it is pending awaits that same task's result. The exchange runs to
//! completion even if every waiter is dropped, since the backend rotates the
//! refresh token as soon as it sees the request. The task writes the pair to
//! the store and then empties the slot, so the next expiry starts a new
//! exchange.
//!
//! A failed exchange clears the store, ends the session, and hands the same
//! [`ApiError`] to every waiter. An exchange that settles after a login or
//! logout is discarded.

use crate::auth::session::{LogoutReason, Session};
use crate::auth::token_store::TokenPair;
use crate::config::ApiConfig;
use crate::error::{ApiError, CoreError, ErrorKind};
use crate::http::descriptor::RequestDescriptor;
use crate::http::payload::Payload;
use crate::http::transport::Transport;

use common::RedactedSecret;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

type RefreshFlight = Shared<BoxFuture<'static, Result<TokenPair, ApiError>>>;

/// Login form contents.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: RedactedSecret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<RedactedSecret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Response of the login and refresh endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    transport: Transport,
    session: Session,
    refresh_path: String,
    login_path: String,
    in_flight: Mutex<Option<RefreshFlight>>,
}

impl AuthGateway {
    pub fn new(config: &ApiConfig, session: Session) -> Result<Self, CoreError> {
        Ok(Self::with_transport(Transport::new(config)?, config, session))
    }

    pub(crate) fn with_transport(transport: Transport, config: &ApiConfig, session: Session) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                transport,
                session,
                refresh_path: config.refresh_path.clone(),
                login_path: config.login_path.clone(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Joins the pending exchange if there is one.
    pub async fn refresh(&self) -> Result<TokenPair, ApiError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            self.join_or_start(&mut slot)
        };

        flight.await
    }

    /// Refresh after `rejected` was answered with an expiry.
    ///
    /// If the store already holds a different access token, an exchange has
    /// finished since that request went out and its pair is returned as-is.
    pub(crate) async fn refresh_after(&self, rejected: &RedactedSecret) -> Result<TokenPair, ApiError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;

            if slot.is_none() {
                match self.inner.session.tokens() {
                    Some(current) if current.access_token != *rejected => {
                        debug!("Token already refreshed by a concurrent call");
                        return Ok(current);
                    }
                    None => return Err(ApiError::missing_token()),
                    Some(_) => {}
                }
            }

            self.join_or_start(&mut slot)
        };

        flight.await
    }

    fn join_or_start(&self, slot: &mut Option<RefreshFlight>) -> RefreshFlight {
        if let Some(flight) = slot.as_ref() {
            debug!("Joining in-flight token refresh");
            return flight.clone();
        }

        // The slot lock is held here, so the task cannot empty the slot before
        // its own flight is stored in it.
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.exchange_refresh().await;
            inner.in_flight.lock().await.take();
            result
        });

        let flight = task
            .map(|joined| {
                joined.unwrap_or_else(|error| {
                    Err(ApiError::new(
                        ErrorKind::Unknown,
                        format!("Token refresh task failed: {error}"),
                    ))
                })
            })
            .boxed()
            .shared();
        *slot = Some(flight.clone());
        flight
    }

    /// Sign in with username and password.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let descriptor = RequestDescriptor::post(
            self.inner.login_path.clone(),
            json!({
                "username": credentials.username,
                "password": credentials.password.as_str(),
            }),
        )
        .public();

        let payload = self.inner.transport.send(&descriptor, None).await?;
        let response: TokenResponse = payload.into_json()?;
        let refresh_token = response.refresh_token.ok_or_else(|| {
            ApiError::new(ErrorKind::Unknown, "Login response is missing a refresh token")
        })?;

        let pair = TokenPair::new(response.access_token, refresh_token);
        self.inner.session.sign_in(pair.clone());
        info!("Signed in as {}", credentials.username);

        Ok(pair)
    }

    pub fn logout(&self) {
        self.inner.session.sign_out(LogoutReason::UserRequested);
    }
}

impl GatewayInner {
    async fn exchange_refresh(&self) -> Result<TokenPair, ApiError> {
        let epoch = self.session.epoch();

        match self.request_refresh().await {
            Ok(pair) => {
                if !self.session.renew(epoch, pair.clone()) {
                    warn!("Session changed during token refresh; discarding the new pair");
                    return Err(ApiError::new(
                        ErrorKind::AuthInvalid,
                        "Session ended during token refresh",
                    ));
                }
                info!("Access token refreshed");
                Ok(pair)
            }
            Err(error) => {
                warn!("Token refresh failed: {error}");
                self.session.expire(epoch, LogoutReason::RefreshRejected);
                Err(error)
            }
        }
    }

    async fn request_refresh(&self) -> Result<TokenPair, ApiError> {
        let current = self.session.tokens().ok_or_else(ApiError::missing_token)?;

        let descriptor = RequestDescriptor::post(
            self.refresh_path.clone(),
            json!({ "refreshToken": current.refresh_token.as_str() }),
        )
        .public();

        let payload = match self.transport.send(&descriptor, None).await {
            Ok(payload) => payload,
            Err(error) if error.kind().is_rejection() => {
                return Err(error.with_kind(ErrorKind::AuthInvalid));
            }
            Err(error) => return Err(error),
        };

        let response: TokenResponse = match payload {
            Payload::Json(_) => payload.into_json()?,
            _ => {
                return Err(ApiError::new(
                    ErrorKind::Unknown,
                    "Refresh response carried no token pair",
                ));
            }
        };

        let refresh_token = response
            .refresh_token
            .map(RedactedSecret::new)
            .unwrap_or(current.refresh_token);

        Ok(TokenPair {
            access_token: RedactedSecret::new(response.access_token),
            refresh_token,
        })
    }
}
