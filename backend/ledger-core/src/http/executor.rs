//! Authenticated request execution.
//!
//! Per logical call:
//!
//! ```text
//! Pending -> Sent -> Succeeded
//!                 -> Failed(kind)                    kind != AuthExpired, or replay
//!                 -> Refreshing -> Sent(replay) -> Succeeded | Failed
//! ```
//!
//! `AuthExpired` on the first attempt is the only outcome that leads to a
//! second request. Network failures are terminal: replaying a POST that may
//! have reached the server could book the same payment twice.

use crate::auth::gateway::AuthGateway;
use crate::auth::session::{LogoutReason, Session};
use crate::auth::token_store::TokenStore;
use crate::config::ApiConfig;
use crate::error::{ApiError, CoreError, ErrorKind};
use crate::http::descriptor::RequestDescriptor;
use crate::http::payload::Payload;
use crate::http::transport::Transport;

use common::RedactedSecret;

use std::sync::Arc;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Replay,
}

#[derive(Clone)]
pub struct RequestExecutor {
    transport: Transport,
    gateway: AuthGateway,
}

impl RequestExecutor {
    /// Wire an executor, its gateway and a session around `store`.
    pub fn new(config: &ApiConfig, store: Arc<dyn TokenStore>) -> Result<Self, CoreError> {
        let transport = Transport::new(config)?;
        let session = Session::new(store);
        let gateway = AuthGateway::with_transport(transport.clone(), config, session);

        Ok(Self { transport, gateway })
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub fn session(&self) -> &Session {
        self.gateway.session()
    }

    /// Run one logical call, refreshing and replaying at most once.
    pub async fn call(&self, descriptor: &RequestDescriptor) -> Result<Payload, ApiError> {
        let request_id = Uuid::new_v4();
        let mut attempt = Attempt::First;

        loop {
            let bearer = self.bearer_for(descriptor)?;

            debug!("[{request_id}] {:?} attempt for {} {}", attempt, descriptor.method, descriptor.path);
            let error = match self.transport.send(descriptor, bearer.as_ref()).await {
                Ok(payload) => return Ok(payload),
                Err(error) => error,
            };

            match (error.kind(), attempt, bearer) {
                (ErrorKind::AuthExpired, Attempt::First, Some(rejected)) => {
                    info!("[{request_id}] Access token expired, refreshing");
                    self.gateway.refresh_after(&rejected).await?;
                    attempt = Attempt::Replay;
                }
                (ErrorKind::AuthInvalid, _, Some(_)) => {
                    warn!("[{request_id}] {} {} rejected credentials", descriptor.method, descriptor.path);
                    self.session().sign_out(LogoutReason::Unauthorized);
                    return Err(error);
                }
                (kind, attempt, _) => {
                    debug!("[{request_id}] {kind} failure on {attempt:?} attempt is terminal");
                    return Err(error);
                }
            }
        }
    }

    /// [`call`](Self::call) and deserialize the JSON payload.
    pub async fn call_json<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> Result<T, ApiError> {
        self.call(descriptor).await?.into_json()
    }

    /// Access token for this attempt, read fresh from the store.
    fn bearer_for(&self, descriptor: &RequestDescriptor) -> Result<Option<RedactedSecret>, ApiError> {
        if !descriptor.requires_auth {
            return Ok(None);
        }

        self.session()
            .tokens()
            .map(|pair| Some(pair.access_token))
            .ok_or_else(ApiError::missing_token)
    }
}
