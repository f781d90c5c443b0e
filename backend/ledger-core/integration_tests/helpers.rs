//! Test helpers for request-layer integration tests.
//!
//! Every test runs against its own wiremock server. Mocks declare how many
//! times they must be hit with `.expect(n)`, and the server verifies those
//! counts when it is dropped at the end of the test.

use ledger_core::auth::{MemoryTokenStore, TokenPair, TokenStore};
use ledger_core::config::ApiConfig;
use ledger_core::http::RequestExecutor;

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OLD_ACCESS: &str = "old-access";
pub const OLD_REFRESH: &str = "old-refresh";
pub const NEW_ACCESS: &str = "new-access";
pub const NEW_REFRESH: &str = "new-refresh";

pub const REFRESH_PATH: &str = "/auth/refresh";

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn signed_in_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_pair(TokenPair::new(OLD_ACCESS, OLD_REFRESH)))
}

pub fn executor_for(server: &MockServer, store: Arc<MemoryTokenStore>) -> RequestExecutor {
    executor_with_config(ApiConfig::with_base_url(server.uri()), store)
}

pub fn executor_with_config(config: ApiConfig, store: Arc<MemoryTokenStore>) -> RequestExecutor {
    let store: Arc<dyn TokenStore> = store;
    RequestExecutor::new(&config, store).expect("Failed to build executor")
}

pub fn expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "message": "jwt expired",
        "code": "TOKEN_EXPIRED"
    }))
}

pub fn token_response(access: &str, refresh: &str) -> Value {
    json!({ "accessToken": access, "refreshToken": refresh })
}

/// Refresh endpoint that accepts the old refresh token exactly `times` times.
pub async fn mount_refresh(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": OLD_REFRESH })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(NEW_ACCESS, NEW_REFRESH)))
        .expect(times)
        .named("refresh")
        .mount(server)
        .await;
}
