use crate::config::ApiConfig;
use crate::error::{ApiError, CoreError, ErrorKind};
use crate::http::descriptor::RequestDescriptor;
use crate::http::payload::{self, Payload};

use common::{ErrorLocation, HttpStatusCode, RedactedSecret};

use std::panic::Location;

use log::debug;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Single HTTP attempt against the API base URL.
///
/// Knows nothing about refresh or retries: one descriptor in, one payload
/// or one classified error out.
#[derive(Clone)]
pub(crate) struct Transport {
    base_url: Url,
    client: Client,
}

impl Transport {
    pub(crate) fn new(config: &ApiConfig) -> Result<Self, CoreError> {
        let base_url = config.base_url()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoreError::HttpClient {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Self { base_url, client })
    }

    pub(crate) fn url_for(&self, descriptor: &RequestDescriptor) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(descriptor.path.trim_start_matches('/'))
            .map_err(|e| {
                ApiError::new(
                    ErrorKind::Unknown,
                    format!("Invalid request path '{}': {e}", descriptor.path),
                )
            })?;

        if !descriptor.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&descriptor.query);
        }

        Ok(url)
    }

    pub(crate) async fn send(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&RedactedSecret>,
    ) -> Result<Payload, ApiError> {
        let url = self.url_for(descriptor)?;
        debug!("{} {}", descriptor.method, url.path());

        let mut request = self.client.request(descriptor.method.clone(), url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = HttpStatusCode(response.status().as_u16());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?
            .to_vec();

        if status.is_success() {
            payload::decode(content_type.as_deref(), bytes)
        } else {
            Err(ApiError::from_response(status, &bytes))
        }
    }
}
