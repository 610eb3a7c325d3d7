//! Admin API transport over reqwest

use std::future::Future;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{Backoff, GraphQlResponse, Transport};
use crate::config::{EnvironmentConfig, RetryConfig};
use crate::{CoreError, Result};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Sends GraphQL documents to `https://<shop>/admin/api/<version>/graphql.json`
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    shop: String,
    access_token: String,
    retry: RetryConfig,
}

/// What one send of a request came to
#[derive(Debug)]
enum Attempt {
    Done(GraphQlResponse),
    Retry(String),
}

impl Attempt {
    /// A throttled envelope is retried like a 429
    fn from_envelope(envelope: GraphQlResponse) -> Self {
        if envelope.is_throttled() {
            Attempt::Retry("throttled".to_string())
        } else {
            Attempt::Done(envelope)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusAction {
    /// Decode the body
    Read,
    Retry,
    Fail,
}

fn status_action(status: StatusCode) -> StatusAction {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else if status.is_success() {
        StatusAction::Read
    } else {
        StatusAction::Fail
    }
}

/// Send until an attempt is done, a hard error occurs, or `max_attempts`
/// retryable attempts have been spent
async fn with_retries<F, Fut>(
    shop: &str,
    retry: &RetryConfig,
    mut send: F,
) -> Result<GraphQlResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt>>,
{
    let mut backoff = Backoff::from_config(retry);
    let max_attempts = retry.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match send().await? {
            Attempt::Done(envelope) => return Ok(envelope),
            Attempt::Retry(reason) if attempts >= max_attempts => {
                return Err(CoreError::RequestFailed {
                    endpoint: shop.to_string(),
                    attempts,
                    message: reason,
                });
            }
            Attempt::Retry(reason) => {
                let delay = backoff.next_delay();
                warn!(
                    shop,
                    attempt = attempts,
                    "Retrying admin API request in {:?}: {}",
                    delay,
                    reason
                );
                tokio::time::sleep(delay).await;
            }
        }
        debug!(shop, attempt = attempts + 1, "Re-sending admin API request");
    }
}

impl HttpTransport {
    pub fn new(
        shop: impl Into<String>,
        api_version: &str,
        access_token: impl Into<String>,
        retry: RetryConfig,
    ) -> Result<Self> {
        let shop = shop.into();
        let url = format!("https://{shop}/admin/api/{api_version}/graphql.json");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| CoreError::RequestFailed {
                endpoint: shop.clone(),
                attempts: 0,
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            shop,
            access_token: access_token.into(),
            retry,
        })
    }

    /// Build a transport for a configured environment, resolving its token
    pub fn for_environment(
        label: &str,
        environment: &EnvironmentConfig,
        retry: RetryConfig,
    ) -> Result<Self> {
        let token = environment.resolve_token(label)?;
        Self::new(&environment.shop, &environment.api_version, token, retry)
    }

    async fn attempt(&self, body: &Value) -> Result<Attempt> {
        let response = match self
            .client
            .post(&self.url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => return Ok(Attempt::Retry(e.to_string())),
            Err(e) => {
                return Err(CoreError::RequestFailed {
                    endpoint: self.shop.clone(),
                    attempts: 1,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        match status_action(status) {
            StatusAction::Read => {}
            StatusAction::Retry => return Ok(Attempt::Retry(format!("HTTP {status}"))),
            StatusAction::Fail => {
                let body = response.text().await.unwrap_or_default();
                return Err(CoreError::HttpStatus {
                    endpoint: self.shop.clone(),
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let envelope: GraphQlResponse =
            response
                .json()
                .await
                .map_err(|e| CoreError::RequestFailed {
                    endpoint: self.shop.clone(),
                    attempts: 1,
                    message: format!("invalid response body: {e}"),
                })?;

        Ok(Attempt::from_envelope(envelope))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, query: &str, variables: Value) -> Result<GraphQlResponse> {
        let body = json!({ "query": query, "variables": variables });
        let body = &body;
        with_retries(&self.shop, &self.retry, move || self.attempt(body)).await
    }

    fn endpoint(&self) -> String {
        self.shop.clone()
    }
}
