//! Transport for admin API GraphQL requests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

mod backoff;
mod http;

pub use backoff::Backoff;
pub use http::HttpTransport;

/// Error code the admin API uses when the cost budget is exhausted
pub const THROTTLED_CODE: &str = "THROTTLED";

/// One entry of a GraphQL `errors` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlErrorExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.code.as_deref()
    }
}

/// Raw response envelope; application errors are left for the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.errors.iter().any(|e| e.code() == Some(THROTTLED_CODE))
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}

/// Issues GraphQL documents against one store.
///
/// Implementations retry rate limiting and server errors themselves and only
/// return an `Err` once retries are exhausted or the request cannot be sent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, query: &str, variables: Value) -> Result<GraphQlResponse>;

    /// Human-readable label for logs, typically the shop host
    fn endpoint(&self) -> String;
}
