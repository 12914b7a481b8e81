//! HTTP transport seam between the store client and the network

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::PortError;

/// Status and decoded JSON body of one response
///
/// Empty bodies (e.g. `204 No Content`) decode to `Value::Null`; bodies that
/// are not JSON are kept as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        HttpResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short rendering of the body for error messages
    pub fn summary(&self) -> String {
        match &self.body {
            Value::Null => "<empty body>".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Minimal JSON-over-HTTP capability the store client needs
///
/// Only network-level failures are errors here; status codes are judged by
/// the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<HttpResponse, PortError>;

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, PortError>;
}

/// reqwest-backed transport with basic auth
pub struct HttpTransport {
    client: reqwest::Client,
    username: String,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(
        store: &StoreConfig,
        headers: &BTreeMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PortError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PortError::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                PortError::Config(format!("Invalid value for header '{}': {}", name, e))
            })?;
            default_headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .danger_accept_invalid_certs(!store.verify_ssl);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| PortError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            username: store.username.clone(),
            password: store.password.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, self.password.as_deref())
        }
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<HttpResponse, PortError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::transport(url, Some(status), e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<HttpResponse, PortError> {
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| PortError::transport(url, None, e.to_string()))?;
        Self::read(url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, PortError> {
        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(|e| PortError::transport(url, None, e.to_string()))?;
        Self::read(url, response).await
    }
}
