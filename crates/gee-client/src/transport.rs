//! Single-shot HTTP transport with a uniform timeout.
//!
//! Every call resolves to an [`ApiResult`]: parsed JSON on success, a
//! [`ClientError`] with a human-readable message otherwise. Nothing panics
//! past this boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ApiResult, ClientError};

/// One request against the backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Safe to resend after an ambiguous failure
    pub idempotent: bool,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            idempotent: true,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            headers: Vec::new(),
            idempotent: true,
        }
    }

    /// Mark a request whose repetition has side effects on the backend.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Something that can carry an [`ApiRequest`] to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        (**self).send(request).await
    }
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
    default_headers: BTreeMap<String, String>,
}

impl HttpTransport {
    /// Create a transport from client configuration.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            default_headers: config.headers.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout.as_secs())
        } else {
            ClientError::from(err)
        }
    }

    async fn execute(&self, request: &ApiRequest) -> ApiResult<Value> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in self.default_headers.iter() {
            builder = builder.header(key.as_str(), value.as_str());
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!(status = status.as_u16(), bytes = text.len(), "Response received");

        if !status.is_success() {
            return Err(ClientError::from_response(
                status.as_u16(),
                status.canonical_reason(),
                &text,
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        let result = self.execute(&request).await;
        if let Err(ref e) = result {
            warn!(error = %e, status = ?e.status(), "Backend request failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::get("/regions/cities").with_query("province_code", "11");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query_value("province_code"), Some("11"));
        assert_eq!(req.query_value("missing"), None);
        assert!(req.body.is_none());

        let req = ApiRequest::post("/export", serde_json::json!({"format": "geotiff"}))
            .with_header("X-Trace", "1");
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.body.unwrap()["format"], "geotiff");
    }

    #[test]
    fn test_url_joining() {
        let mut config = ClientConfig::default();
        config.base_url = "http://localhost:5000/api/".into();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5000/api");
        assert_eq!(transport.url_for("/health"), "http://localhost:5000/api/health");
        assert_eq!(transport.url_for("health"), "http://localhost:5000/api/health");
    }
}
