//! Wire seam for the client agent. `Transport` carries one HTTP exchange;
//! the reqwest implementation is the production path and tests substitute a
//! scripted one to count calls.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            bearer: None,
        }
    }

    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: &str, body: Value) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = Some(body);
        request
    }

    #[must_use]
    pub fn put(path: &str, body: Value) -> Self {
        let mut request = Self::new(Method::PUT, path);
        request.body = Some(body);
        request
    }

    #[must_use]
    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange. Errors are transport-level only; HTTP error
    /// statuses come back as a normal `ApiResponse`.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport against a fixed base URL.
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// # Errors
    /// Returns an error for an unparseable base URL or client build failure.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { base_url, http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self
            .base_url
            .join(&request.path)
            .with_context(|| format!("Invalid request path: {}", request.path))?;

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.context("Request failed")?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builders_set_method_and_body() {
        let request = ApiRequest::post("/api/auth/login", serde_json::json!({"username": "a"}));
        assert_eq!(request.method, Method::POST);
        assert!(request.body.is_some());
        assert!(request.bearer.is_none());

        let request = ApiRequest::get("/api/todos");
        assert_eq!(request.method, Method::GET);
        assert!(request.body.is_none());
    }

    #[test]
    fn transport_rejects_bad_base_url() {
        assert!(HttpTransport::new("not a url").is_err());
    }
}
