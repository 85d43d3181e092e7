use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;

/// Error types that can occur when interacting with HTTP clients
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP request error: {0}")]
    RequestError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Empty response from server")]
    EmptyResponse,
}

/// A response with its status kept, for callers that relay it verbatim
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A trait for HTTP client implementations, object safe so it can be shared as `Arc<dyn HttpClient>`
#[async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    /// Send a GET request. Any status code is a successful response; only transport failures are errors.
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError>;

    /// Send a GET request and parse a JSON body, treating non-2xx statuses as errors
    async fn get_json(&self, url: &str) -> Result<Value, HttpClientError> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(HttpClientError::ServerError(format!("HTTP {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(HttpClientError::EmptyResponse);
        }
        serde_json::from_slice(&response.body).map_err(|e| HttpClientError::ParseError(e.to_string()))
    }
}

/// An HTTP client implementation using reqwest
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client that identifies itself with `user_agent` and asks for JSON
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, HttpClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| HttpClientError::RequestError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> {
        debug!("GET request to {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpClientError::RequestError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpClientError::ParseError(format!("Failed to read response body: {}", e)))?;

        debug!("GET {} returned {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, content_type, body })
    }
}
