//! The HTTP capability the harvester depends on.
//!
//! The crawler never talks to `reqwest` directly: it goes through the
//! [`HttpClient`] trait so tests can substitute an in-memory site and callers
//! can inject a client with their own proxy or TLS setup via
//! [`crate::config::CrawlConfigBuilder::client`].

use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// A fully-read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `true` when the `content-type` header names HTML (or is missing).
    pub fn is_html(&self) -> bool {
        match self.header("content-type") {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }
}

/// GET with a byte ceiling.
///
/// Implementations enforce their own timeout. When `max_bytes` is set the
/// body must be rejected with [`FetchError::TooLarge`] both when the declared
/// `Content-Length` exceeds it and when the streamed body grows past it.
/// Non-2xx statuses are returned as responses, not errors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, max_bytes: Option<usize>) -> Result<HttpResponse, FetchError>;
}

/// [`HttpClient`] backed by `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl ReqwestClient {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, max_bytes: Option<usize>) -> Result<HttpResponse, FetchError> {
        debug!("GET {}", url);
        let mut response = self.client.get(url).send().await.map_err(|e| self.map_err(e))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        if let (Some(limit), Some(declared)) = (max_bytes, response.content_length()) {
            if declared as usize > limit {
                return Err(FetchError::TooLarge { limit });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_err(e))? {
            if let Some(limit) = max_bytes {
                if body.len() + chunk.len() > limit {
                    return Err(FetchError::TooLarge { limit });
                }
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
