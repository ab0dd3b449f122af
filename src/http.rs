//! Request/response descriptors and the transport seam.
//!
//! [`Request`] and [`Response`] are plain data. Everything above this module
//! builds and inspects them without touching the network; a [`Transport`]
//! performs the actual exchange.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::util::urljoin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One HTTP exchange, described as data.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    /// Joins `path` onto `base_url`, which is normalised to end with one `/`.
    pub fn build(
        base_url: &str,
        path: &str,
        method: Method,
        body: Option<Value>,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            method,
            url: urljoin(base_url, path),
            params,
            headers: Vec::new(),
            body,
        }
    }

    /// Bare GET against an absolute URL, as used for next-page links.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Executes a [`Request`]. Non-2xx statuses are returned as data, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, verify: bool) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("planetapi-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("planetapi-rs")),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout);

        if !verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
        })
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Underlying client, shared with asset downloads.
    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(status, url = %request.url, "received response");
        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_normalises_base_url() {
        let a = Request::build("http://host", "data/v1/", Method::Get, None, Vec::new());
        let b = Request::build("http://host/", "data/v1/", Method::Get, None, Vec::new());
        assert_eq!(a.url, "http://host/data/v1/");
        assert_eq!(a, b);
    }

    #[test]
    fn build_keeps_body_and_params() {
        let req = Request::build(
            "http://host",
            "data/v1/quick-search",
            Method::Post,
            Some(serde_json::json!({"item_types": ["PSScene"]})),
            vec![("_page_size".to_string(), "10".to_string())],
        );
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://host/data/v1/quick-search");
        assert_eq!(req.params, vec![("_page_size".to_string(), "10".to_string())]);
        assert_eq!(req.body.unwrap()["item_types"][0], "PSScene");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn get_has_no_body() {
        let req = Request::get("http://host/next?_page=abc");
        assert_eq!(req.method, Method::Get);
        assert!(req.body.is_none());
        assert!(req.params.is_empty());
    }
}
