//! Outbound HTTP requests with logging on the `request` target
//!
//! Transport failures never surface as errors: they are logged and the call
//! yields `None`. A response with an error status still yields its body.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::random::ipv4_random;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// How non-GET options are sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyFormat {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Request builder. Options go in the query string for `GET` and in the
/// body otherwise.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    uri: String,
    options: Map<String, Value>,
    headers: HeaderMap,
    body_format: BodyFormat,
    timeout: Duration,
    ip_spoofing: bool,
}

impl ApiRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            options: Map::new(),
            headers: HeaderMap::new(),
            body_format: BodyFormat::default(),
            timeout: DEFAULT_TIMEOUT,
            ip_spoofing: true,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body_format(mut self, format: BodyFormat) -> Self {
        self.body_format = format;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a random mainland China address in `X-Forwarded-For` and
    /// `Client-IP`. On by default.
    pub fn ip_spoofing(mut self, enabled: bool) -> Self {
        self.ip_spoofing = enabled;
        self
    }

    fn outgoing_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if self.ip_spoofing {
            if let Ok(ip) = HeaderValue::from_str(&ipv4_random().to_string()) {
                headers.insert(HeaderName::from_static("x-forwarded-for"), ip.clone());
                headers.insert(HeaderName::from_static("client-ip"), ip);
            }
        }
        headers
    }

    pub async fn send(self) -> Option<ApiResponse> {
        let params = Value::Object(self.options.clone());
        tracing::info!(target: "request", uri = %self.uri, params = %params, "api request send");

        let client = match reqwest::Client::builder().timeout(self.timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(target: "request", uri = %self.uri, error_message = %e, "api request error");
                return None;
            }
        };

        let builder = client
            .request(self.method.clone(), &self.uri)
            .headers(self.outgoing_headers());
        let builder = if self.method == Method::GET {
            builder.query(&self.options)
        } else {
            match self.body_format {
                BodyFormat::Json => builder.json(&self.options),
                BodyFormat::Form => builder.form(&self.options),
            }
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    target: "request",
                    uri = %self.uri,
                    params = %params,
                    status_code = e.status().map_or(0, |s| s.as_u16()),
                    error_message = %e,
                    "api request error"
                );
                tracing::info!(target: "request", code = 0, "api request response");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "request",
                uri = %self.uri,
                params = %params,
                status_code = status.as_u16(),
                "api request error"
            );
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(target: "request", uri = %self.uri, error_message = %e, "api request error");
                return None;
            }
        };

        tracing::info!(target: "request", code = status.as_u16(), response = %body, "api request response");
        Some(ApiResponse { status, body })
    }
}

/// Send `options` to `uri` with the defaults and return the response body
pub async fn api_request(uri: &str, method: Method, options: Map<String, Value>) -> Option<String> {
    ApiRequest::new(method, uri)
        .with_options(options)
        .send()
        .await
        .map(|response| response.body)
}
