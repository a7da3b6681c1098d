//! API error shaping
//!
//! `ApiError` is the value a handler returns to signal an API-level failure.
//! It carries the HTTP status, a human-readable message and a field-error
//! collection, and renders itself as a JSON error response.
//!
//! Codes may carry a sub-code after the HTTP status: `40401` renders with
//! status `404` while the full code is kept in the response body.

use std::fmt;

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::message_bag::MessageBag;

/// Code used when the caller supplies none (or zero)
pub const DEFAULT_CODE: u32 = 400;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured API failure with status, message and field errors
#[derive(Debug)]
pub struct ApiError {
    status_code: StatusCode,
    code: u32,
    message: String,
    errors: MessageBag,
    headers: HeaderMap,
    source: Option<BoxError>,
}

impl ApiError {
    /// Create an error for `code`, with the standard reason phrase as message.
    pub fn new(code: u32) -> Self {
        let code = if code == 0 { DEFAULT_CODE } else { code };
        let status_code = status_from_code(code);
        Self {
            status_code,
            code,
            message: reason_phrase(status_code).to_string(),
            errors: MessageBag::new(),
            headers: HeaderMap::new(),
            source: None,
        }
    }

    /// Build an error from every optional part at once.
    ///
    /// Missing parts are defaulted: code 400, the status reason phrase,
    /// an empty error bag and no headers.
    pub fn from_parts(
        code: Option<u32>,
        message: Option<String>,
        errors: Option<MessageBag>,
        source: Option<BoxError>,
        headers: HeaderMap,
    ) -> Self {
        let mut error = Self::new(code.unwrap_or(DEFAULT_CODE));
        if let Some(message) = message {
            error = error.with_message(message);
        }
        if let Some(errors) = errors {
            error.errors = errors;
        }
        error.source = source;
        error.headers = headers;
        error
    }

    /// Override the message. An empty message keeps the reason phrase.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = message;
        }
        self
    }

    /// Attach field errors, from a bag or anything convertible into one
    pub fn with_errors(mut self, errors: impl Into<MessageBag>) -> Self {
        self.errors = errors.into();
        self
    }

    /// Attach a single field error
    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.add(field, message);
        self
    }

    /// Wrap the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Add a response header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add every header from `headers`
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn unauthorized() -> Self {
        Self::new(401)
    }

    pub fn forbidden() -> Self {
        Self::new(403)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// 422 with the given field errors
    pub fn unprocessable(errors: impl Into<MessageBag>) -> Self {
        Self::new(422).with_errors(errors)
    }

    pub fn internal() -> Self {
        Self::new(500)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// The full code as supplied, including any sub-code digits
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &MessageBag {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            tracing::error!(
                code = self.code,
                error = %self.message,
                source = ?self.source,
                "API server error"
            );
        }

        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if !self.errors.is_empty() {
            error["errors"] = json!(self.errors);
        }

        let mut response = (self.status_code, Json(json!({ "error": error }))).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Return `Err(ApiError)` from a handler in one line
pub fn api_error<T>(
    code: u32,
    message: impl Into<String>,
    errors: Option<MessageBag>,
) -> Result<T, ApiError> {
    let error = ApiError::new(code).with_message(message);
    Err(match errors {
        Some(errors) => error.with_errors(errors),
        None => error,
    })
}

/// HTTP status from the first three decimal digits of `code`.
///
/// Anything that does not yield a status in 100..=599 falls back to 400.
pub fn status_from_code(code: u32) -> StatusCode {
    let digits = code.to_string();
    let prefix = &digits[..digits.len().min(3)];
    prefix
        .parse::<u16>()
        .ok()
        .filter(|status| (100..=599).contains(status))
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or(StatusCode::BAD_REQUEST)
}

/// Standard English reason phrase for `status`
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_default_message_is_reason_phrase() {
        for status in 100u16..=599 {
            let Ok(code) = StatusCode::from_u16(status) else {
                continue;
            };
            let Some(reason) = code.canonical_reason() else {
                continue;
            };
            let error = ApiError::new(u32::from(status));
            assert_eq!(error.status_code(), code);
            assert_eq!(error.message(), reason, "status {status}");
        }
    }

    #[test]
    fn test_sub_code_uses_first_three_digits() {
        let error = ApiError::new(40401);
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.code(), 40401);
        assert_eq!(error.message(), "Not Found");
    }

    #[test]
    fn test_zero_code_defaults_to_bad_request() {
        let error = ApiError::new(0);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), 400);
        assert_eq!(error.message(), "Bad Request");
    }

    #[test]
    fn test_invalid_code_falls_back_to_bad_request() {
        assert_eq!(status_from_code(42), StatusCode::BAD_REQUEST);
        assert_eq!(status_from_code(99_999), StatusCode::BAD_REQUEST);
        assert_eq!(status_from_code(6001), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_caller_message_wins() {
        let error = ApiError::new(404).with_message("User not found");
        assert_eq!(error.message(), "User not found");
    }

    #[test]
    fn test_empty_message_keeps_reason_phrase() {
        let error = ApiError::new(403).with_message("");
        assert_eq!(error.message(), "Forbidden");
    }

    #[test]
    fn test_has_errors() {
        assert!(!ApiError::new(422).has_errors());

        let error = ApiError::new(422).with_error("email", "Email is required");
        assert!(error.has_errors());
        assert_eq!(error.errors().first("email"), Some("Email is required"));
    }

    #[test]
    fn test_from_parts_defaults() {
        let error = ApiError::from_parts(None, None, None, None, HeaderMap::new());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.message(), "Bad Request");
        assert!(!error.has_errors());
        assert!(std::error::Error::source(&error).is_none());
    }

    #[test]
    fn test_from_parts_uses_bag_as_is() {
        let bag = MessageBag::new().with("name", "Name is required");
        let error = ApiError::from_parts(
            Some(42201),
            Some("Invalid input".to_string()),
            Some(bag.clone()),
            Some("db timeout".into()),
            HeaderMap::new(),
        );
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.errors(), &bag);
        assert_eq!(
            std::error::Error::source(&error).map(|e| e.to_string()),
            Some("db timeout".to_string())
        );
    }

    #[test]
    fn test_api_error_helper() {
        let result: Result<(), ApiError> = api_error(40901, "Duplicate entry", None);
        let error = result.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.message(), "Duplicate entry");
    }

    #[tokio::test]
    async fn test_into_response_body_and_status() {
        let response = ApiError::new(40401)
            .with_error("id", "No such record")
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], 40401);
        assert_eq!(body["error"]["message"], "Not Found");
        assert_eq!(body["error"]["errors"]["id"][0], "No such record");
    }

    #[tokio::test]
    async fn test_into_response_omits_empty_errors() {
        let body = body_json(ApiError::unauthorized().into_response()).await;
        assert!(body["error"].get("errors").is_none());
    }

    #[tokio::test]
    async fn test_into_response_applies_headers() {
        let response = ApiError::new(429)
            .with_header(header::RETRY_AFTER, HeaderValue::from_static("30"))
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }
}
