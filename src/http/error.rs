//! Error translation for the API application.
//!
//! Handlers fail by returning an [`HttpError`]. Its response carries the
//! error in the response extensions with an empty body, so the telemetry
//! error hook can observe it before [`error_handler`] serializes it to JSON.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// An error that reached the request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Error with the status' canonical reason as its message.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown Error"))
    }

    pub fn not_found() -> Self {
        Self::from_status(StatusCode::NOT_FOUND)
    }

    /// Error without a meaningful status; reported as 500.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Client errors expose their message; server errors do not.
    pub fn expose(&self) -> bool {
        self.status.is_client_error()
    }

    /// Serialized response, for layers that sit outside [`error_handler`].
    pub fn json_response(self) -> Response {
        let response = Response::new(Body::empty());
        render(self, response)
    }
}

fn render(error: HttpError, response: Response) -> Response {
    let body = match serde_json::to_vec(&error) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Could not serialize error");
            b"{}".to_vec()
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.status = error.status();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    parts.extensions.insert(error);
    Response::from_parts(parts, Body::from(body))
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for HttpError {}

impl Serialize for HttpError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let expose = self.expose();
        let mut state = serializer.serialize_struct("HttpError", if expose { 4 } else { 3 })?;
        state.serialize_field("status", &self.status.as_u16())?;
        state.serialize_field("statusCode", &self.status.as_u16())?;
        state.serialize_field("expose", &expose)?;
        if expose {
            state.serialize_field("message", &self.message)?;
        }
        state.end()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status;
        response.extensions_mut().insert(self);
        response
    }
}

/// Final error handler: responses carrying an [`HttpError`] get its status
/// and JSON serialization. Headers set on the way out are kept.
pub async fn error_handler(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;

    match response.extensions().get::<HttpError>().cloned() {
        Some(error) => render(error, response),
        None => response,
    }
}

/// Catch-all for unmatched routes.
pub async fn not_found() -> HttpError {
    HttpError::not_found()
}

/// Converts a handler panic into a 500 [`HttpError`] response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    HttpError::internal(detail).into_response()
}
