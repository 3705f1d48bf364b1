//! Request sanitization.
//!
//! Neutralises markup in everything a client sends: query string pairs,
//! JSON body strings and object keys, and form body pairs get `<` escaped
//! to `&lt;`. Everything else, whitespace included, reaches the framework
//! untouched.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, uri::PathAndQuery, HeaderValue, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::http::error::HttpError;

/// Escape markup in a single value.
pub fn clean(value: &str) -> String {
    value.replace('<', "&lt;")
}

/// Clean every string and object key inside a JSON value, recursively.
pub fn clean_json(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('<') {
                *s = clean(s);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(clean_json),
        Value::Object(map) => {
            *map = std::mem::take(map)
                .into_iter()
                .map(|(key, mut value)| {
                    clean_json(&mut value);
                    (clean(&key), value)
                })
                .collect::<Map<String, Value>>();
        }
        _ => {}
    }
}

/// Clean the keys and values of an urlencoded string. Returns `None` when nothing
/// changed so the original encoding is preserved.
pub fn clean_urlencoded(input: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let cleaned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (clean(k), clean(v)))
        .collect();

    if cleaned == pairs {
        return None;
    }

    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(cleaned)
            .finish(),
    )
}

fn clean_uri(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let cleaned = clean_urlencoded(query)?;

    let mut parts = uri.clone().into_parts();
    let path_and_query = format!("{}?{}", uri.path(), cleaned);
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind<B>(request: &Request<B>) -> BodyKind {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") || content_type.contains("+json") {
        BodyKind::Json
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}

fn clean_body(kind: &BodyKind, bytes: &Bytes) -> Option<Vec<u8>> {
    match kind {
        BodyKind::Json => {
            let mut value: Value = serde_json::from_slice(bytes).ok()?;
            let original = value.clone();
            clean_json(&mut value);
            if value == original {
                return None;
            }
            serde_json::to_vec(&value).ok()
        }
        BodyKind::Form => {
            let text = std::str::from_utf8(bytes).ok()?;
            clean_urlencoded(text).map(String::into_bytes)
        }
        BodyKind::Other => None,
    }
}

/// State of the [`sanitize`] middleware.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    /// Largest body that will be buffered.
    pub max_body_size: usize,
    /// Requests under this path prefix pass through untouched.
    pub skip_prefix: Option<&'static str>,
}

impl Sanitizer {
    fn skips(&self, path: &str) -> bool {
        self.skip_prefix.is_some_and(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Sanitization middleware.
pub async fn sanitize(State(sanitizer): State<Sanitizer>, request: Request<Body>, next: Next) -> Response {
    if sanitizer.skips(request.uri().path()) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();

    if let Some(uri) = clean_uri(&parts.uri) {
        parts.uri = uri;
    }

    let kind = body_kind(&Request::from_parts(parts.clone(), ()));
    if matches!(kind, BodyKind::Other) {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match axum::body::to_bytes(body, sanitizer.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request body");
            return HttpError::from_status(StatusCode::PAYLOAD_TOO_LARGE).json_response();
        }
    };

    let body = match clean_body(&kind, &bytes) {
        Some(cleaned) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
            Body::from(cleaned)
        }
        None => Body::from(bytes),
    };

    next.run(Request::from_parts(parts, body)).await
}
