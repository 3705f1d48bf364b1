//! Cloud function webhooks for outgoing mail.
//!
//! The framework calls these with `{"params": {...}, "user": {...}}` and
//! expects `{"success": ...}` back. Failures go through the API app's error
//! handler like any other [`HttpError`].
//!
//! Every call must carry the shared webhook key. Mail always leaves from the
//! configured sender; a `sender` in the params is ignored.

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::error::HttpError;
use crate::mail::{MailAdapter, MailError, MailUser, SendEmailOptions};
use crate::security::credentials::secret_eq;

pub const WEBHOOK_KEY_HEADER: &str = "x-parse-webhook-key";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FunctionRequest {
    pub params: Value,
    pub user: Option<MailUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkParams {
    link: String,
    app_name: Option<String>,
    user: Option<MailUser>,
}

#[derive(Clone)]
struct HookState {
    mail: MailAdapter,
    app_name: String,
}

impl From<MailError> for HttpError {
    fn from(error: MailError) -> Self {
        let status = if error.is_delivery() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::BAD_REQUEST
        };
        HttpError::new(status, error.to_string())
    }
}

/// Webhook routes, nested under `/hooks` by the API app. Every call must
/// present `key` in `X-Parse-Webhook-Key`.
pub fn router(mail: MailAdapter, app_name: String, key: String) -> Router {
    Router::new()
        .route("/functions/{name}", post(call_function))
        .with_state(HookState { mail, app_name })
        .layer(middleware::from_fn_with_state(key, require_key))
}

async fn require_key(
    State(key): State<String>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let presented = headers.get(WEBHOOK_KEY_HEADER).and_then(|v| v.to_str().ok());
    if !presented.is_some_and(|presented| secret_eq(presented, &key)) {
        tracing::warn!("Webhook call with a missing or wrong key");
        return HttpError::from_status(StatusCode::UNAUTHORIZED).into_response();
    }
    next.run(request).await
}

fn bad_params(e: serde_json::Error) -> HttpError {
    HttpError::new(StatusCode::BAD_REQUEST, format!("invalid params: {}", e))
}

async fn call_function(
    State(state): State<HookState>,
    Path(name): Path<String>,
    Json(call): Json<FunctionRequest>,
) -> Result<Json<Value>, HttpError> {
    tracing::debug!(function = %name, "Webhook called");

    match name.as_str() {
        "sendEmail" => {
            let mut options: SendEmailOptions =
                serde_json::from_value(call.params).map_err(bad_params)?;
            if options.user.is_none() {
                options.user = call.user;
            }
            state.mail.send_email(options).await?;
        }
        "sendVerificationEmail" | "sendPasswordResetEmail" => {
            let params: LinkParams = serde_json::from_value(call.params).map_err(bad_params)?;
            let user = params
                .user
                .or(call.user)
                .ok_or_else(|| HttpError::new(StatusCode::BAD_REQUEST, "user is required"))?;
            let app_name = params.app_name.unwrap_or_else(|| state.app_name.clone());

            if name == "sendVerificationEmail" {
                state.mail.send_verification_email(&params.link, &app_name, user).await?;
            } else {
                state.mail.send_password_reset_email(&params.link, &app_name, user).await?;
            }
        }
        _ => return Err(HttpError::not_found()),
    }

    Ok(Json(json!({ "success": "sent" })))
}
