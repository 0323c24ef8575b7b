//! Mapping of HTTP and transport failures onto `GatewayError`.

use hopefund_core::errors::GatewayError;
use reqwest::StatusCode;
use serde::Deserialize;

/// Error body shapes returned by GoTrue and PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl ApiErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }
}

fn message_for(status: StatusCode, body: &ApiErrorBody, raw: &str) -> String {
    body.message().unwrap_or_else(|| {
        let snippet: String = raw.chars().take(200).collect();
        if snippet.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            snippet
        }
    })
}

/// Classifies a non-success PostgREST response.
pub(crate) fn classify_status(status: StatusCode, raw: &str) -> GatewayError {
    let body = ApiErrorBody::parse(raw);
    let message = message_for(status, &body, raw);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::AuthRejected(message),
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::CONFLICT => GatewayError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT => GatewayError::Unavailable(message),
        _ => GatewayError::api(status.as_u16(), message),
    }
}

/// Classifies a non-success GoTrue response. Bad credentials come back as
/// 400 and duplicate registrations as 422 (or 400 on older servers).
pub(crate) fn classify_auth_status(status: StatusCode, raw: &str) -> GatewayError {
    let body = ApiErrorBody::parse(raw);
    let message = message_for(status, &body, raw);
    let lowered = message.to_ascii_lowercase();

    let duplicate = body.error_code.as_deref() == Some("user_already_exists")
        || lowered.contains("already registered")
        || lowered.contains("already exists");
    if duplicate {
        return GatewayError::Conflict(message);
    }

    let rejected = body.error_code.as_deref() == Some("invalid_credentials")
        || body.error.as_deref() == Some("invalid_grant")
        || lowered.contains("invalid login credentials");
    if rejected || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return GatewayError::AuthRejected(message);
    }

    classify_status(status, raw)
}

/// Maps a reqwest failure that happened before a status was available.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Decode(format!("{}: {}", context, err))
    } else {
        GatewayError::Unavailable(format!("{}: {}", context, err))
    }
}
