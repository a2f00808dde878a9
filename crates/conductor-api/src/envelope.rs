use serde::Serialize;
use serde_json::Value;

/// The wire envelope every handler responds with: `{success, data?,
/// error?, message?}`. Business-level failures (a rejected job, an
/// unknown UUID) still return HTTP 200 with `success: false` — only
/// transport failures produce a non-200 status.
#[derive(Debug, Serialize)]
pub struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl Envelope {
    pub fn ok(data: Option<Value>) -> Self {
        Self { success: true, data, error: None, message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(true), message: Some(message.into()) }
    }
}

impl axum::response::IntoResponse for Envelope {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self).into_response()
    }
}
