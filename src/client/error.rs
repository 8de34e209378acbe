use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{detail} (status {status})")]
    Status { status: u16, detail: String },
    #[error("unexpected response body (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self::Status { status, detail: detail.into() }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Not-found and bad-request answers from the results endpoint mean the submission is
    /// not visible yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self.status_code(), Some(404 | 400))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }

    /// Text suitable for showing to the student.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { detail, .. } if !detail.is_empty() => detail.clone(),
            ApiError::Transport(err) if err.is_timeout() => "The server did not respond in time".to_string(),
            ApiError::Transport(_) => "Could not reach the exam server".to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Pulls a readable message out of an error body. The backend reports `detail` as a string,
/// a list of `{msg}` objects, or an object; some routes use a top-level `message`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;

    match parsed.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            if let Some(msg) = items.first().and_then(|item| item.get("msg")).and_then(Value::as_str)
            {
                return Some(msg.to_string());
            }
        }
        Some(Value::Object(map)) => {
            for key in ["msg", "message", "error"] {
                if let Some(text) = map.get(key).and_then(Value::as_str) {
                    return Some(text.to_string());
                }
            }
        }
        _ => {}
    }

    parsed.get("message").and_then(Value::as_str).map(str::to_string)
}
