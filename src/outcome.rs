//! Uniform result carrier for gateway operations.
//!
//! Core operations return `Result<T, GatewayError>`; the HTTP layer converts
//! both arms into an [`Outcome`] — message, error reason, status class, and
//! an optional payload — before serializing a response.

use serde::Serialize;

/// Status classification for an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Ok,
    BadRequest,
    NotFound,
    Internal,
}

impl StatusClass {
    /// The HTTP status code this class maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }
}

/// Error taxonomy for every core operation.
///
/// Collaborator failures (providers, stores) are caught at the registry and
/// gateway boundaries and classified into one of these kinds; no raw provider
/// or store error crosses into a caller. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Invalid input: unsupported provider type, missing required field,
    /// lookups against models that are not loaded.
    #[error("{0}")]
    BadRequest(String),

    /// The embedding auto-load path was exhausted without producing a model.
    #[error("{0}")]
    NotFound(String),

    /// Unexpected collaborator failure or an invalid result shape.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::BadRequest(_) => StatusClass::BadRequest,
            Self::NotFound(_) => StatusClass::NotFound,
            Self::Internal(_) => StatusClass::Internal,
        }
    }
}

/// Success/error/payload container passed back from every boundary operation.
///
/// Exactly one of the success state or the error state is active at
/// completion; a payload implies success.
#[derive(Debug, Serialize)]
pub struct Outcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: StatusClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Outcome {
    /// A bare success with no message or payload. Renders as `{"message": "OK"}`.
    pub fn ok() -> Self {
        Self {
            message: None,
            reason: None,
            status: StatusClass::Ok,
            payload: None,
        }
    }

    /// A success with a human-readable message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// A success carrying a payload. The payload becomes the response body verbatim.
    pub fn with_payload(payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::ok()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusClass::Ok
    }

    /// Response body: payload verbatim on success, otherwise a message object.
    /// Error bodies carry the reason; missing reasons fall back to a generic one.
    pub fn body(&self) -> serde_json::Value {
        if self.is_success() {
            if let Some(payload) = &self.payload {
                return payload.clone();
            }
            let message = self.message.as_deref().unwrap_or("OK");
            serde_json::json!({ "message": message })
        } else {
            let reason = self.reason.as_deref().unwrap_or("unknown error");
            serde_json::json!({ "message": reason })
        }
    }
}

impl From<GatewayError> for Outcome {
    fn from(err: GatewayError) -> Self {
        Self {
            message: None,
            reason: Some(err.to_string()),
            status: err.status_class(),
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_defaults_to_ok_message() {
        let outcome = Outcome::ok();
        assert!(outcome.is_success());
        assert_eq!(outcome.body(), serde_json::json!({"message": "OK"}));
    }

    #[test]
    fn success_body_prefers_payload() {
        let outcome = Outcome::with_payload(serde_json::json!([1.0, 2.0]));
        assert_eq!(outcome.body(), serde_json::json!([1.0, 2.0]));
    }

    #[test]
    fn error_body_carries_reason() {
        let outcome = Outcome::from(GatewayError::BadRequest("model not loaded".into()));
        assert!(!outcome.is_success());
        assert_eq!(outcome.status, StatusClass::BadRequest);
        assert_eq!(
            outcome.body(),
            serde_json::json!({"message": "model not loaded"})
        );
    }

    #[test]
    fn status_classes_map_to_http_codes() {
        assert_eq!(StatusClass::Ok.http_status(), 200);
        assert_eq!(StatusClass::BadRequest.http_status(), 400);
        assert_eq!(StatusClass::NotFound.http_status(), 404);
        assert_eq!(StatusClass::Internal.http_status(), 500);
    }

    #[test]
    fn success_message_is_kept() {
        let outcome = Outcome::success("model 'modelA' loaded");
        assert_eq!(
            outcome.body(),
            serde_json::json!({"message": "model 'modelA' loaded"})
        );
    }
}
